//! CLI command implementations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use cyperconf::{ConfigSources, CyperusConfig};
use cyperus_preset::{CompileReport, GraphWriter, Preset, VirtualEngine};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::supervisor::{Supervisor, Unit};

/// Options for `cyperus compile`.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Where to write the compiled preset. Defaults to the active preset
    /// directory, under the preset's own file name.
    pub output: Option<PathBuf>,
    /// Main ports to expose; default to the configured channel counts.
    pub mains_in: Option<usize>,
    pub mains_out: Option<usize>,
}

#[derive(Debug)]
pub struct CompileOutcome {
    pub report: CompileReport,
    pub output: PathBuf,
}

/// Compile a preset against an in-process engine and write the result.
pub fn compile(
    config: &CyperusConfig,
    preset_path: &Path,
    options: &CompileOptions,
) -> Result<CompileOutcome> {
    let preset = Preset::load(preset_path)
        .with_context(|| format!("Failed to load preset {}", preset_path.display()))?;

    let mains_in = options
        .mains_in
        .unwrap_or(config.engine.input_channels as usize);
    let mains_out = options
        .mains_out
        .unwrap_or(config.engine.output_channels as usize);
    let mut engine = VirtualEngine::new(mains_in, mains_out);

    let compiled = preset
        .compile(&mut engine)
        .with_context(|| format!("Failed to compile preset {}", preset_path.display()))?;
    for warning in &compiled.report.warnings {
        warn!("{}", warning);
    }

    let output = match &options.output {
        Some(path) => path.clone(),
        None => {
            let file_name = preset_path
                .file_name()
                .with_context(|| format!("Preset path {} has no file name", preset_path.display()))?;
            config.paths.preset_active_dir().join(file_name)
        }
    };

    GraphWriter::new(&output)
        .write(&preset.annotate(&compiled))
        .with_context(|| format!("Failed to write compiled preset {}", output.display()))?;
    info!(output = %output.display(), "wrote compiled preset");

    Ok(CompileOutcome {
        report: compiled.report,
        output,
    })
}

/// Ensure the data directories exist, then supervise the engine and relay
/// until one fails or Ctrl-C is pressed.
pub async fn run(config: &CyperusConfig) -> Result<()> {
    config
        .paths
        .ensure_dirs()
        .context("Failed to create cyperus directories")?;

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let mut supervisor = Supervisor::new(shutdown);
    supervisor.add(Unit::engine(&config.engine));
    supervisor.add(Unit::relay(&config.relay));

    for unit in supervisor.units() {
        info!(unit = %unit.name, program = %unit.program.display(), args = ?unit.args, "launching");
    }

    let exits = supervisor.run().await.context("Supervised process failed")?;
    info!(units = exits.len(), "all units stopped");
    Ok(())
}

/// The effective configuration as TOML, preceded by where it came from.
pub fn show_config(config: &CyperusConfig, sources: &ConfigSources) -> String {
    let mut output = String::new();

    if sources.files.is_empty() {
        output.push_str("# no config files found, using defaults\n");
    }
    for file in &sources.files {
        output.push_str(&format!("# loaded: {}\n", file.display()));
    }
    for var in &sources.env_overrides {
        output.push_str(&format!("# env: {}\n", var));
    }
    output.push('\n');
    output.push_str(&config.to_toml());
    output
}
