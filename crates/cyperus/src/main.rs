//! cyperus - launcher and preset compiler for the cyperus audio engine
//!
//! Subcommands:
//! - `cyperus compile <preset>` - Compile a preset graph and write the annotated copy
//! - `cyperus run` - Launch and supervise the engine and its relay
//! - `cyperus config` - Print the effective configuration

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use cyperconf::CyperusConfig;
use cyperus::commands::{self, CompileOptions};
use cyperus::telemetry;

#[derive(Parser)]
#[command(name = "cyperus")]
#[command(about = "Launcher and preset compiler for the cyperus audio engine")]
#[command(version)]
struct Cli {
    /// Config file to load instead of ./cyperus.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a preset graph against an in-process engine
    Compile {
        /// Preset JSON written by the graph editor
        preset: PathBuf,

        /// Output path (default: <preset_active_dir>/<preset file name>)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Main inputs the engine exposes (default: engine.input_channels)
        #[arg(long)]
        mains_in: Option<usize>,

        /// Main outputs the engine exposes (default: engine.output_channels)
        #[arg(long)]
        mains_out: Option<usize>,

        /// Print the compile report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Launch the engine and relay, stopping both if either fails
    Run,

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = CyperusConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;
    telemetry::init(&config.telemetry.log_level);

    match cli.command {
        Commands::Compile {
            preset,
            output,
            mains_in,
            mains_out,
            json,
        } => {
            let options = CompileOptions {
                output,
                mains_in,
                mains_out,
            };
            let outcome = commands::compile(&config, &preset, &options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.report)?);
            } else {
                println!("{}", outcome.report);
                for warning in &outcome.report.warnings {
                    println!("  warning: {}", warning);
                }
                println!("wrote {}", outcome.output.display());
            }
        }
        Commands::Run => {
            commands::run(&config).await?;
        }
        Commands::Config => {
            print!("{}", commands::show_config(&config, &sources));
        }
    }

    Ok(())
}
