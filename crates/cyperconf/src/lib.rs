//! Configuration loading for cyperus.
//!
//! One layered TOML configuration shared by the CLI, the process
//! supervisor and the preset compiler front-end.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/cyperus/config.toml` (system)
//! 2. `~/.config/cyperus/config.toml` (user)
//! 3. `./cyperus.toml` (local override, replaced by an explicit `--config`)
//! 4. Environment variables (`CYPERUS_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [paths]
//! config_dir = "~/.local/share/cyperus"
//!
//! [engine]
//! program = "modules/cyperus-server/build/cyperus-server"
//! input_channels = 4
//! output_channels = 4
//! recv_port = 7500
//! send_port = 7400
//!
//! [relay]
//! recv_port = 7400
//! send_port = 7500
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod infra;
pub mod loader;

pub use infra::{EngineConfig, PathsConfig, PresetsConfig, RelayConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, expand_path, ConfigSources};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Complete cyperus configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CyperusConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub relay: RelayConfig,

    #[serde(default)]
    pub presets: PresetsConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl CyperusConfig {
    /// Load configuration from all sources.
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration, letting `config_path` replace `./cyperus.toml`.
    ///
    /// System and user configs still load first.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return where values came from.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut merged = toml::Table::new();

        for path in loader::discover_config_files_with_override(config_path) {
            let table = loader::load_table(&path)?;
            loader::merge_tables(&mut merged, table);
            sources.files.push(path);
        }

        let mut config = loader::from_table(merged, Path::new("<merged>"))?;
        loader::apply_env_overrides(&mut config, &mut sources, |key| std::env::var(key).ok());

        Ok((config, sources))
    }

    /// Serialize config to a TOML string.
    pub fn to_toml(&self) -> String {
        // Laid out by hand so the derived directories are shown too.
        let mut output = String::new();

        output.push_str("# cyperus configuration\n\n");

        output.push_str("[paths]\n");
        output.push_str(&format!("config_dir = {}\n", quoted(self.paths.config_dir.display())));
        output.push_str(&format!("presets_dir = {}\n", quoted(self.paths.presets_dir().display())));
        output.push_str(&format!(
            "preset_active_dir = {}\n",
            quoted(self.paths.preset_active_dir().display())
        ));

        output.push_str("\n[engine]\n");
        output.push_str(&format!("program = {}\n", quoted(self.engine.program.display())));
        output.push_str(&format!("input_channels = {}\n", self.engine.input_channels));
        output.push_str(&format!("output_channels = {}\n", self.engine.output_channels));
        output.push_str(&format!("bitdepth = {}\n", self.engine.bitdepth));
        output.push_str(&format!("recv_port = {}\n", self.engine.recv_port));
        output.push_str(&format!("send_port = {}\n", self.engine.send_port));
        output.push_str(&format!("period = {}\n", self.engine.period));

        output.push_str("\n[relay]\n");
        output.push_str(&format!("program = {}\n", quoted(self.relay.program.display())));
        output.push_str(&format!("script = {}\n", quoted(self.relay.script.display())));
        output.push_str(&format!("recv_port = {}\n", self.relay.recv_port));
        output.push_str(&format!("send_port = {}\n", self.relay.send_port));

        output.push_str("\n[presets]\n");
        output.push_str(&format!("recv_port = {}\n", self.presets.recv_port));
        output.push_str(&format!("send_port = {}\n", self.presets.send_port));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!("log_level = {}\n", quoted(&self.telemetry.log_level)));

        output
    }
}

/// A TOML string literal, escaped by the toml encoder.
fn quoted(value: impl std::fmt::Display) -> String {
    toml::Value::String(value.to_string()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CyperusConfig::default();
        assert_eq!(config.engine.recv_port, 7500);
        assert_eq!(config.relay.recv_port, 7400);
        assert_eq!(config.presets.recv_port, 7600);
    }

    #[test]
    fn test_to_toml_parses_back() {
        let config = CyperusConfig::default();
        let toml = config.to_toml();
        assert!(toml.contains("[engine]"));
        assert!(toml.contains("[telemetry]"));

        let table: toml::Table = toml.parse().unwrap();
        let reparsed = loader::from_table(table, Path::new("roundtrip.toml")).unwrap();
        assert_eq!(reparsed.engine, config.engine);
        assert_eq!(reparsed.relay, config.relay);
        assert_eq!(reparsed.paths.presets_dir(), config.paths.presets_dir());
    }

    #[test]
    fn test_to_toml_escapes_strings() {
        let mut config = CyperusConfig::default();
        config.paths.config_dir = PathBuf::from(r#"/srv/"quoted" dir\with\backslashes"#);
        config.telemetry.log_level = r#"info,cyperus="debug""#.to_string();

        let table: toml::Table = config.to_toml().parse().unwrap();
        let reparsed = loader::from_table(table, Path::new("escaped.toml")).unwrap();
        assert_eq!(reparsed.paths.config_dir, config.paths.config_dir);
        assert_eq!(reparsed.telemetry.log_level, config.telemetry.log_level);
        assert_eq!(
            reparsed.paths.presets_dir(),
            config.paths.config_dir.join("presets")
        );
    }

    #[test]
    fn test_explicit_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("custom.toml");
        std::fs::write(&path, "[engine]\nperiod = 512\n").unwrap();

        let (config, sources) = CyperusConfig::load_with_sources_from(Some(&path)).unwrap();
        assert_eq!(config.engine.period, 512);
        assert!(sources.files.contains(&path));
    }
}
