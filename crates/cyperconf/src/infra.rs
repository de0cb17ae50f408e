//! Infrastructure configuration - paths, child processes, ports, telemetry.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ConfigError;

/// Filesystem layout for presets and runtime state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Base directory for everything cyperus keeps on disk.
    /// Default: ~/.local/share/cyperus
    #[serde(default = "PathsConfig::default_config_dir")]
    pub config_dir: PathBuf,

    /// Saved presets. Defaults to `<config_dir>/presets` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presets_dir: Option<PathBuf>,

    /// Compiled (engine-annotated) copy of the active preset.
    /// Defaults to `<config_dir>/preset_active` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_active_dir: Option<PathBuf>,
}

impl PathsConfig {
    fn default_config_dir() -> PathBuf {
        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".local/share/cyperus"))
            .unwrap_or_else(|| PathBuf::from(".local/share/cyperus"))
    }

    pub fn presets_dir(&self) -> PathBuf {
        self.presets_dir
            .clone()
            .unwrap_or_else(|| self.config_dir.join("presets"))
    }

    pub fn preset_active_dir(&self) -> PathBuf {
        self.preset_active_dir
            .clone()
            .unwrap_or_else(|| self.config_dir.join("preset_active"))
    }

    /// Create the config, presets and active-preset directories.
    ///
    /// Safe to call repeatedly; existing directories are left alone.
    pub fn ensure_dirs(&self) -> Result<(), ConfigError> {
        for dir in [self.config_dir.clone(), self.presets_dir(), self.preset_active_dir()] {
            create_dir(&dir)?;
        }
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(|source| ConfigError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            config_dir: Self::default_config_dir(),
            presets_dir: None,
            preset_active_dir: None,
        }
    }
}

/// The realtime engine process (cyperus-server).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the engine executable.
    /// Default: modules/cyperus-server/build/cyperus-server
    #[serde(default = "EngineConfig::default_program")]
    pub program: PathBuf,

    /// Audio input channels. Default: 4
    #[serde(default = "EngineConfig::default_channels")]
    pub input_channels: u32,

    /// Audio output channels. Default: 4
    #[serde(default = "EngineConfig::default_channels")]
    pub output_channels: u32,

    /// Sample bit depth. Default: 24
    #[serde(default = "EngineConfig::default_bitdepth")]
    pub bitdepth: u32,

    /// Port the engine receives control requests on. Default: 7500
    #[serde(default = "EngineConfig::default_recv_port")]
    pub recv_port: u16,

    /// Port the engine sends responses to. Default: 7400
    #[serde(default = "EngineConfig::default_send_port")]
    pub send_port: u16,

    /// Frames per period. Default: 256
    #[serde(default = "EngineConfig::default_period")]
    pub period: u32,
}

impl EngineConfig {
    fn default_program() -> PathBuf {
        PathBuf::from("modules/cyperus-server/build/cyperus-server")
    }

    fn default_channels() -> u32 {
        4
    }

    fn default_bitdepth() -> u32 {
        24
    }

    fn default_recv_port() -> u16 {
        7500
    }

    fn default_send_port() -> u16 {
        7400
    }

    fn default_period() -> u32 {
        256
    }

    /// Command-line arguments understood by cyperus-server.
    pub fn args(&self) -> Vec<String> {
        vec![
            "-i".to_string(),
            self.input_channels.to_string(),
            "-o".to_string(),
            self.output_channels.to_string(),
            "-bd".to_string(),
            self.bitdepth.to_string(),
            "-rp".to_string(),
            self.recv_port.to_string(),
            "-sp".to_string(),
            self.send_port.to_string(),
            "-p".to_string(),
            self.period.to_string(),
        ]
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: Self::default_program(),
            input_channels: Self::default_channels(),
            output_channels: Self::default_channels(),
            bitdepth: Self::default_bitdepth(),
            recv_port: Self::default_recv_port(),
            send_port: Self::default_send_port(),
            period: Self::default_period(),
        }
    }
}

/// Websocket relay bridging the editor to the engine's control port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Interpreter used to launch the relay. Default: python3
    #[serde(default = "RelayConfig::default_program")]
    pub program: PathBuf,

    /// Relay script. Default: modules/baton/baton.py
    #[serde(default = "RelayConfig::default_script")]
    pub script: PathBuf,

    /// Default: 7400
    #[serde(default = "RelayConfig::default_recv_port")]
    pub recv_port: u16,

    /// Default: 7500
    #[serde(default = "RelayConfig::default_send_port")]
    pub send_port: u16,
}

impl RelayConfig {
    fn default_program() -> PathBuf {
        PathBuf::from("python3")
    }

    fn default_script() -> PathBuf {
        PathBuf::from("modules/baton/baton.py")
    }

    fn default_recv_port() -> u16 {
        7400
    }

    fn default_send_port() -> u16 {
        7500
    }

    pub fn args(&self) -> Vec<String> {
        vec![
            self.script.display().to_string(),
            "--recvport".to_string(),
            self.recv_port.to_string(),
            "--sendport".to_string(),
            self.send_port.to_string(),
        ]
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            program: Self::default_program(),
            script: Self::default_script(),
            recv_port: Self::default_recv_port(),
            send_port: Self::default_send_port(),
        }
    }
}

/// Ports used by the preset loader when talking to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetsConfig {
    /// Default: 7600
    #[serde(default = "PresetsConfig::default_recv_port")]
    pub recv_port: u16,

    /// Default: 7500
    #[serde(default = "PresetsConfig::default_send_port")]
    pub send_port: u16,
}

impl PresetsConfig {
    fn default_recv_port() -> u16 {
        7600
    }

    fn default_send_port() -> u16 {
        7500
    }
}

impl Default for PresetsConfig {
    fn default() -> Self {
        Self {
            recv_port: Self::default_recv_port(),
            send_port: Self::default_send_port(),
        }
    }
}

/// Telemetry and observability configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or `EnvFilter` directive (trace, debug, info, warn, error).
    /// Default: info
    #[serde(default = "TelemetryConfig::default_log_level")]
    pub log_level: String,
}

impl TelemetryConfig {
    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: Self::default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_defaults() {
        let paths = PathsConfig::default();
        assert!(paths.config_dir.to_string_lossy().ends_with(".local/share/cyperus"));
        assert_eq!(paths.presets_dir(), paths.config_dir.join("presets"));
        assert_eq!(paths.preset_active_dir(), paths.config_dir.join("preset_active"));
    }

    #[test]
    fn test_explicit_presets_dir_wins() {
        let paths = PathsConfig {
            config_dir: PathBuf::from("/srv/cyperus"),
            presets_dir: Some(PathBuf::from("/mnt/presets")),
            preset_active_dir: None,
        };
        assert_eq!(paths.presets_dir(), PathBuf::from("/mnt/presets"));
        assert_eq!(paths.preset_active_dir(), PathBuf::from("/srv/cyperus/preset_active"));
    }

    #[test]
    fn test_ensure_dirs_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = PathsConfig {
            config_dir: tmp.path().join("cyperus"),
            presets_dir: None,
            preset_active_dir: None,
        };

        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();

        assert!(paths.presets_dir().is_dir());
        assert!(paths.preset_active_dir().is_dir());
    }

    #[test]
    fn test_engine_args() {
        let engine = EngineConfig::default();
        assert_eq!(
            engine.args(),
            vec!["-i", "4", "-o", "4", "-bd", "24", "-rp", "7500", "-sp", "7400", "-p", "256"]
        );
    }

    #[test]
    fn test_relay_args() {
        let relay = RelayConfig::default();
        assert_eq!(
            relay.args(),
            vec!["modules/baton/baton.py", "--recvport", "7400", "--sendport", "7500"]
        );
    }
}
