//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, CyperusConfig};
use std::path::{Path, PathBuf};

/// Information about where config values came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Config files that were loaded (in order)
    pub files: Vec<PathBuf>,
    /// Environment variables that overrode config values
    pub env_overrides: Vec<String>,
}

/// Discover config files in standard locations.
///
/// Returns paths in load order (system, user, local).
/// Only returns files that exist.
pub fn discover_config_files() -> Vec<PathBuf> {
    discover_config_files_with_override(None)
}

/// Discover config files, optionally with a CLI override path.
///
/// If `cli_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/cyperus/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("cyperus/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = cli_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("cyperus.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file into a raw table.
pub fn load_table(path: &Path) -> Result<toml::Table, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Merge `overlay` into `base`. Nested tables merge key by key, anything
/// else in the overlay replaces the base value.
pub fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Build a config from a merged table, expanding `~` in path fields.
pub fn from_table(table: toml::Table, origin: &Path) -> Result<CyperusConfig, ConfigError> {
    let mut config: CyperusConfig =
        toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse {
                path: origin.to_path_buf(),
                message: e.to_string(),
            })?;

    config.paths.config_dir = expand_path(&config.paths.config_dir.to_string_lossy());
    config.paths.presets_dir = config
        .paths
        .presets_dir
        .take()
        .map(|p| expand_path(&p.to_string_lossy()));
    config.paths.preset_active_dir = config
        .paths
        .preset_active_dir
        .take()
        .map(|p| expand_path(&p.to_string_lossy()));

    Ok(config)
}

/// Apply environment variable overrides to config.
///
/// `lookup` resolves a variable name; pass `|k| std::env::var(k).ok()` for
/// the process environment.
pub fn apply_env_overrides<F>(config: &mut CyperusConfig, sources: &mut ConfigSources, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("CYPERUS_CONFIG_DIR") {
        config.paths.config_dir = expand_path(&v);
        sources.env_overrides.push("CYPERUS_CONFIG_DIR".to_string());
    }
    if let Some(v) = lookup("CYPERUS_PRESETS_DIR") {
        config.paths.presets_dir = Some(expand_path(&v));
        sources.env_overrides.push("CYPERUS_PRESETS_DIR".to_string());
    }

    if let Some(v) = lookup("CYPERUS_ENGINE_PROGRAM") {
        config.engine.program = expand_path(&v);
        sources.env_overrides.push("CYPERUS_ENGINE_PROGRAM".to_string());
    }

    let ports: [(&str, &mut u16); 4] = [
        ("CYPERUS_ENGINE_RECV_PORT", &mut config.engine.recv_port),
        ("CYPERUS_ENGINE_SEND_PORT", &mut config.engine.send_port),
        ("CYPERUS_RELAY_RECV_PORT", &mut config.relay.recv_port),
        ("CYPERUS_RELAY_SEND_PORT", &mut config.relay.send_port),
    ];
    for (key, slot) in ports {
        if let Some(port) = lookup(key).and_then(|v| v.parse().ok()) {
            *slot = port;
            sources.env_overrides.push(key.to_string());
        }
    }

    if let Some(v) = lookup("CYPERUS_LOG_LEVEL") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("CYPERUS_LOG_LEVEL".to_string());
    }
    // RUST_LOG wins over everything else
    if let Some(v) = lookup("RUST_LOG") {
        config.telemetry.log_level = v;
        sources.env_overrides.push("RUST_LOG".to_string());
    }
}

/// Expand ~ and environment variables in a path.
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            home.join(stripped)
        } else {
            PathBuf::from(path)
        }
    } else if let Some(stripped) = path.strip_prefix('$') {
        // $VAR/rest/of/path
        if let Some(slash_pos) = stripped.find('/') {
            let var_name = &stripped[..slash_pos];
            if let Ok(var_value) = std::env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            std::env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
