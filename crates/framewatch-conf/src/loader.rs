//! Config file discovery, loading, and environment variable overlay.

use crate::{ConfigError, FramewatchConfig};
use std::env;
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

/// Discover config files, optionally with an explicit override path.
///
/// If `override_path` is provided and exists, it replaces the local override.
pub fn discover_config_files_with_override(override_path: Option<&Path>) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let system = PathBuf::from("/etc/framewatch/config.toml");
    if system.exists() {
        files.push(system);
    }

    // XDG_CONFIG_HOME or ~/.config
    if let Some(config_dir) = directories::BaseDirs::new().map(|d| d.config_dir().to_path_buf()) {
        let user = config_dir.join("framewatch/config.toml");
        if user.exists() {
            files.push(user);
        }
    }

    if let Some(path) = override_path {
        if path.exists() {
            files.push(path.to_path_buf());
            return files;
        }
    }

    let local = PathBuf::from("framewatch.toml");
    if local.exists() {
        files.push(local);
    }

    files
}

/// Read a TOML file and overlay the keys it sets onto `config`.
pub fn apply_file(config: &mut FramewatchConfig, path: &Path) -> Result<(), ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    apply_toml(config, &contents, path)
}

/// Overlay the keys present in a TOML document onto `config`.
///
/// Keys absent from the document keep whatever earlier sources set, so a
/// local file only needs to name what it changes.
pub(crate) fn apply_toml(
    config: &mut FramewatchConfig,
    contents: &str,
    path: &Path,
) -> Result<(), ConfigError> {
    let table: toml::Table = contents.parse().map_err(|e: toml::de::Error| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let type_error = |key: &str, expected: &str| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("{} must be {}", key, expected),
    };

    if let Some(service) = table.get("service").and_then(|v| v.as_table()) {
        if let Some(v) = service.get("binary") {
            let s = v.as_str().ok_or_else(|| type_error("service.binary", "a string"))?;
            config.service.binary = expand_path(s);
        }
        if let Some(v) = service.get("log_directory") {
            let s = v
                .as_str()
                .ok_or_else(|| type_error("service.log_directory", "a string"))?;
            config.service.log_directory = expand_path(s);
        }
        if let Some(v) = service.get("endpoint") {
            let s = v.as_str().ok_or_else(|| type_error("service.endpoint", "a string"))?;
            config.service.endpoint = s.to_string();
        }
        if let Some(v) = service.get("extra_args") {
            let args = v
                .as_array()
                .ok_or_else(|| type_error("service.extra_args", "an array of strings"))?;
            config.service.extra_args = args
                .iter()
                .map(|a| {
                    a.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| type_error("service.extra_args", "an array of strings"))
                })
                .collect::<Result<Vec<String>, ConfigError>>()?;
        }
        if let Some(v) = service.get("rpc_timeout_ms") {
            let ms = v
                .as_integer()
                .filter(|ms| *ms >= 0)
                .ok_or_else(|| type_error("service.rpc_timeout_ms", "a non-negative integer"))?;
            config.service.rpc_timeout_ms = ms as u64;
        }
    }

    if let Some(trigger) = table.get("trigger").and_then(|v| v.as_table()) {
        if let Some(v) = trigger.get("frame_time_threshold_ms") {
            // Accept `16` as well as `16.0`
            let ms = v
                .as_float()
                .or_else(|| v.as_integer().map(|i| i as f64))
                .ok_or_else(|| type_error("trigger.frame_time_threshold_ms", "a number"))?;
            config.trigger.frame_time_threshold_ms = ms;
        }
        if let Some(v) = trigger.get("capture_length_secs") {
            let secs = v
                .as_integer()
                .filter(|s| *s >= 0)
                .ok_or_else(|| {
                    type_error("trigger.capture_length_secs", "a non-negative integer")
                })?;
            config.trigger.capture_length_secs = secs as u64;
        }
    }

    if let Some(telemetry) = table.get("telemetry").and_then(|v| v.as_table()) {
        if let Some(v) = telemetry.get("log_level") {
            let s = v
                .as_str()
                .ok_or_else(|| type_error("telemetry.log_level", "a string"))?;
            config.telemetry.log_level = s.to_string();
        }
    }

    Ok(())
}

/// Apply environment variable overrides to config.
pub fn apply_env_overrides(config: &mut FramewatchConfig, sources: &mut ConfigSources) {
    apply_overrides_from(config, sources, env::vars());
}

/// Apply overrides from an explicit set of variables.
///
/// Unparseable numeric values are skipped rather than failing the load; the
/// file or default value stays in effect.
pub fn apply_overrides_from<I>(config: &mut FramewatchConfig, sources: &mut ConfigSources, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut rust_log = None;

    for (key, value) in vars {
        let applied = match key.as_str() {
            "FRAMEWATCH_SERVICE_BINARY" => {
                config.service.binary = expand_path(&value);
                true
            }
            "FRAMEWATCH_LOG_DIRECTORY" => {
                config.service.log_directory = expand_path(&value);
                true
            }
            "FRAMEWATCH_ENDPOINT" => {
                config.service.endpoint = value;
                true
            }
            "FRAMEWATCH_RPC_TIMEOUT_MS" => match value.parse() {
                Ok(ms) => {
                    config.service.rpc_timeout_ms = ms;
                    true
                }
                Err(_) => false,
            },
            "FRAMEWATCH_THRESHOLD_MS" => match value.parse() {
                Ok(ms) => {
                    config.trigger.frame_time_threshold_ms = ms;
                    true
                }
                Err(_) => false,
            },
            "FRAMEWATCH_CAPTURE_LENGTH_SECS" => match value.parse() {
                Ok(secs) => {
                    config.trigger.capture_length_secs = secs;
                    true
                }
                Err(_) => false,
            },
            "FRAMEWATCH_LOG_LEVEL" => {
                config.telemetry.log_level = value;
                true
            }
            "RUST_LOG" => {
                // Applied last so it wins over FRAMEWATCH_LOG_LEVEL
                rust_log = Some(value);
                false
            }
            _ => false,
        };

        if applied {
            sources.env_overrides.push(key);
        }
    }

    if let Some(filter) = rust_log {
        config.telemetry.log_level = filter;
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
            if let Ok(var_value) = env::var(var_name) {
                PathBuf::from(var_value).join(&stripped[slash_pos + 1..])
            } else {
                PathBuf::from(path)
            }
        } else {
            env::var(stripped)
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(path))
        }
    } else {
        PathBuf::from(path)
    }
}
