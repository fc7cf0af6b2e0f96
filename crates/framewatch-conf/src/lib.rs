//! Configuration loading for the framewatch layer.
//!
//! The layer runs inside someone else's process, so this crate keeps its
//! dependency list short and never panics on a bad file: callers get a
//! `ConfigError` and decide whether to fall back to defaults.
//!
//! # Sections
//!
//! - **Service** (`ServiceConfig`): capture service binary, its log
//!   directory, the control endpoint and the per-request timeout.
//! - **Trigger** (`TriggerConfig`): frame-time threshold and capture length.
//! - **Telemetry** (`TelemetryConfig`): log level.
//!
//! # Config File Locations
//!
//! Files are loaded in order (later wins):
//! 1. `/etc/framewatch/config.toml` (system)
//! 2. `~/.config/framewatch/config.toml` (user)
//! 3. `./framewatch.toml` (local override, or an explicit path)
//! 4. Environment variables (`FRAMEWATCH_*`, `RUST_LOG`)
//!
//! # Example Config
//!
//! ```toml
//! [service]
//! binary = "/mnt/developer/OrbitCaptureGgpService"
//! log_directory = "/var/game/"
//! endpoint = "tcp://127.0.0.1:44767"
//! extra_args = ["-verbose"]
//! rpc_timeout_ms = 500
//!
//! [trigger]
//! frame_time_threshold_ms = 16.667
//! capture_length_secs = 10
//!
//! [telemetry]
//! log_level = "info"
//! ```

pub mod infra;
pub mod loader;
pub mod trigger;

pub use infra::{ServiceConfig, TelemetryConfig};
pub use loader::{discover_config_files_with_override, ConfigSources};
pub use trigger::TriggerConfig;

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

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Complete framewatch configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FramewatchConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub trigger: TriggerConfig,

    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl FramewatchConfig {
    /// Load configuration from all sources.
    ///
    /// Load order (later wins):
    /// 1. Compiled defaults
    /// 2. `/etc/framewatch/config.toml`
    /// 3. `~/.config/framewatch/config.toml`
    /// 4. `./framewatch.toml`
    /// 5. Environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(None)?;
        Ok(config)
    }

    /// Load configuration with `config_path` replacing the local override.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config, _sources) = Self::load_with_sources_from(config_path)?;
        Ok(config)
    }

    /// Load configuration from optional path and return information about sources.
    pub fn load_with_sources_from(
        config_path: Option<&Path>,
    ) -> Result<(Self, ConfigSources), ConfigError> {
        let files = loader::discover_config_files_with_override(config_path);
        Self::load_files(&files)
    }

    /// Apply the given files in order, then environment overrides, then validate.
    pub fn load_files(files: &[PathBuf]) -> Result<(Self, ConfigSources), ConfigError> {
        let mut sources = ConfigSources::default();
        let mut config = FramewatchConfig::default();

        for path in files {
            loader::apply_file(&mut config, path)?;
            sources.files.push(path.clone());
        }

        loader::apply_env_overrides(&mut config, &mut sources);
        config.validate()?;

        Ok((config, sources))
    }

    /// Reject values the trigger cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.trigger.frame_time_threshold_ms;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "trigger.frame_time_threshold_ms",
                message: format!("must be a positive number, got {}", threshold),
            });
        }
        if self.trigger.capture_length_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "trigger.capture_length_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if self.service.rpc_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "service.rpc_timeout_ms",
                message: "must be at least 1".to_string(),
            });
        }
        validate_endpoint(&self.service.endpoint)?;
        Ok(())
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> String {
        // Built by hand so the section order and comments stay stable
        let mut output = String::new();

        output.push_str("# framewatch configuration\n\n");

        output.push_str("[service]\n");
        output.push_str(&format!(
            "binary = {}\n",
            toml_string(&self.service.binary.display().to_string())
        ));
        output.push_str(&format!(
            "log_directory = {}\n",
            toml_string(&self.service.log_directory.display().to_string())
        ));
        output.push_str(&format!("endpoint = {}\n", toml_string(&self.service.endpoint)));
        output.push_str("extra_args = [");
        let args: Vec<String> = self
            .service
            .extra_args
            .iter()
            .map(|a| toml_string(a))
            .collect();
        output.push_str(&args.join(", "));
        output.push_str("]\n");
        output.push_str(&format!(
            "rpc_timeout_ms = {}\n",
            self.service.rpc_timeout_ms
        ));

        output.push_str("\n[trigger]\n");
        output.push_str(&format!(
            "frame_time_threshold_ms = {:?}\n",
            self.trigger.frame_time_threshold_ms
        ));
        output.push_str(&format!(
            "capture_length_secs = {}\n",
            self.trigger.capture_length_secs
        ));

        output.push_str("\n[telemetry]\n");
        output.push_str(&format!(
            "log_level = {}\n",
            toml_string(&self.telemetry.log_level)
        ));

        output
    }
}

/// Quoted and escaped TOML string literal.
fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

/// ZMQ transports the control client can connect over.
const ENDPOINT_TRANSPORTS: &[&str] = &["tcp", "ipc", "inproc"];

fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
    let invalid = |message: String| ConfigError::Invalid {
        field: "service.endpoint",
        message,
    };

    let (transport, address) = endpoint
        .split_once("://")
        .ok_or_else(|| invalid(format!("'{}' is not of the form tcp://host:port", endpoint)))?;
    if !ENDPOINT_TRANSPORTS.contains(&transport) {
        return Err(invalid(format!(
            "unsupported transport '{}', expected one of {}",
            transport,
            ENDPOINT_TRANSPORTS.join(", ")
        )));
    }
    if address.is_empty() {
        return Err(invalid(format!("'{}' has no address", endpoint)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = FramewatchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.trigger.capture_length_secs, 10);
    }

    #[test]
    fn test_validate_rejects_zero_capture_length() {
        let mut config = FramewatchConfig::default();
        config.trigger.capture_length_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "trigger.capture_length_secs",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_bad_threshold() {
        let mut config = FramewatchConfig::default();
        config.trigger.frame_time_threshold_ms = 0.0;
        assert!(config.validate().is_err());

        config.trigger.frame_time_threshold_ms = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_endpoint_without_transport() {
        let mut config = FramewatchConfig::default();
        for endpoint in ["", "127.0.0.1:44767", "udp://127.0.0.1:44767", "tcp://"] {
            config.service.endpoint = endpoint.to_string();
            let err = config.validate().unwrap_err();
            assert!(
                matches!(err, ConfigError::Invalid { field: "service.endpoint", .. }),
                "{} accepted",
                endpoint
            );
        }

        config.service.endpoint = "ipc:///tmp/framewatch.sock".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_toml_escapes_strings() {
        let mut config = FramewatchConfig::default();
        config.service.binary = PathBuf::from(r#"C:\capture\"service".exe"#);
        config.service.extra_args = vec![r#"-name="quoted \ arg""#.to_string()];

        let parsed: FramewatchConfig = toml::from_str(&config.to_toml()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_to_toml_parses_back() {
        let mut config = FramewatchConfig::default();
        config.service.extra_args = vec!["-verbose".to_string()];
        config.service.rpc_timeout_ms = 250;

        let toml_str = config.to_toml();
        let parsed: FramewatchConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
