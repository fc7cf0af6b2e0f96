//! Infrastructure configuration - where the capture service lives and how
//! to reach it. Fixed for the lifetime of a layer session.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Capture service launch and control-channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Capture service executable.
    /// Default: /mnt/developer/OrbitCaptureGgpService
    #[serde(default = "ServiceConfig::default_binary")]
    pub binary: PathBuf,

    /// Directory the service writes its logs into, passed as `-log_directory`.
    /// Default: /var/game/
    #[serde(default = "ServiceConfig::default_log_directory")]
    pub log_directory: PathBuf,

    /// ZMQ endpoint of the service control channel.
    /// Default: tcp://127.0.0.1:44767
    #[serde(default = "ServiceConfig::default_endpoint")]
    pub endpoint: String,

    /// Arguments appended after `-pid` and `-log_directory`.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Upper bound on a single control request round trip, in milliseconds.
    /// The request blocks the presenting thread for at most this long.
    /// Default: 500
    #[serde(default = "ServiceConfig::default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
}

impl ServiceConfig {
    pub const DEFAULT_PORT: u16 = 44767;

    fn default_binary() -> PathBuf {
        PathBuf::from("/mnt/developer/OrbitCaptureGgpService")
    }

    fn default_log_directory() -> PathBuf {
        PathBuf::from("/var/game/")
    }

    fn default_endpoint() -> String {
        format!("tcp://127.0.0.1:{}", Self::DEFAULT_PORT)
    }

    fn default_rpc_timeout_ms() -> u64 {
        500
    }

    /// The request timeout as a `Duration`.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            binary: Self::default_binary(),
            log_directory: Self::default_log_directory(),
            endpoint: Self::default_endpoint(),
            extra_args: Vec::new(),
            rpc_timeout_ms: Self::default_rpc_timeout_ms(),
        }
    }
}

/// Logging configuration.
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
