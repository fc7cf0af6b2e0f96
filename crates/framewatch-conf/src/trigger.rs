//! Trigger policy - when a capture starts and how long it runs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Thresholds driving the capture trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Inter-frame duration, in milliseconds, that a frame must strictly
    /// exceed to start a capture.
    /// Default: 1000 / 60 (one 60 Hz frame)
    #[serde(default = "TriggerConfig::default_frame_time_threshold_ms")]
    pub frame_time_threshold_ms: f64,

    /// Seconds a capture runs before it is stopped and saved.
    /// Default: 10
    #[serde(default = "TriggerConfig::default_capture_length_secs")]
    pub capture_length_secs: u64,
}

impl TriggerConfig {
    fn default_frame_time_threshold_ms() -> f64 {
        1000.0 / 60.0
    }

    fn default_capture_length_secs() -> u64 {
        10
    }

    pub fn capture_length(&self) -> Duration {
        Duration::from_secs(self.capture_length_secs)
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            frame_time_threshold_ms: Self::default_frame_time_threshold_ms(),
            capture_length_secs: Self::default_capture_length_secs(),
        }
    }
}
