//! Framewatch: frame-timing capture trigger
//!
//! Runs inside a rendering process, hooked into frame presentation. When a
//! frame takes longer than the configured threshold it asks an out-of-process
//! capture service to record for a fixed length of time, then saves it.
//!
//! - **Launcher**: spawns the capture service once per session
//! - **Control**: start / stop-and-save / shutdown over the `captureproto` channel
//! - **Monitor**: inter-frame duration from a `Clock`
//! - **Trigger**: the idle / capturing / cooldown state machine
//!
//! A host owns a [`LayerSession`] and drives it from its present hook:
//!
//! ```no_run
//! use framewatch::LayerSession;
//! use framewatch_conf::FramewatchConfig;
//!
//! let config = FramewatchConfig::load().unwrap_or_default();
//! let mut session = LayerSession::new(&config);
//! session.init_layer_data();
//! loop {
//!     // ... render and present ...
//!     session.on_frame_presented();
//! #   break;
//! }
//! session.clean_layer_data();
//! ```

pub mod clock;
pub mod control;
pub mod error;
pub mod launcher;
pub mod monitor;
pub mod session;
pub mod telemetry;
pub mod trigger;

pub use clock::{Clock, ManualClock, SystemClock};
pub use control::{
    CaptureControl, ControlConnector, DryRun, RequestOutcome, Unavailable, ZmqConnector,
};
pub use error::LaunchError;
pub use launcher::{CommandSpawner, LaunchStatus, ProcessSpawner, ServiceLauncher};
pub use monitor::{FrameSample, FrameTimestamps, FrameTimingMonitor};
pub use session::LayerSession;
pub use trigger::{CaptureTrigger, TriggerEvent, TriggerPolicy, TriggerState, TriggerStats};
