//! Per-host layer session.
//!
//! The host creates one `LayerSession`, calls [`LayerSession::init_layer_data`]
//! before its first frame, [`LayerSession::on_frame_presented`] once per
//! present, and [`LayerSession::clean_layer_data`] at teardown.

use std::sync::Arc;

use framewatch_conf::FramewatchConfig;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::control::{CaptureControl, ControlConnector, Unavailable, ZmqConnector};
use crate::error::LaunchError;
use crate::launcher::{CommandSpawner, LaunchStatus, ProcessSpawner, ServiceLauncher};
use crate::monitor::{FrameTimestamps, FrameTimingMonitor};
use crate::trigger::{CaptureTrigger, TriggerEvent, TriggerPolicy, TriggerState, TriggerStats};

/// Everything the layer keeps between frames.
///
/// All methods take `&mut self` and are meant to be called from the
/// presenting thread. A host that presents from several threads wraps the
/// session in a `Mutex`; the lock then also guards the init-once check.
pub struct LayerSession {
    launcher: ServiceLauncher,
    connector: Box<dyn ControlConnector>,
    control: Option<Box<dyn CaptureControl>>,
    monitor: FrameTimingMonitor,
    trigger: CaptureTrigger,
    initialised: bool,
}

impl LayerSession {
    /// Production session: real process spawn, ZMQ control channel, system
    /// clock, monitoring the current process.
    pub fn new(config: &FramewatchConfig) -> Self {
        Self::with_parts(
            config,
            Box::new(CommandSpawner),
            Box::new(ZmqConnector),
            Arc::new(SystemClock),
            std::process::id(),
        )
    }

    pub fn with_parts(
        config: &FramewatchConfig,
        spawner: Box<dyn ProcessSpawner>,
        connector: Box<dyn ControlConnector>,
        clock: Arc<dyn Clock>,
        monitored_pid: u32,
    ) -> Self {
        Self {
            launcher: ServiceLauncher::new(spawner, config.service.clone(), monitored_pid),
            connector,
            control: None,
            monitor: FrameTimingMonitor::new(clock),
            trigger: CaptureTrigger::new(TriggerPolicy::from_config(&config.trigger)),
            initialised: false,
        }
    }

    /// Open the control channel and launch the capture service.
    ///
    /// Safe to call more than once; only the first call of a session does
    /// anything. Failures are logged and leave the session with a control
    /// that never sends a request, so no capture will ever start.
    pub fn init_layer_data(&mut self) {
        if self.initialised {
            debug!("layer data already initialised");
            return;
        }
        self.initialised = true;

        let control = match self.bring_up() {
            Ok(control) => control,
            Err(e) => {
                warn!("capture triggering disabled: {}", e);
                Box::new(Unavailable)
            }
        };
        self.control = Some(control);
        info!("layer data initialised");
    }

    /// Open the control channel first: it does not need the service, and a
    /// bad endpoint must fail before a child exists that nobody can shut down.
    fn bring_up(&mut self) -> Result<Box<dyn CaptureControl>, LaunchError> {
        let control = self.connector.connect(self.launcher.config())?;
        match self.launcher.ensure_service_running()? {
            LaunchStatus::Launched { .. } => Ok(control),
            // ensure_service_running only reports these after an earlier attempt
            LaunchStatus::NotStarted | LaunchStatus::Failed => Ok(Box::new(Unavailable)),
        }
    }

    /// Feed one presented frame through the monitor and the trigger.
    ///
    /// The frame timestamp is recorded even when the session is not
    /// initialised; the trigger only runs when it is.
    ///
    /// If handling the frame blocked for longer than the frame threshold
    /// (a slow control request), the next frame is not evaluated: its
    /// duration would mostly measure our own stall.
    pub fn on_frame_presented(&mut self) -> TriggerEvent {
        let sample = self.monitor.on_frame_presented();
        let event = match self.control.as_deref_mut() {
            Some(control) if self.initialised => self.trigger.on_frame(sample, control),
            _ => return TriggerEvent::Disabled,
        };

        let hook_cost = self.monitor.clock().now().saturating_duration_since(sample.at());
        if self.trigger.policy().exceeds_threshold(hook_cost) {
            debug!("frame hook took {:?}", hook_cost);
            self.trigger.discard_next_sample();
        }
        event
    }

    /// Ask the service to shut down and drop all session state.
    ///
    /// Idempotent. Afterwards frames are ignored until `init_layer_data`
    /// runs again.
    pub fn clean_layer_data(&mut self) {
        if !self.initialised {
            return;
        }

        if let Some(mut control) = self.control.take() {
            if self.trigger.state().is_capturing() {
                debug!("shutting down with a capture still running");
            }
            control.shutdown();
        }
        self.launcher.reset();
        self.monitor.reset();
        self.trigger.reset();
        self.initialised = false;
        info!("layer data cleaned");
    }

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn state(&self) -> TriggerState {
        self.trigger.state()
    }

    pub fn stats(&self) -> TriggerStats {
        self.trigger.stats()
    }

    pub fn launch_status(&self) -> LaunchStatus {
        self.launcher.status()
    }

    pub fn timestamps(&self) -> FrameTimestamps {
        FrameTimestamps {
            last_frame: self.monitor.last_frame(),
            capture_started: self.trigger.capture_started(),
        }
    }
}

impl Drop for LayerSession {
    fn drop(&mut self) {
        self.clean_layer_data();
    }
}
