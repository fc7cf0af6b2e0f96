//! Capture trigger state machine.
//!
//! Consumes one [`FrameSample`] per presented frame and decides whether to
//! start, keep running, or stop a capture through a [`CaptureControl`].
//!
//! ```text
//!   Idle{armed: false} ──any frame──▶ Idle{armed: true}
//!   Idle{armed: true}  ──frame > threshold, start accepted──▶ Capturing{confirmed: true}
//!                      ──frame > threshold, start unanswered──▶ Capturing{confirmed: false}
//!   Capturing          ──elapsed >= length, stop accepted──▶ PostCaptureCooldown
//!   Capturing{confirmed: false} ──stop refused──▶ PostCaptureCooldown
//!   PostCaptureCooldown ──any frame──▶ Idle{armed: true}
//! ```
//!
//! A start that is refused or never sent leaves the trigger armed; a stop
//! that is not accepted leaves it capturing. Either way the next frame
//! re-evaluates.
//!
//! An unanswered start may have started a recording, so it is treated as a
//! capture that will be stopped after the usual length. If the service then
//! refuses the stop, no recording was running and the capture is abandoned.

use std::fmt;
use std::time::{Duration, Instant};

use framewatch_conf::TriggerConfig;
use tracing::{debug, info, warn};

use crate::control::{CaptureControl, RequestOutcome};
use crate::monitor::FrameSample;

/// Threshold and capture length the trigger runs with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerPolicy {
    /// A frame must take strictly longer than this, in milliseconds.
    pub frame_time_threshold_ms: f64,
    pub capture_length: Duration,
}

impl TriggerPolicy {
    pub fn from_config(config: &TriggerConfig) -> Self {
        Self {
            frame_time_threshold_ms: config.frame_time_threshold_ms,
            capture_length: config.capture_length(),
        }
    }

    pub fn exceeds_threshold(&self, frame_time: Duration) -> bool {
        frame_millis(frame_time) > self.frame_time_threshold_ms
    }

    /// Elapsed time is truncated to whole seconds before comparing.
    pub fn capture_complete(&self, elapsed: Duration) -> bool {
        Duration::from_secs(elapsed.as_secs()) >= self.capture_length
    }
}

impl Default for TriggerPolicy {
    fn default() -> Self {
        Self::from_config(&TriggerConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    /// Waiting for a slow frame. Unarmed means the next frame is skipped.
    Idle { armed: bool },
    /// `confirmed` is false when the start request went unanswered.
    Capturing { started_at: Instant, confirmed: bool },
    /// The frame after a stop is not evaluated.
    PostCaptureCooldown,
}

impl TriggerState {
    pub fn is_capturing(&self) -> bool {
        matches!(self, TriggerState::Capturing { .. })
    }
}

impl Default for TriggerState {
    fn default() -> Self {
        TriggerState::Idle { armed: false }
    }
}

impl fmt::Display for TriggerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerState::Idle { armed: false } => write!(f, "idle (unarmed)"),
            TriggerState::Idle { armed: true } => write!(f, "idle"),
            TriggerState::Capturing {
                confirmed: true, ..
            } => write!(f, "capturing"),
            TriggerState::Capturing {
                confirmed: false, ..
            } => write!(f, "capturing (?)"),
            TriggerState::PostCaptureCooldown => write!(f, "cooldown"),
        }
    }
}

/// What a single frame did to the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    /// First frame of the session, or first after a reset; not evaluated.
    FirstFrameSkipped,
    /// Frame right after a capture stopped; not evaluated.
    CooldownSkipped,
    /// Frame right after a slow hook call; its duration includes our own
    /// blocking, so it is not evaluated.
    SampleDiscarded,
    WithinBudget { frame_time: Duration },
    CaptureStarted { started_at: Instant, frame_time: Duration },
    /// Start was sent but not answered; capturing on the assumption it ran.
    StartUnconfirmed { started_at: Instant, frame_time: Duration },
    StartRejected { frame_time: Duration },
    Capturing { elapsed: Duration },
    CaptureStopped { elapsed: Duration },
    /// Stop refused for a capture whose start was never confirmed.
    CaptureAbandoned { elapsed: Duration },
    StopRejected { elapsed: Duration },
    /// The session is not initialised; nothing was evaluated.
    Disabled,
}

/// Running counters, reset with the trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerStats {
    pub frames_observed: u64,
    pub frames_over_threshold: u64,
    pub captures_started: u64,
    pub unconfirmed_starts: u64,
    pub start_rejections: u64,
    pub captures_stopped: u64,
    pub captures_abandoned: u64,
    pub stop_rejections: u64,
    pub samples_discarded: u64,
}

pub struct CaptureTrigger {
    policy: TriggerPolicy,
    state: TriggerState,
    stats: TriggerStats,
    discard_next: bool,
}

impl CaptureTrigger {
    pub fn new(policy: TriggerPolicy) -> Self {
        Self {
            policy,
            state: TriggerState::default(),
            stats: TriggerStats::default(),
            discard_next: false,
        }
    }

    pub fn policy(&self) -> &TriggerPolicy {
        &self.policy
    }

    pub fn state(&self) -> TriggerState {
        self.state
    }

    pub fn stats(&self) -> TriggerStats {
        self.stats
    }

    /// Start of the running capture, if one is believed to be running.
    pub fn capture_started(&self) -> Option<Instant> {
        match self.state {
            TriggerState::Capturing { started_at, .. } => Some(started_at),
            _ => None,
        }
    }

    /// Do not evaluate the next frame's duration against the threshold.
    ///
    /// Called when handling a frame blocked the presenting thread long
    /// enough to make the following frame look slow.
    pub fn discard_next_sample(&mut self) {
        self.discard_next = true;
    }

    /// Back to unarmed idle with fresh counters.
    pub fn reset(&mut self) {
        self.state = TriggerState::default();
        self.stats = TriggerStats::default();
        self.discard_next = false;
    }

    /// Advance the state machine by one presented frame.
    pub fn on_frame(
        &mut self,
        sample: FrameSample,
        control: &mut dyn CaptureControl,
    ) -> TriggerEvent {
        self.stats.frames_observed += 1;
        let discard = std::mem::take(&mut self.discard_next);

        match self.state {
            TriggerState::Idle { armed: false } => {
                self.state = TriggerState::Idle { armed: true };
                TriggerEvent::FirstFrameSkipped
            }
            TriggerState::PostCaptureCooldown => {
                self.state = TriggerState::Idle { armed: true };
                TriggerEvent::CooldownSkipped
            }
            TriggerState::Idle { armed: true } if discard => {
                self.stats.samples_discarded += 1;
                debug!("discarding frame measured across a slow hook call");
                TriggerEvent::SampleDiscarded
            }
            TriggerState::Idle { armed: true } => match sample {
                // Monitor was reset under an armed trigger: nothing to measure yet
                FrameSample::First { .. } => TriggerEvent::FirstFrameSkipped,
                FrameSample::Interval { at, duration } => self.evaluate_idle(at, duration, control),
            },
            TriggerState::Capturing {
                started_at,
                confirmed,
            } => self.evaluate_capturing(sample.at(), started_at, confirmed, control),
        }
    }

    fn evaluate_idle(
        &mut self,
        at: Instant,
        frame_time: Duration,
        control: &mut dyn CaptureControl,
    ) -> TriggerEvent {
        if !self.policy.exceeds_threshold(frame_time) {
            return TriggerEvent::WithinBudget { frame_time };
        }

        self.stats.frames_over_threshold += 1;
        info!(
            "Time frame is {:.3}ms and exceeds the {:.3}ms threshold; starting capture",
            frame_millis(frame_time),
            self.policy.frame_time_threshold_ms
        );

        match control.start_capture() {
            RequestOutcome::Accepted => {
                self.stats.captures_started += 1;
                self.state = TriggerState::Capturing {
                    started_at: at,
                    confirmed: true,
                };
                TriggerEvent::CaptureStarted {
                    started_at: at,
                    frame_time,
                }
            }
            RequestOutcome::Unanswered => {
                self.stats.unconfirmed_starts += 1;
                warn!("start capture went unanswered; assuming it is recording");
                self.state = TriggerState::Capturing {
                    started_at: at,
                    confirmed: false,
                };
                TriggerEvent::StartUnconfirmed {
                    started_at: at,
                    frame_time,
                }
            }
            RequestOutcome::Refused | RequestOutcome::NotSent => {
                self.stats.start_rejections += 1;
                warn!("capture did not start; staying armed");
                TriggerEvent::StartRejected { frame_time }
            }
        }
    }

    fn evaluate_capturing(
        &mut self,
        at: Instant,
        started_at: Instant,
        confirmed: bool,
        control: &mut dyn CaptureControl,
    ) -> TriggerEvent {
        let elapsed = at.saturating_duration_since(started_at);
        if !self.policy.capture_complete(elapsed) {
            return TriggerEvent::Capturing { elapsed };
        }

        info!(
            "Capture has been running for {}s; stopping it",
            elapsed.as_secs()
        );

        match control.stop_and_save() {
            RequestOutcome::Accepted => {
                self.stats.captures_stopped += 1;
                self.state = TriggerState::PostCaptureCooldown;
                debug!("capture saved; skipping the next frame");
                TriggerEvent::CaptureStopped { elapsed }
            }
            RequestOutcome::Refused if !confirmed => {
                self.stats.captures_abandoned += 1;
                self.state = TriggerState::PostCaptureCooldown;
                info!("service has no capture to stop; the unanswered start never ran");
                TriggerEvent::CaptureAbandoned { elapsed }
            }
            RequestOutcome::Refused | RequestOutcome::Unanswered | RequestOutcome::NotSent => {
                self.stats.stop_rejections += 1;
                warn!("capture did not stop; retrying on the next frame");
                TriggerEvent::StopRejected { elapsed }
            }
        }
    }
}

impl Default for CaptureTrigger {
    fn default() -> Self {
        Self::new(TriggerPolicy::default())
    }
}

fn frame_millis(frame_time: Duration) -> f64 {
    frame_time.as_secs_f64() * 1000.0
}
