//! Frame timing monitor.
//!
//! Called once per present on the presenting thread. It only reads the clock
//! and swaps one timestamp, so it is cheap enough to run on every frame.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;

/// One observation from the present hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSample {
    /// First present of the session; there is no previous frame to measure from.
    First { at: Instant },
    /// Time since the previous present.
    Interval { at: Instant, duration: Duration },
}

impl FrameSample {
    /// When this frame was presented.
    pub fn at(&self) -> Instant {
        match *self {
            FrameSample::First { at } | FrameSample::Interval { at, .. } => at,
        }
    }

    pub fn duration(&self) -> Option<Duration> {
        match *self {
            FrameSample::First { .. } => None,
            FrameSample::Interval { duration, .. } => Some(duration),
        }
    }
}

/// Timestamps the layer keeps between frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameTimestamps {
    /// Most recently presented frame.
    pub last_frame: Option<Instant>,
    /// Start of the running capture, if one is believed to be running.
    pub capture_started: Option<Instant>,
}

/// Measures inter-frame duration.
pub struct FrameTimingMonitor {
    clock: Arc<dyn Clock>,
    last_frame: Option<Instant>,
}

impl FrameTimingMonitor {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            last_frame: None,
        }
    }

    /// Record a present and return the time since the previous one.
    ///
    /// The stored timestamp is always updated, even when the caller goes on
    /// to ignore the sample.
    pub fn on_frame_presented(&mut self) -> FrameSample {
        let now = self.clock.now();
        let sample = match self.last_frame {
            None => FrameSample::First { at: now },
            Some(previous) => FrameSample::Interval {
                at: now,
                duration: now.saturating_duration_since(previous),
            },
        };
        self.last_frame = Some(now);
        sample
    }

    pub fn last_frame(&self) -> Option<Instant> {
        self.last_frame
    }

    /// Forget the previous frame; the next call reports `First` again.
    pub fn reset(&mut self) {
        self.last_frame = None;
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
