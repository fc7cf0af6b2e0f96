//! Lazy Pirate settings for the blocking control client.
//!
//! A REQ socket that never gets its reply is wedged: it refuses to send
//! again. `CaptureClient` handles that the zguide way, by throwing the socket
//! away and opening a new one, then either trying once more or giving up.
//!
//! Requests run on the presenting thread, so defaults are one short attempt.
//! A missed start or stop is picked up again by a later frame.

use std::time::Duration;

/// How long a control request may wait, and how often it is repeated.
#[derive(Debug, Clone, PartialEq)]
pub struct LazyPirateConfig {
    /// Wait for a reply, per attempt.
    pub reply_timeout: Duration,
    /// Extra attempts after the first.
    pub retries: u32,
    /// Pause before the first retry; doubles for each later one.
    pub retry_delay: Duration,
    pub max_retry_delay: Duration,
    /// Missed replies in a row before the service is reported dead.
    pub dead_after_failures: u32,
    /// While dead, requests fail without being sent except for one attempt
    /// per interval.
    pub dead_retry_interval: Duration,
}

impl Default for LazyPirateConfig {
    fn default() -> Self {
        Self {
            reply_timeout: Duration::from_millis(500),
            retries: 0,
            retry_delay: Duration::from_millis(10),
            max_retry_delay: Duration::from_millis(100),
            dead_after_failures: 3,
            dead_retry_interval: Duration::from_secs(2),
        }
    }
}

impl LazyPirateConfig {
    pub fn with_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_dead_retry_interval(mut self, dead_retry_interval: Duration) -> Self {
        self.dead_retry_interval = dead_retry_interval;
        self
    }

    /// Total attempts per request, the first one included.
    pub fn attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }

    /// Pause before attempt number `attempt` (0 is the first send).
    pub fn delay_before(&self, attempt: u32) -> Duration {
        match attempt {
            0 => Duration::ZERO,
            n => {
                let doublings = (n - 1).min(16);
                self.retry_delay
                    .saturating_mul(1 << doublings)
                    .min(self.max_retry_delay)
            }
        }
    }

    /// Longest a single request can hold the caller: every attempt times
    /// out and every pause is taken.
    pub fn worst_case_block(&self) -> Duration {
        (0..self.attempts()).fold(Duration::ZERO, |total, attempt| {
            total
                .saturating_add(self.delay_before(attempt))
                .saturating_add(self.reply_timeout)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_short_attempt_by_default() {
        let config = LazyPirateConfig::default();
        assert_eq!(config.attempts(), 1);
        assert_eq!(config.worst_case_block(), Duration::from_millis(500));
    }

    #[test]
    fn test_delay_doubles_up_to_cap() {
        let config = LazyPirateConfig::default();

        let delays: Vec<u64> = (0..7)
            .map(|n| config.delay_before(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![0, 10, 20, 40, 80, 100, 100]);
        assert_eq!(config.delay_before(u32::MAX), Duration::from_millis(100));
    }

    #[test]
    fn test_worst_case_counts_pauses() {
        let config = LazyPirateConfig::default()
            .with_timeout(Duration::from_millis(200))
            .with_retries(2);
        // 200 + (10 + 200) + (20 + 200)
        assert_eq!(config.worst_case_block(), Duration::from_millis(630));
    }
}
