// src/notify/policy.rs
use std::time::Duration;

/// Retry/backoff/timeout policy for one delivery target, kept as a pure
/// value so the arithmetic is testable without any network code.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_timeout: Duration,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Per-attempt deadline, growing linearly with the attempt number
    /// (attempts are 1-based).
    pub fn attempt_timeout(&self, attempt: u8) -> Duration {
        self.base_timeout * u32::from(attempt.max(1))
    }

    /// Delay before the next attempt, doubling each time. `None` after the
    /// final attempt: the caller records the failure instead of sleeping.
    pub fn backoff_delay(&self, attempt: u8) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        Some(self.initial_backoff * (1u32 << (attempt.max(1) - 1)))
    }
}
