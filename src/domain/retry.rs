//! Bounded retry policy with exponential backoff.
//!
//! Retry behavior is a stated contract, not incidental: the attempt count,
//! base delay, and cap are named here and referenced by the synchronizer.
//! Only transient failures (transport errors, throttling, 5xx) are retried;
//! deterministic API errors abort immediately.

use std::time::Duration;

/// Retry parameters for one class of remote operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (so 3 = initial try + 2 retries).
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles per attempt.
    pub base_delay: Duration,
    /// Ceiling for the computed delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Policy for individual file uploads: 3 attempts, 500 ms base, 8 s cap.
    #[must_use]
    pub fn uploads() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }

    /// Delay to sleep after the given failed attempt (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(1u32 << exp);
        delay.min(self.max_delay)
    }
}
