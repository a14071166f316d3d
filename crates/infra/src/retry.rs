//! Retry policy for reads that may hit a transient outage.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How often, and how patiently, to repeat a failed call.
///
/// `max_attempts` counts every attempt including the first, so a policy of 3
/// makes at most two retries. The wait grows linearly: `base_delay * attempt`,
/// never longer than `max_delay`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// Three attempts, 500ms then 1000ms apart.
    fn default() -> Self {
        Self::linear(3, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay: Duration::from_secs(60),
        }
    }

    /// Delay to wait after failed attempt number `attempt` (1-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt).min(self.max_delay)
    }

    /// Whether another attempt may follow failed attempt number `attempt`.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
