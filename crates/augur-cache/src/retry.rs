//! Backoff policy for acquiring Redis connections.

use augur_config::RedisCacheConfig;
use std::time::Duration;

/// Exponential backoff bounded by a minimum and maximum delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub min_backoff: Duration,
    /// Upper bound on any delay.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            min_backoff: Duration::from_millis(8),
            max_backoff: Duration::from_millis(512),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            min_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn from_config(config: &RedisCacheConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            min_backoff: config.min_retry_backoff(),
            max_backoff: config.max_retry_backoff(),
        }
    }

    /// Delay before retry number `attempt` (1-based), doubling each time.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.min_backoff
            .checked_mul(factor)
            .unwrap_or(self.max_backoff)
            .min(self.max_backoff)
    }
}
