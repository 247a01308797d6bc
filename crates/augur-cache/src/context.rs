//! Per-call execution context.

use std::time::Duration;
use tokio::time::Instant;

/// Execution context passed to every cache operation.
///
/// Carries an optional deadline. Network-backed caches bound each call by
/// the earlier of this deadline and their own operation timeout; the
/// in-process cache completes immediately and ignores it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheContext {
    deadline: Option<Instant>,
}

impl CacheContext {
    /// A context without a deadline.
    #[must_use]
    pub const fn background() -> Self {
        Self { deadline: None }
    }

    /// A context that expires `timeout` from now.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// A context that expires at `deadline`.
    #[must_use]
    pub const fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }

    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true once the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// The earlier of the context deadline and `now + op_timeout`.
    #[must_use]
    pub fn effective_deadline(&self, op_timeout: Duration) -> Instant {
        let op_deadline = Instant::now() + op_timeout;
        match self.deadline {
            Some(d) if d < op_deadline => d,
            _ => op_deadline,
        }
    }
}
