//! Cache error types.

use augur_core::AugurError;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors returned by cache operations.
///
/// `Miss` is an expected outcome, not a fault: callers recompute the value
/// and write it back. Every other variant is a real failure and must not be
/// treated as a miss.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// Key is absent or expired.
    #[error("cache miss")]
    Miss,

    /// Value could not be encoded, or stored bytes could not be decoded.
    #[error("Cache serialization error: {0}")]
    Serialization(String),

    /// Operation exceeded its deadline.
    #[error("Cache operation timed out: {0}")]
    Timeout(String),

    /// Backend unreachable, pool exhausted or closed.
    #[error("Cache connection error: {0}")]
    Connectivity(String),

    /// Backend answered with an error reply.
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// Factory was given a backend tag it does not know.
    #[error("Unknown cache backend: {0}")]
    UnknownBackend(String),

    /// Cache settings are unusable.
    #[error("Cache configuration error: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Returns true for the expected miss outcome.
    #[must_use]
    pub const fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

    /// Returns true if retrying the same call may succeed.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connectivity(_))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<CacheError> for AugurError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Timeout(msg) => Self::Timeout(msg),
            CacheError::UnknownBackend(_) | CacheError::Configuration(_) => {
                Self::Configuration(err.to_string())
            }
            other => Self::Cache(other.to_string()),
        }
    }
}
