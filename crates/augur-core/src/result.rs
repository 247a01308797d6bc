//! Result type aliases for Augur.

use crate::AugurError;

/// A specialized `Result` type for Augur operations.
pub type AugurResult<T> = Result<T, AugurError>;
