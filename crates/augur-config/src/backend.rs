//! Cache backend selector.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which cache implementation a process runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    /// Process-local sharded cache.
    #[default]
    Memory,
    /// Redis-backed distributed cache.
    Redis,
}

impl CacheBackend {
    /// Returns true if entries are shared between processes.
    #[must_use]
    pub const fn is_distributed(&self) -> bool {
        matches!(self, Self::Redis)
    }
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Redis => write!(f, "redis"),
        }
    }
}

/// Returned when a backend tag is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBackend(pub String);

impl fmt::Display for UnknownBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown cache backend '{}'", self.0)
    }
}

impl std::error::Error for UnknownBackend {}

impl FromStr for CacheBackend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "mem" | "local" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("memory".parse::<CacheBackend>().unwrap(), CacheBackend::Memory);
        assert_eq!("Local".parse::<CacheBackend>().unwrap(), CacheBackend::Memory);
        assert_eq!(" REDIS ".parse::<CacheBackend>().unwrap(), CacheBackend::Redis);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "dynamo".parse::<CacheBackend>().unwrap_err();
        assert_eq!(err, UnknownBackend("dynamo".to_string()));
        assert_eq!(err.to_string(), "unknown cache backend 'dynamo'");
    }

    #[test]
    fn test_display_round_trips() {
        for backend in [CacheBackend::Memory, CacheBackend::Redis] {
            assert_eq!(backend.to_string().parse::<CacheBackend>().unwrap(), backend);
        }
        assert!(CacheBackend::Redis.is_distributed());
        assert!(!CacheBackend::Memory.is_distributed());
    }
}
