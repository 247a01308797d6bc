//! Configuration validation module.
//!
//! Collects every problem in one pass and fails fast at startup rather than
//! on the first cache call.

use crate::{AppConfig, CacheBackend};
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// Cache backend tag is not recognized.
    UnknownCacheBackend { value: String },
    /// Shard count must be at least one.
    ZeroShardCount,
    /// Pool size must be at least one.
    ZeroPoolSize,
    /// Pool size exceeds maximum allowed.
    PoolSizeTooLarge { value: usize, maximum: usize },
    /// More idle connections requested than the pool can hold.
    InvalidIdleConnections { min_idle: usize, pool_size: usize },
    /// Retry backoff bounds are inverted.
    InvalidRetryBackoff { min_ms: u64, max_ms: u64 },
    /// Address or URL format is invalid.
    InvalidAddress { name: String, message: String },
    /// Log level is invalid.
    InvalidLogLevel { value: String },
    /// Log format is invalid.
    InvalidLogFormat { value: String },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCacheBackend { value } => {
                write!(f, "Unknown cache backend '{}' (valid: memory, redis)", value)
            }
            Self::ZeroShardCount => write!(f, "cache.memory.shard_count must be at least 1"),
            Self::ZeroPoolSize => write!(f, "cache.redis.pool_size must be at least 1"),
            Self::PoolSizeTooLarge { value, maximum } => {
                write!(f, "Pool size {} exceeds maximum allowed ({})", value, maximum)
            }
            Self::InvalidIdleConnections { min_idle, pool_size } => {
                write!(
                    f,
                    "min_idle_conns ({}) cannot be greater than pool_size ({})",
                    min_idle, pool_size
                )
            }
            Self::InvalidRetryBackoff { min_ms, max_ms } => {
                write!(
                    f,
                    "min_retry_backoff_ms ({}) cannot be greater than max_retry_backoff_ms ({})",
                    min_ms, max_ms
                )
            }
            Self::InvalidAddress { name, message } => {
                write!(f, "Invalid {} address: {}", name, message)
            }
            Self::InvalidLogLevel { value } => {
                write!(
                    f,
                    "Invalid log level: '{}' (valid: trace, debug, info, warn, error)",
                    value
                )
            }
            Self::InvalidLogFormat { value } => {
                write!(f, "Invalid log format: '{}' (valid: pretty, json)", value)
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum connection pool size.
    const MAX_POOL_SIZE: usize = 1000;
    /// Valid log levels.
    const VALID_LOG_LEVELS: &'static [&'static str] = &["trace", "debug", "info", "warn", "error"];

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        Self::validate_cache(&config.cache, &mut errors);
        Self::validate_observability(&config.observability, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn validate_cache(config: &crate::CacheConfig, errors: &mut Vec<ConfigValidationError>) {
        let backend = match config.backend.parse::<CacheBackend>() {
            Ok(backend) => backend,
            Err(_) => {
                errors.push(ConfigValidationError::UnknownCacheBackend {
                    value: config.backend.clone(),
                });
                return;
            }
        };

        match backend {
            CacheBackend::Memory => {
                if config.memory.shard_count == 0 {
                    errors.push(ConfigValidationError::ZeroShardCount);
                }
            }
            CacheBackend::Redis => Self::validate_redis(&config.redis, errors),
        }
    }

    fn validate_redis(config: &crate::RedisCacheConfig, errors: &mut Vec<ConfigValidationError>) {
        if let Err(message) = Self::check_address(&config.address) {
            errors.push(ConfigValidationError::InvalidAddress {
                name: "cache.redis".to_string(),
                message,
            });
        }

        if config.pool_size == 0 {
            errors.push(ConfigValidationError::ZeroPoolSize);
        }
        if config.pool_size > Self::MAX_POOL_SIZE {
            errors.push(ConfigValidationError::PoolSizeTooLarge {
                value: config.pool_size,
                maximum: Self::MAX_POOL_SIZE,
            });
        }
        if config.min_idle_conns > config.pool_size {
            errors.push(ConfigValidationError::InvalidIdleConnections {
                min_idle: config.min_idle_conns,
                pool_size: config.pool_size,
            });
        }

        if config.min_retry_backoff_ms > config.max_retry_backoff_ms {
            errors.push(ConfigValidationError::InvalidRetryBackoff {
                min_ms: config.min_retry_backoff_ms,
                max_ms: config.max_retry_backoff_ms,
            });
        }
    }

    /// Checks that `address` is a `host:port` pair.
    fn check_address(address: &str) -> Result<(), String> {
        if address.trim().is_empty() {
            return Err("address cannot be empty".to_string());
        }

        let url = Url::parse(&format!("redis://{}", address))
            .map_err(|e| format!("'{}' is not host:port ({})", address, e))?;

        if url.host_str().map_or(true, str::is_empty) {
            return Err(format!("'{}' has no host", address));
        }
        if url.port().is_none() {
            return Err(format!("'{}' has no port", address));
        }
        if url.path() != "" && url.path() != "/" {
            return Err(format!("'{}' must not contain a path", address));
        }

        Ok(())
    }

    fn validate_observability(config: &crate::ObservabilityConfig, errors: &mut Vec<ConfigValidationError>) {
        let level = config.log_level.to_lowercase();
        if !Self::VALID_LOG_LEVELS.contains(&level.as_str()) {
            errors.push(ConfigValidationError::InvalidLogLevel {
                value: config.log_level.clone(),
            });
        }

        if config.log_format.parse::<augur_core::LogFormat>().is_err() {
            errors.push(ConfigValidationError::InvalidLogFormat {
                value: config.log_format.clone(),
            });
        }
    }
}
