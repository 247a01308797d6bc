//! Application configuration structures.

use augur_core::{LogFormat, TelemetryConfig};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application name and metadata.
    #[serde(default)]
    pub app: AppMetadata,

    /// Cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Application metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppMetadata {
    /// Application name.
    pub name: String,
    /// Application version.
    pub version: String,
    /// Environment (development, staging, production).
    pub environment: String,
}

impl Default for AppMetadata {
    fn default() -> Self {
        Self {
            name: "augur".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
        }
    }
}

/// Cache configuration.
///
/// `backend` is kept as a free-form tag so the cache factory, not the
/// deserializer, decides what an unknown value means.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Backend selector: `memory` or `redis`.
    pub backend: String,
    /// Process-local backend settings.
    pub memory: MemoryCacheConfig,
    /// Redis backend settings.
    pub redis: RedisCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            memory: MemoryCacheConfig::default(),
            redis: RedisCacheConfig::default(),
        }
    }
}

impl CacheConfig {
    /// A memory-backed configuration with default tuning.
    #[must_use]
    pub fn memory() -> Self {
        Self::default()
    }

    /// A redis-backed configuration.
    #[must_use]
    pub fn redis(redis: RedisCacheConfig) -> Self {
        Self {
            backend: "redis".to_string(),
            redis,
            ..Self::default()
        }
    }
}

/// Process-local sharded cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryCacheConfig {
    /// Number of independently locked shards.
    pub shard_count: usize,
    /// Janitor sweep interval in milliseconds. Zero disables the janitor.
    pub janitor_interval_ms: u64,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            shard_count: 32,
            janitor_interval_ms: 60_000,
        }
    }
}

impl MemoryCacheConfig {
    /// Returns the janitor interval as a Duration.
    #[must_use]
    pub const fn janitor_interval(&self) -> Duration {
        Duration::from_millis(self.janitor_interval_ms)
    }
}

/// Redis cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisCacheConfig {
    /// Server address as `host:port`.
    pub address: String,
    /// ACL username, if any.
    pub username: Option<String>,
    /// Password, if any.
    pub password: Option<String>,
    /// Logical database index.
    pub db: i64,
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// Connections opened eagerly at startup and kept idle.
    pub min_idle_conns: usize,
    /// Maximum retries when a connection cannot be acquired.
    pub max_retries: u32,
    /// Lower bound of the retry backoff in milliseconds.
    pub min_retry_backoff_ms: u64,
    /// Upper bound of the retry backoff in milliseconds.
    pub max_retry_backoff_ms: u64,
    /// Per-operation timeout in milliseconds. Zero selects the built-in default.
    pub operation_timeout_ms: u64,
    /// Optional namespace prepended to every key.
    pub key_prefix: Option<String>,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            address: "localhost:6379".to_string(),
            username: None,
            password: None,
            db: 0,
            pool_size: 10,
            min_idle_conns: 0,
            max_retries: 3,
            min_retry_backoff_ms: 8,
            max_retry_backoff_ms: 512,
            operation_timeout_ms: 0,
            key_prefix: None,
        }
    }
}

impl RedisCacheConfig {
    /// Built-in per-operation timeout used when none is configured.
    pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(3);

    /// Returns the effective per-operation timeout.
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        if self.operation_timeout_ms == 0 {
            Self::DEFAULT_OPERATION_TIMEOUT
        } else {
            Duration::from_millis(self.operation_timeout_ms)
        }
    }

    /// Returns the minimum retry backoff as a Duration.
    #[must_use]
    pub const fn min_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.min_retry_backoff_ms)
    }

    /// Returns the maximum retry backoff as a Duration.
    #[must_use]
    pub const fn max_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.max_retry_backoff_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Log format (json, pretty).
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Builds the tracing setup for the given service.
    ///
    /// An unparseable format falls back to pretty output; the validator
    /// reports it separately.
    #[must_use]
    pub fn telemetry(&self, service_name: &str) -> TelemetryConfig {
        TelemetryConfig {
            service_name: service_name.to_string(),
            log_level: self.log_level.clone(),
            log_format: self.log_format.parse().unwrap_or(LogFormat::Pretty),
        }
    }
}
