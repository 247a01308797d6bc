//! # Augur Cache
//!
//! Generic caching for the Augur backend. One contract, [`Cache`], with two
//! implementations:
//!
//! - [`MemoryCache`]: process-local, sharded, TTL-aware, with a background
//!   janitor that reclaims expired entries.
//! - [`RedisCache`]: a pooled Redis client storing JSON-encoded values.
//!
//! [`build_cache`] picks one from configuration. Callers test for
//! [`CacheError::Miss`] explicitly; every other error is a real failure.

mod cache_interface;
pub mod cache_keys;
mod context;
mod error;
mod factory;
mod memory_cache;
mod redis_cache;
mod retry;

pub use cache_interface::{Cache, CacheExt};
pub use context::CacheContext;
pub use error::{CacheError, CacheResult};
pub use factory::{build_cache, build_cache_for, parse_backend};
pub use memory_cache::{MemoryCache, DEFAULT_JANITOR_INTERVAL, DEFAULT_SHARD_COUNT};
pub use redis_cache::{RedisCache, RedisCacheSettings};
pub use retry::RetryPolicy;
