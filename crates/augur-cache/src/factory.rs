//! Backend selection.

use crate::{Cache, CacheError, CacheResult, MemoryCache, RedisCache};
use augur_config::{CacheBackend, CacheConfig};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Parses a backend tag, failing on anything unrecognized.
pub fn parse_backend(tag: &str) -> CacheResult<CacheBackend> {
    tag.parse::<CacheBackend>()
        .map_err(|e| CacheError::UnknownBackend(e.0))
}

/// Builds the cache selected by `config.backend`.
pub async fn build_cache<V>(config: &CacheConfig) -> CacheResult<Arc<dyn Cache<V>>>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    build_cache_for(&config.backend, config).await
}

/// Builds the cache selected by `tag`, using the matching section of `config`.
///
/// There is no fallback: an unknown tag is an error.
pub async fn build_cache_for<V>(tag: &str, config: &CacheConfig) -> CacheResult<Arc<dyn Cache<V>>>
where
    V: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    let backend = parse_backend(tag)?;

    let cache: Arc<dyn Cache<V>> = match backend {
        CacheBackend::Memory => Arc::new(MemoryCache::<V>::from_config(&config.memory)),
        CacheBackend::Redis => Arc::new(RedisCache::<V>::connect(&config.redis).await?),
    };

    info!(backend = %backend, "Cache initialized");
    Ok(cache)
}
