//! The cache contract shared by every backend.

use crate::{CacheContext, CacheError, CacheResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

/// Cache contract for storing and retrieving values of type `V`.
///
/// Implementations are shared across tasks behind an `Arc` for the
/// lifetime of the process. A `ttl` of zero means the entry never expires.
#[async_trait]
pub trait Cache<V>: Send + Sync
where
    V: Send + Sync + 'static,
{
    /// Returns the value if present and unexpired, otherwise
    /// [`CacheError::Miss`].
    async fn get(&self, ctx: &CacheContext, key: &str) -> CacheResult<V>;

    /// Stores `value`, overwriting any existing entry.
    async fn set(&self, ctx: &CacheContext, key: &str, value: V, ttl: Duration) -> CacheResult<()>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, ctx: &CacheContext, key: &str) -> CacheResult<()>;

    /// Batch read.
    ///
    /// The result has one slot per input key, in input order; a miss or
    /// failure on one key never affects the others.
    async fn mget(&self, ctx: &CacheContext, keys: &[&str]) -> Vec<CacheResult<V>>;

    /// Batch write with the same TTL for every pair.
    async fn mset(&self, ctx: &CacheContext, entries: HashMap<String, V>, ttl: Duration) -> CacheResult<()>;

    /// Releases background tasks or pooled connections. Safe to call twice.
    async fn close(&self) -> CacheResult<()>;

    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;
}

/// Memoization helpers layered over [`Cache`].
#[async_trait]
pub trait CacheExt<V>: Cache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Returns the cached value, or computes, stores and returns it on a miss.
    ///
    /// Only a miss triggers `compute`; any other cache error is returned
    /// as-is, as is a failure to store the computed value.
    async fn get_or_set<F, Fut, E>(
        &self,
        ctx: &CacheContext,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, E>> + Send,
        E: From<CacheError> + Send,
    {
        match self.get(ctx, key).await {
            Ok(value) => return Ok(value),
            Err(CacheError::Miss) => {}
            Err(e) => return Err(e.into()),
        }

        let value = compute().await?;
        self.set(ctx, key, value.clone(), ttl).await?;
        Ok(value)
    }
}

impl<V, C> CacheExt<V> for C
where
    V: Clone + Send + Sync + 'static,
    C: Cache<V> + ?Sized,
{
}
