//! Redis-backed cache implementation.
//!
//! Values are JSON-encoded with `serde_json`. Every call is bounded by the
//! earlier of the caller's deadline and the configured operation timeout.
//! Acquiring a pooled connection is retried with backoff; commands
//! themselves are sent once.

use crate::{Cache, CacheContext, CacheError, CacheResult, RetryPolicy};
use async_trait::async_trait;
use augur_config::RedisCacheConfig;
use deadpool_redis::redis::{self, RedisError};
use deadpool_redis::{Config, Connection, Pool, PoolError, Runtime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Runtime settings of a [`RedisCache`], independent of how the pool was built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisCacheSettings {
    /// Upper bound for a single operation.
    pub operation_timeout: Duration,
    /// Backoff for acquiring a connection.
    pub retry: RetryPolicy,
    /// Namespace prepended to every key as `{prefix}:{key}`.
    pub key_prefix: Option<String>,
}

impl Default for RedisCacheSettings {
    fn default() -> Self {
        Self {
            operation_timeout: RedisCacheConfig::DEFAULT_OPERATION_TIMEOUT,
            retry: RetryPolicy::default(),
            key_prefix: None,
        }
    }
}

impl RedisCacheSettings {
    #[must_use]
    pub fn from_config(config: &RedisCacheConfig) -> Self {
        Self {
            operation_timeout: config.operation_timeout(),
            retry: RetryPolicy::from_config(config),
            key_prefix: config.key_prefix.clone().filter(|p| !p.is_empty()),
        }
    }
}

/// Redis-based cache for values of type `V`.
pub struct RedisCache<V> {
    pool: Pool,
    settings: RedisCacheSettings,
    _marker: PhantomData<fn() -> V>,
}

impl<V> std::fmt::Debug for RedisCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("pool", &self.pool.status())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Builds `redis://[user][:password@]host:port/db` from the settings.
pub(crate) fn connection_url(config: &RedisCacheConfig) -> CacheResult<String> {
    let mut url = Url::parse(&format!("redis://{}", config.address)).map_err(|e| {
        CacheError::Configuration(format!("Invalid Redis address '{}': {}", config.address, e))
    })?;

    if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
        url.set_username(username)
            .map_err(|()| CacheError::Configuration("Redis username cannot be set".to_string()))?;
    }
    if let Some(password) = config.password.as_deref().filter(|p| !p.is_empty()) {
        url.set_password(Some(password))
            .map_err(|()| CacheError::Configuration("Redis password cannot be set".to_string()))?;
    }
    url.set_path(&format!("/{}", config.db));

    Ok(url.into())
}

fn pool_error(err: PoolError) -> CacheError {
    match err {
        PoolError::Closed => CacheError::Connectivity("connection pool is closed".to_string()),
        PoolError::Timeout(kind) => {
            CacheError::Timeout(format!("timed out acquiring connection ({:?})", kind))
        }
        PoolError::Backend(e) => CacheError::Connectivity(format!("Failed to get Redis connection: {}", e)),
        other => CacheError::Connectivity(format!("Failed to get Redis connection: {}", other)),
    }
}

fn command_error(op: &str, err: &RedisError) -> CacheError {
    if err.is_timeout() {
        CacheError::Timeout(format!("Redis {} timed out: {}", op, err))
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        CacheError::Connectivity(format!("Redis {} failed: {}", op, err))
    } else {
        CacheError::Backend(format!("Redis {} failed: {}", op, err))
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

impl<V> RedisCache<V> {
    /// Connects to Redis, verifies the server with `PING`, and opens
    /// `min_idle_conns` connections up front.
    pub async fn connect(config: &RedisCacheConfig) -> CacheResult<Self> {
        let url = connection_url(config)?;
        let timeout = config.operation_timeout();

        info!(address = %config.address, db = config.db, pool_size = config.pool_size, "Creating Redis cache pool");

        let pool = Config::from_url(url)
            .builder()
            .map_err(|e| CacheError::Configuration(format!("Invalid Redis config: {}", e)))?
            .max_size(config.pool_size.max(1))
            .runtime(Runtime::Tokio1)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .build()
            .map_err(|e| CacheError::Configuration(format!("Failed to create pool: {}", e)))?;

        let cache = Self::from_pool(pool, RedisCacheSettings::from_config(config));
        cache.ping(&CacheContext::background()).await?;
        cache.warm_up(config.min_idle_conns.min(config.pool_size.max(1))).await?;

        info!(address = %config.address, "Redis cache connected");
        Ok(cache)
    }

    /// Wraps an existing pool without touching the network.
    #[must_use]
    pub fn from_pool(pool: Pool, settings: RedisCacheSettings) -> Self {
        Self {
            pool,
            settings,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn settings(&self) -> &RedisCacheSettings {
        &self.settings
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    /// Checks the server answers `PONG`.
    pub async fn ping(&self, ctx: &CacheContext) -> CacheResult<()> {
        self.bounded(ctx, "PING", async {
            let mut conn = self.conn().await?;
            let pong: String = redis::cmd("PING")
                .query_async(&mut *conn)
                .await
                .map_err(|e| command_error("PING", &e))?;
            if pong == "PONG" {
                Ok(())
            } else {
                Err(CacheError::Backend(format!("unexpected PING reply '{}'", pong)))
            }
        })
        .await
    }

    async fn warm_up(&self, min_idle: usize) -> CacheResult<()> {
        if min_idle == 0 {
            return Ok(());
        }
        self.bounded(&CacheContext::background(), "warm-up", async {
            let conns = futures::future::try_join_all((0..min_idle).map(|_| self.pool.get()))
                .await
                .map_err(pool_error)?;
            debug!(count = conns.len(), "Pre-opened idle Redis connections");
            Ok(())
        })
        .await
    }

    fn wire_key<'a>(&self, key: &'a str) -> Cow<'a, str> {
        match &self.settings.key_prefix {
            Some(prefix) => Cow::Owned(format!("{}:{}", prefix, key)),
            None => Cow::Borrowed(key),
        }
    }

    /// Gets a pooled connection, retrying transient failures.
    async fn conn(&self) -> CacheResult<Connection> {
        let mut attempt = 0;
        loop {
            match self.pool.get().await {
                Ok(conn) => return Ok(conn),
                Err(PoolError::Closed) => return Err(pool_error(PoolError::Closed)),
                Err(e) if attempt < self.settings.retry.max_retries => {
                    attempt += 1;
                    let delay = self.settings.retry.backoff(attempt);
                    warn!(attempt, delay_ms = delay.as_millis(), error = %e, "Retrying Redis connection");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(pool_error(e)),
            }
        }
    }

    /// Runs `fut` under the effective deadline for this call.
    async fn bounded<T, F>(&self, ctx: &CacheContext, op: &str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        if ctx.is_expired() {
            return Err(CacheError::Timeout(format!("Redis {} not started: deadline already passed", op)));
        }
        let deadline = ctx.effective_deadline(self.settings.operation_timeout);
        match tokio::time::timeout_at(deadline, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(format!("Redis {} exceeded its deadline", op))),
        }
    }
}

impl<V: Serialize> RedisCache<V> {
    fn encode(key: &str, value: &V) -> CacheResult<Vec<u8>> {
        serde_json::to_vec(value)
            .map_err(|e| CacheError::Serialization(format!("Failed to encode value for key '{}': {}", key, e)))
    }
}

impl<V: DeserializeOwned> RedisCache<V> {
    fn decode(key: &str, raw: Option<Vec<u8>>) -> CacheResult<V> {
        let bytes = raw.ok_or(CacheError::Miss)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::Serialization(format!("Failed to decode value for key '{}': {}", key, e)))
    }
}

#[async_trait]
impl<V> Cache<V> for RedisCache<V>
where
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn get(&self, ctx: &CacheContext, key: &str) -> CacheResult<V> {
        let raw = self
            .bounded(ctx, "GET", async {
                let mut conn = self.conn().await?;
                redis::cmd("GET")
                    .arg(self.wire_key(key).as_ref())
                    .query_async::<Option<Vec<u8>>>(&mut *conn)
                    .await
                    .map_err(|e| command_error("GET", &e))
            })
            .await?;

        match &raw {
            Some(_) => debug!(key, "Cache hit"),
            None => debug!(key, "Cache miss"),
        }

        Self::decode(key, raw)
    }

    async fn set(&self, ctx: &CacheContext, key: &str, value: V, ttl: Duration) -> CacheResult<()> {
        let payload = Self::encode(key, &value)?;

        self.bounded(ctx, "SET", async {
            let mut conn = self.conn().await?;
            let mut cmd = redis::cmd("SET");
            cmd.arg(self.wire_key(key).as_ref()).arg(payload);
            if !ttl.is_zero() {
                cmd.arg("PX").arg(ttl_millis(ttl));
            }
            cmd.query_async::<()>(&mut *conn)
                .await
                .map_err(|e| command_error("SET", &e))
        })
        .await?;

        debug!(key, ttl_ms = ttl.as_millis(), "Cached key");
        Ok(())
    }

    async fn delete(&self, ctx: &CacheContext, key: &str) -> CacheResult<()> {
        let deleted: i64 = self
            .bounded(ctx, "DEL", async {
                let mut conn = self.conn().await?;
                redis::cmd("DEL")
                    .arg(self.wire_key(key).as_ref())
                    .query_async(&mut *conn)
                    .await
                    .map_err(|e| command_error("DEL", &e))
            })
            .await?;

        debug!(key, removed = deleted > 0, "Deleted key");
        Ok(())
    }

    async fn mget(&self, ctx: &CacheContext, keys: &[&str]) -> Vec<CacheResult<V>> {
        if keys.is_empty() {
            return Vec::new();
        }

        let fetched = self
            .bounded(ctx, "MGET", async {
                let mut conn = self.conn().await?;
                let mut cmd = redis::cmd("MGET");
                for key in keys {
                    cmd.arg(self.wire_key(key).as_ref());
                }
                cmd.query_async::<Vec<Option<Vec<u8>>>>(&mut *conn)
                    .await
                    .map_err(|e| command_error("MGET", &e))
            })
            .await;

        match fetched {
            Ok(values) if values.len() == keys.len() => keys
                .iter()
                .zip(values)
                .map(|(key, raw)| Self::decode(key, raw))
                .collect(),
            Ok(values) => {
                let err = CacheError::Backend(format!(
                    "MGET returned {} values for {} keys",
                    values.len(),
                    keys.len()
                ));
                keys.iter().map(|_| Err(err.clone())).collect()
            }
            Err(err) => {
                warn!(error = %err, count = keys.len(), "Redis MGET failed");
                keys.iter().map(|_| Err(err.clone())).collect()
            }
        }
    }

    async fn mset(&self, ctx: &CacheContext, entries: HashMap<String, V>, ttl: Duration) -> CacheResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        // Encode everything first so a bad value aborts before any write.
        let encoded = entries
            .iter()
            .map(|(key, value)| -> CacheResult<(String, Vec<u8>)> {
                Ok((self.wire_key(key).into_owned(), Self::encode(key, value)?))
            })
            .collect::<CacheResult<Vec<_>>>()?;
        let count = encoded.len();

        self.bounded(ctx, "MSET", async {
            let mut conn = self.conn().await?;
            if ttl.is_zero() {
                let mut cmd = redis::cmd("MSET");
                for (key, payload) in &encoded {
                    cmd.arg(key).arg(payload);
                }
                cmd.query_async::<()>(&mut *conn)
                    .await
                    .map_err(|e| command_error("MSET", &e))
            } else {
                let px = ttl_millis(ttl);
                let mut pipe = redis::pipe();
                for (key, payload) in &encoded {
                    pipe.cmd("SET").arg(key).arg(payload).arg("PX").arg(px).ignore();
                }
                pipe.query_async::<()>(&mut *conn)
                    .await
                    .map_err(|e| command_error("MSET", &e))
            }
        })
        .await?;

        debug!(count, ttl_ms = ttl.as_millis(), "Cached batch");
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        if !self.pool.is_closed() {
            self.pool.close();
            info!("Redis cache pool closed");
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A pool that points at a closed port; nothing here ever connects.
    fn offline_cache<V>() -> RedisCache<V> {
        let pool = Config::from_url("redis://127.0.0.1:1/0")
            .builder()
            .unwrap()
            .max_size(1)
            .runtime(Runtime::Tokio1)
            .build()
            .unwrap();
        RedisCache::from_pool(
            pool,
            RedisCacheSettings {
                operation_timeout: Duration::from_millis(500),
                retry: RetryPolicy::none(),
                key_prefix: None,
            },
        )
    }

    #[test]
    fn test_connection_url() {
        let config = RedisCacheConfig {
            address: "cache.internal:6380".to_string(),
            password: Some("s3cr:t@".to_string()),
            db: 4,
            ..RedisCacheConfig::default()
        };
        let url = connection_url(&config).unwrap();
        assert!(url.starts_with("redis://:"));
        assert!(url.ends_with("@cache.internal:6380/4"));
        assert!(!url.contains("s3cr:t@@"));

        let plain = connection_url(&RedisCacheConfig::default()).unwrap();
        assert_eq!(plain, "redis://localhost:6379/0");
    }

    #[test]
    fn test_connection_url_with_username() {
        let config = RedisCacheConfig {
            username: Some("augur".to_string()),
            password: Some("pw".to_string()),
            ..RedisCacheConfig::default()
        };
        assert_eq!(connection_url(&config).unwrap(), "redis://augur:pw@localhost:6379/0");
    }

    #[test]
    fn test_ttl_millis_rounds_up() {
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2000);
    }

    #[test]
    fn test_settings_from_config() {
        let config = RedisCacheConfig {
            operation_timeout_ms: 0,
            key_prefix: Some(String::new()),
            ..RedisCacheConfig::default()
        };
        let settings = RedisCacheSettings::from_config(&config);
        assert_eq!(settings.operation_timeout, RedisCacheConfig::DEFAULT_OPERATION_TIMEOUT);
        assert_eq!(settings.key_prefix, None);
    }

    #[tokio::test]
    async fn test_wire_key_prefix() {
        let mut cache: RedisCache<u8> = offline_cache();
        assert_eq!(cache.wire_key("a"), "a");
        cache.settings.key_prefix = Some("augur".to_string());
        assert_eq!(cache.wire_key("a"), "augur:a");
    }

    #[tokio::test]
    async fn test_unserializable_value_is_rejected_before_io() {
        // JSON object keys must be strings.
        let cache: RedisCache<HashMap<(u8, u8), u8>> = offline_cache();
        let value = HashMap::from([((1, 2), 3)]);

        let err = cache
            .set(&CacheContext::background(), "bad", value, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_mset_serialization_failure_aborts() {
        let cache: RedisCache<HashMap<(u8, u8), u8>> = offline_cache();
        let entries = HashMap::from([("bad".to_string(), HashMap::from([((1, 1), 1)]))]);

        let err = cache
            .mset(&CacheContext::background(), entries, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }

    #[test]
    fn test_decode_distinguishes_miss_and_garbage() {
        assert_eq!(RedisCache::<Vec<String>>::decode("k", None), Err(CacheError::Miss));
        assert!(matches!(
            RedisCache::<Vec<String>>::decode("k", Some(b"not json".to_vec())),
            Err(CacheError::Serialization(_))
        ));
        assert_eq!(
            RedisCache::<Vec<String>>::decode("k", Some(br#"["read"]"#.to_vec())),
            Ok(vec!["read".to_string()])
        );
    }

    #[tokio::test]
    async fn test_closed_cache_fails_every_operation() {
        let cache: RedisCache<String> = offline_cache();
        cache.close().await.unwrap();
        cache.close().await.unwrap();
        assert!(cache.is_closed());

        let ctx = CacheContext::background();
        assert!(matches!(cache.get(&ctx, "a").await, Err(CacheError::Connectivity(_))));
        assert!(matches!(
            cache.set(&ctx, "a", "v".to_string(), Duration::ZERO).await,
            Err(CacheError::Connectivity(_))
        ));
        assert!(matches!(cache.delete(&ctx, "a").await, Err(CacheError::Connectivity(_))));

        let results = cache.mget(&ctx, &["a", "b", "c"]).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| matches!(r, Err(CacheError::Connectivity(_)))));
    }

    #[tokio::test]
    async fn test_expired_context_times_out() {
        let cache: RedisCache<String> = offline_cache();
        let ctx = CacheContext::with_deadline(tokio::time::Instant::now());

        let err = cache.get(&ctx, "a").await.unwrap_err();
        assert!(matches!(err, CacheError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_stalled_server_times_out() {
        // Accepts connections and never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let pool = Config::from_url(format!("redis://{}/0", addr))
            .builder()
            .unwrap()
            .max_size(1)
            .runtime(Runtime::Tokio1)
            .build()
            .unwrap();
        let cache: RedisCache<String> = RedisCache::from_pool(
            pool,
            RedisCacheSettings {
                operation_timeout: Duration::from_millis(200),
                retry: RetryPolicy::none(),
                key_prefix: None,
            },
        );

        let started = tokio::time::Instant::now();
        let err = cache
            .get(&CacheContext::background(), "a")
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert!(matches!(err, CacheError::Timeout(_)), "got {:?}", err);
        assert!(elapsed >= Duration::from_millis(150), "gave up after {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(2), "took {:?}", elapsed);
        server.abort();
    }

    #[tokio::test]
    async fn test_unreachable_server_is_not_a_miss() {
        let cache: RedisCache<String> = offline_cache();
        let err = cache.get(&CacheContext::background(), "a").await.unwrap_err();
        assert!(!err.is_miss());
        assert!(err.is_retriable(), "got {:?}", err);
    }

    #[tokio::test]
    async fn test_mget_empty_skips_round_trip() {
        let cache: RedisCache<String> = offline_cache();
        cache.close().await.unwrap();
        assert!(cache.mget(&CacheContext::background(), &[]).await.is_empty());
    }
}
