//! Common test infrastructure for Redis integration tests.

use augur_cache::RedisCache;
use augur_config::RedisCacheConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::redis::{Redis, REDIS_PORT};

/// Test Redis container wrapper.
///
/// Keeps the container alive for as long as the wrapper lives.
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    address: String,
}

impl TestRedis {
    /// Starts a fresh Redis container.
    pub async fn new() -> Self {
        let container = Redis::default()
            .start()
            .await
            .expect("Failed to start Redis container");

        let port = container
            .get_host_port_ipv4(REDIS_PORT)
            .await
            .expect("Failed to get Redis port");

        Self {
            _container: container,
            address: format!("127.0.0.1:{}", port),
        }
    }

    /// Redis settings pointing at the container.
    pub fn config(&self) -> RedisCacheConfig {
        RedisCacheConfig {
            address: self.address.clone(),
            pool_size: 4,
            min_idle_conns: 1,
            ..RedisCacheConfig::default()
        }
    }

    /// Connects a typed cache to the container.
    pub async fn cache<V>(&self) -> RedisCache<V>
    where
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        RedisCache::connect(&self.config())
            .await
            .expect("Failed to connect to Redis")
    }
}
