//! Process-local sharded cache with TTL expiry.
//!
//! The keyspace is split into independently locked shards. A key always
//! lands in the shard chosen by a stable FNV-1a hash, so operations on
//! different shards never contend and no operation ever holds two shard
//! locks at once.
//!
//! Expiry is enforced on read; the janitor task only reclaims memory.

use crate::{Cache, CacheContext, CacheError, CacheResult};
use async_trait::async_trait;
use augur_config::MemoryCacheConfig;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Default number of shards.
pub const DEFAULT_SHARD_COUNT: usize = 32;

/// Default janitor sweep interval.
pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct CacheEntry<V> {
    value: V,
    /// `None` never expires.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

type Shard<V> = RwLock<HashMap<String, CacheEntry<V>>>;

struct Shards<V> {
    shards: Box<[Shard<V>]>,
}

impl<V> Shards<V> {
    fn new(count: usize) -> Self {
        let shards = (0..count.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { shards }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn shard(&self, key: &str) -> &Shard<V> {
        let index = fnv1a64(key.as_bytes()) % self.shards.len() as u64;
        &self.shards[index as usize]
    }

    /// Removes every expired entry, one shard lock at a time.
    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        self.shards
            .iter()
            .map(|shard| {
                let mut items = shard.write();
                let before = items.len();
                items.retain(|_, entry| !entry.is_expired(now));
                before - items.len()
            })
            .sum()
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }
}

/// 64-bit FNV-1a.
fn fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    bytes.iter().fold(OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

fn expiry(ttl: Duration) -> Option<Instant> {
    if ttl.is_zero() {
        None
    } else {
        // An overflowing ttl is as good as never expiring.
        Instant::now().checked_add(ttl)
    }
}

/// Janitor lifecycle shared by all clones of one cache.
///
/// The join handle sits behind an async mutex so every concurrent `stop()`
/// returns only after the task has exited.
struct Janitor {
    stopped: AtomicBool,
    shutdown_tx: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Janitor {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}

async fn run_janitor<V>(shards: Weak<Shards<V>>, interval: Duration, mut shutdown_rx: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let Some(shards) = shards.upgrade() else { break };
                let removed = shards.purge_expired();
                if removed > 0 {
                    debug!(removed, "Janitor evicted expired cache entries");
                }
            }
        }
    }

    debug!("Cache janitor exited");
}

/// Sharded in-memory cache.
///
/// Values are stored as-is and cloned out on read. Cloning the cache is
/// cheap and yields a handle to the same storage and janitor.
pub struct MemoryCache<V> {
    shards: Arc<Shards<V>>,
    janitor: Arc<Janitor>,
    janitor_interval: Duration,
}

impl<V> Clone for MemoryCache<V> {
    fn clone(&self) -> Self {
        Self {
            shards: Arc::clone(&self.shards),
            janitor: Arc::clone(&self.janitor),
            janitor_interval: self.janitor_interval,
        }
    }
}

impl<V> std::fmt::Debug for MemoryCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("shards", &self.shards.shards.len())
            .field("janitor_interval", &self.janitor_interval)
            .finish_non_exhaustive()
    }
}

impl<V> Default for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache with the default shard count and sweep interval.
    #[must_use]
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARD_COUNT, DEFAULT_JANITOR_INTERVAL)
    }

    /// Creates a cache with an explicit shard count and janitor interval.
    ///
    /// A shard count of zero is treated as one. A zero interval disables the
    /// janitor. The janitor is only started when called inside a Tokio runtime.
    #[must_use]
    pub fn with_shards(shard_count: usize, janitor_interval: Duration) -> Self {
        let shards = Arc::new(Shards::new(shard_count));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = if janitor_interval.is_zero() {
            None
        } else {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => Some(runtime.spawn(run_janitor(
                    Arc::downgrade(&shards),
                    janitor_interval,
                    shutdown_rx,
                ))),
                Err(_) => {
                    warn!("No Tokio runtime available; memory cache janitor not started");
                    None
                }
            }
        };

        info!(
            shards = shards.shards.len(),
            janitor_interval_ms = janitor_interval.as_millis(),
            janitor = handle.is_some(),
            "Memory cache created"
        );

        Self {
            shards,
            janitor: Arc::new(Janitor {
                stopped: AtomicBool::new(false),
                shutdown_tx,
                handle: Mutex::new(handle),
            }),
            janitor_interval,
        }
    }

    /// Creates a cache from configuration.
    #[must_use]
    pub fn from_config(config: &MemoryCacheConfig) -> Self {
        Self::with_shards(config.shard_count, config.janitor_interval())
    }
}

impl<V> MemoryCache<V> {
    /// Stops the janitor and waits for it to exit.
    ///
    /// Safe to call from several clones at once; every caller returns only
    /// after the task has exited.
    pub async fn stop(&self) {
        let mut handle = self.janitor.handle.lock().await;
        if let Some(task) = handle.take() {
            let _ = self.janitor.shutdown_tx.send(());
            if let Err(e) = task.await {
                warn!(error = %e, "Cache janitor terminated abnormally");
            }
        }
        drop(handle);

        if !self.janitor.stopped.swap(true, Ordering::SeqCst) {
            info!("Memory cache janitor stopped");
        }
    }

    /// Returns true while the janitor task is alive.
    #[must_use]
    pub fn is_janitor_running(&self) -> bool {
        self.janitor
            .handle
            .try_lock()
            .map_or(true, |handle| handle.as_ref().is_some_and(|task| !task.is_finished()))
    }

    /// Runs one sweep now and returns how many entries were removed.
    pub fn purge_expired(&self) -> usize {
        self.shards.purge_expired()
    }

    /// Number of physically stored entries, including expired ones not yet swept.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shards.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.shards.len()
    }

    #[must_use]
    pub const fn janitor_interval(&self) -> Duration {
        self.janitor_interval
    }
}

impl<V: Clone> MemoryCache<V> {
    fn get_entry(&self, key: &str) -> CacheResult<V> {
        let items = self.shards.shard(key).read();
        match items.get(key) {
            Some(entry) if !entry.is_expired(Instant::now()) => Ok(entry.value.clone()),
            _ => Err(CacheError::Miss),
        }
    }

    fn set_entry(&self, key: &str, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: expiry(ttl),
        };
        self.shards.shard(key).write().insert(key.to_string(), entry);
    }
}

#[async_trait]
impl<V> Cache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, _ctx: &CacheContext, key: &str) -> CacheResult<V> {
        let result = self.get_entry(key);
        match &result {
            Ok(_) => debug!(key, "Cache hit"),
            Err(_) => debug!(key, "Cache miss"),
        }
        result
    }

    async fn set(&self, _ctx: &CacheContext, key: &str, value: V, ttl: Duration) -> CacheResult<()> {
        self.set_entry(key, value, ttl);
        debug!(key, ttl_ms = ttl.as_millis(), "Cached key");
        Ok(())
    }

    async fn delete(&self, _ctx: &CacheContext, key: &str) -> CacheResult<()> {
        let removed = self.shards.shard(key).write().remove(key).is_some();
        debug!(key, removed, "Deleted key");
        Ok(())
    }

    async fn mget(&self, _ctx: &CacheContext, keys: &[&str]) -> Vec<CacheResult<V>> {
        keys.iter().map(|key| self.get_entry(key)).collect()
    }

    async fn mset(&self, _ctx: &CacheContext, entries: HashMap<String, V>, ttl: Duration) -> CacheResult<()> {
        let count = entries.len();
        for (key, value) in entries {
            self.set_entry(&key, value, ttl);
        }
        debug!(count, ttl_ms = ttl.as_millis(), "Cached batch");
        Ok(())
    }

    async fn close(&self) -> CacheResult<()> {
        self.stop().await;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
