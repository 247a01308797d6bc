//! End-to-end behaviour of the in-process cache through the `Cache` trait.

use augur_cache::{build_cache, Cache, CacheContext, CacheError, CacheExt, MemoryCache};
use augur_config::CacheConfig;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn ctx() -> CacheContext {
    CacheContext::background()
}

#[tokio::test]
async fn test_set_then_get_permissions() {
    let cache = build_cache::<Vec<String>>(&CacheConfig::memory()).await.unwrap();
    let perms = vec!["read".to_string(), "write".to_string()];

    cache
        .set(&ctx(), "user:1:perms", perms.clone(), Duration::from_secs(30 * 60))
        .await
        .unwrap();

    assert_eq!(cache.get(&ctx(), "user:1:perms").await.unwrap(), perms);
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_fresh_cache_misses() {
    let cache = build_cache::<String>(&CacheConfig::memory()).await.unwrap();

    let err = cache.get(&ctx(), "missing-key").await.unwrap_err();
    assert!(err.is_miss());
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_mset_then_mget_with_gap() {
    let cache = build_cache::<String>(&CacheConfig::memory()).await.unwrap();

    let entries = HashMap::from([
        ("a".to_string(), "1".to_string()),
        ("b".to_string(), "2".to_string()),
    ]);
    cache.mset(&ctx(), entries, Duration::ZERO).await.unwrap();

    let results = cache.mget(&ctx(), &["a", "b", "c"]).await;
    assert_eq!(
        results,
        vec![Ok("1".to_string()), Ok("2".to_string()), Err(CacheError::Miss)]
    );
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_short_ttl_expires() {
    let cache: MemoryCache<String> = MemoryCache::new();

    cache
        .set(&ctx(), "temp", "x".to_string(), Duration::from_millis(50))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(cache.get(&ctx(), "temp").await, Err(CacheError::Miss));
    cache.stop().await;
}

#[tokio::test]
async fn test_janitor_reclaims_expired_entries() {
    let cache: MemoryCache<u64> = MemoryCache::with_shards(8, Duration::from_millis(25));

    for i in 0..100u64 {
        cache
            .set(&ctx(), &format!("k{}", i), i, Duration::from_millis(10))
            .await
            .unwrap();
    }
    assert_eq!(cache.len(), 100);

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(cache.is_empty());
    cache.stop().await;
    assert!(!cache.is_janitor_running());
}

#[tokio::test]
async fn test_close_twice_is_harmless() {
    let cache = build_cache::<u8>(&CacheConfig::memory()).await.unwrap();
    cache.close().await.unwrap();
    cache.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_access() {
    let cache: Arc<MemoryCache<usize>> = Arc::new(MemoryCache::with_shards(16, Duration::from_millis(5)));
    let mut handles = Vec::new();

    for worker in 0..8usize {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            let ctx = CacheContext::background();
            for i in 0..500usize {
                let key = format!("key:{}", i % 64);
                let ttl = if i % 3 == 0 {
                    Duration::from_millis(1)
                } else {
                    Duration::ZERO
                };
                cache.set(&ctx, &key, worker * 1000 + i, ttl).await.unwrap();
                match cache.get(&ctx, &key).await {
                    Ok(_) | Err(CacheError::Miss) => {}
                    Err(e) => panic!("unexpected error: {}", e),
                }
                if i % 10 == 0 {
                    cache.delete(&ctx, &key).await.unwrap();
                }
                let keys = [key.as_str(), "key:0", "key:1"];
                assert_eq!(cache.mget(&ctx, &keys).await.len(), 3);
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert!(cache.len() <= 64);
    cache.stop().await;
}

#[tokio::test]
async fn test_get_or_set_computes_once() {
    let cache = build_cache::<Vec<String>>(&CacheConfig::memory()).await.unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let calls = Arc::clone(&calls);
        let roles = cache
            .get_or_set(&ctx(), "user:9:roles", Duration::ZERO, || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(vec!["admin".to_string()])
            })
            .await
            .unwrap();
        assert_eq!(roles, vec!["admin".to_string()]);
    }

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    cache.close().await.unwrap();
}

#[tokio::test]
async fn test_get_or_set_does_not_cache_failures() {
    let cache: MemoryCache<u32> = MemoryCache::with_shards(2, Duration::ZERO);

    let result = cache
        .get_or_set(&ctx(), "flaky", Duration::ZERO, || async {
            Err::<u32, _>(CacheError::Backend("upstream down".to_string()))
        })
        .await;
    assert!(result.is_err());
    assert_eq!(cache.get(&ctx(), "flaky").await, Err(CacheError::Miss));
}
