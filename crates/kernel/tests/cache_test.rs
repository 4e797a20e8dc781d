#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Cache store tests.

use std::sync::Arc;

use notion_press::cache::{
    CacheNamespace, CacheStore, DEFAULT_TTL_SECS, ManualClock, RedisCacheStore, TransientCache,
};

#[tokio::test]
async fn transient_cache_expires_by_time_only() {
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let cache = TransientCache::with_clock(DEFAULT_TTL_SECS, clock.clone());
    let key = CacheNamespace::Blocks.key("root");

    assert!(cache.set(&key, "{\"results\":[]}").await);
    for _ in 0..100 {
        assert!(cache.get(&key).await.is_some());
    }

    clock.advance(i64::try_from(DEFAULT_TTL_SECS).unwrap());
    assert!(cache.get(&key).await.is_none());

    // Still physically present until purged.
    let entry = cache.entry(&key).unwrap();
    assert_eq!(entry.key, key);
    assert_eq!(cache.purge_expired(), 1);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn clones_share_entries() {
    let cache = TransientCache::new(60);
    let shared: Arc<dyn CacheStore> = Arc::new(cache.clone());

    shared.set("k", "v").await;
    assert_eq!(cache.get("k").await.as_deref(), Some("v"));
}

#[tokio::test]
async fn namespaces_do_not_collide() {
    let cache = TransientCache::new(60);
    cache.set(&CacheNamespace::Pages.key("x"), "page").await;
    cache.set(&CacheNamespace::Embed.key("x"), "embed").await;

    assert_eq!(
        cache.get(&CacheNamespace::Pages.key("x")).await.as_deref(),
        Some("page")
    );
    assert!(cache.get(&CacheNamespace::Blocks.key("x")).await.is_none());
}

#[tokio::test]
async fn unreachable_redis_degrades_to_miss() {
    // Nothing listens on port 1.
    let store = RedisCacheStore::open("redis://127.0.0.1:1", 60).unwrap();
    assert!(store.get("k").await.is_none());
    assert!(!store.set("k", "v").await);
}
