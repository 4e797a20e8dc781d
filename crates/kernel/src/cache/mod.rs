//! TTL cache for raw API response bodies.
//!
//! Two stores implement [`CacheStore`]:
//! - [`TransientCache`]: in-process, explicit expiry bookkeeping per entry
//! - [`RedisCacheStore`]: shared across processes, expiry handled by Redis

mod redis_store;

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

pub use self::redis_store::RedisCacheStore;

/// Default time-to-live for cached bodies (one hour).
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Time-bounded key → body store.
///
/// `get` cannot distinguish "never cached" from "expired"; both are `None`.
/// `set` reports failure as `false` and never errors.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a body if present and not yet expired.
    async fn get(&self, key: &str) -> Option<String>;

    /// Write (or overwrite) a body, stamping it with the store's TTL.
    async fn set(&self, key: &str, body: &str) -> bool;
}

/// Source of the current time in epoch seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// A cached body and the instant it stops being readable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub body: String,
    /// Epoch seconds; the entry is readable only while `now < expires_at`.
    pub expires_at: i64,
}

impl CacheEntry {
    pub fn is_live(&self, now: i64) -> bool {
        now < self.expires_at
    }
}

/// In-process cache shared by every request in this process.
///
/// Expired entries are not evicted on read; they stay in the map until
/// [`TransientCache::purge_expired`] runs or the key is overwritten.
#[derive(Clone)]
pub struct TransientCache {
    inner: Arc<TransientCacheInner>,
}

struct TransientCacheInner {
    entries: DashMap<String, CacheEntry>,
    ttl_secs: u64,
    clock: Arc<dyn Clock>,
}

impl TransientCache {
    /// Create a cache using the wall clock.
    pub fn new(ttl_secs: u64) -> Self {
        Self::with_clock(ttl_secs, Arc::new(SystemClock))
    }

    /// Create a cache driven by a caller-supplied clock.
    pub fn with_clock(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(TransientCacheInner {
                entries: DashMap::new(),
                ttl_secs,
                clock,
            }),
        }
    }

    /// Raw entry lookup, ignoring expiry.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.inner.entries.get(key).map(|e| e.value().clone())
    }

    /// Number of stored rows, live or expired.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Drop every expired row. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let before = self.inner.entries.len();
        self.inner.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.inner.entries.len());
        debug!(removed, "purged expired cache entries");
        removed
    }

    fn ttl(&self) -> i64 {
        i64::try_from(self.inner.ttl_secs).unwrap_or(i64::MAX)
    }
}

#[async_trait]
impl CacheStore for TransientCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = self.inner.clock.now();
        let entry = self.inner.entries.get(key)?;
        if entry.is_live(now) {
            debug!(key = %key, "cache hit");
            Some(entry.body.clone())
        } else {
            debug!(key = %key, expires_at = entry.expires_at, "cache entry expired");
            None
        }
    }

    async fn set(&self, key: &str, body: &str) -> bool {
        let expires_at = self.inner.clock.now().saturating_add(self.ttl());
        self.inner.entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                body: body.to_string(),
                expires_at,
            },
        );
        debug!(key = %key, expires_at, "cache set");
        true
    }
}

impl std::fmt::Debug for TransientCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransientCache")
            .field("entries", &self.inner.entries.len())
            .field("ttl_secs", &self.inner.ttl_secs)
            .finish()
    }
}

/// Key namespaces; each remote resource kind is cached separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheNamespace {
    Blocks,
    Pages,
    Databases,
    Embed,
}

impl CacheNamespace {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::Pages => "pages",
            Self::Databases => "databases",
            Self::Embed => "embed",
        }
    }

    /// Build the cache key for a resource in this namespace.
    pub fn key(self, id: &str) -> String {
        format!("notion:{}:{id}", self.as_str())
    }
}
