//! Redis-backed cache store shared across processes.

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::Client as RedisClient;
use tracing::{debug, warn};

use super::CacheStore;

/// Cache store persisting bodies in Redis with `SET … EX ttl`.
///
/// Redis owns expiry, so an expired key reads back as a miss. Connection
/// and command failures degrade to a miss on read and `false` on write.
#[derive(Clone)]
pub struct RedisCacheStore {
    client: RedisClient,
    ttl_secs: u64,
}

impl RedisCacheStore {
    pub fn new(client: RedisClient, ttl_secs: u64) -> Self {
        Self {
            client,
            // Redis rejects EX 0.
            ttl_secs: ttl_secs.max(1),
        }
    }

    /// Open a client for `url`. Does not connect until first use.
    pub fn open(url: &str, ttl_secs: u64) -> redis::RedisResult<Self> {
        Ok(Self::new(RedisClient::open(url)?, ttl_secs))
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Option<String> {
        let mut conn = match self.client.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "failed to get Redis connection for cache");
                return None;
            }
        };

        match conn.get::<_, Option<String>>(key).await {
            Ok(val) => {
                debug!(key = %key, hit = val.is_some(), "redis cache lookup");
                val
            }
            Err(e) => {
                warn!(error = %e, key = %key, "failed to read cache value from Redis");
                None
            }
        }
    }

    async fn set(&self, key: &str, body: &str) -> bool {
        let Ok(mut conn) = self.client.get_multiplexed_async_connection().await else {
            warn!("failed to get Redis connection for cache set");
            return false;
        };

        if let Err(e) = conn.set_ex::<_, _, ()>(key, body, self.ttl_secs).await {
            warn!(error = %e, key = %key, "failed to set cache value in Redis");
            return false;
        }

        debug!(key = %key, ttl = self.ttl_secs, "redis cache set");
        true
    }
}

impl std::fmt::Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheStore")
            .field("ttl_secs", &self.ttl_secs)
            .finish()
    }
}
