//! Application state shared by all commands.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::cache::{CacheStore, RedisCacheStore, TransientCache};
use crate::config::Config;
use crate::content::MarkupCompiler;
use crate::embed::{DisabledEmbeds, EmbedResolver, OEmbedClient};
use crate::notion::{BlockSource, NotionClient, TreeResolver};

/// Shared application state.
///
/// Wrapped in Arc internally so Clone is cheap.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Response cache shared by the Notion and oEmbed clients.
    cache: Arc<dyn CacheStore>,

    /// Notion REST client.
    notion: NotionClient,

    /// oEmbed lookup, or a resolver that always declines.
    embeds: Arc<dyn EmbedResolver>,

    /// Block markup compiler.
    compiler: MarkupCompiler,

    /// Database listed when none is named.
    default_database_id: Option<String>,
}

impl AppState {
    /// Build every service from configuration. No network traffic happens
    /// here; Redis and Notion are first contacted on use.
    pub fn new(config: &Config) -> Result<Self> {
        let cache: Arc<dyn CacheStore> = match &config.redis_url {
            Some(url) => {
                info!("caching responses in Redis");
                Arc::new(
                    RedisCacheStore::open(url, config.cache_ttl_secs)
                        .context("failed to create Redis client")?,
                )
            }
            None => {
                info!("caching responses in memory");
                Arc::new(TransientCache::new(config.cache_ttl_secs))
            }
        };

        let notion = NotionClient::new(&config.notion(), Arc::clone(&cache))
            .context("failed to create Notion client")?;

        let embeds: Arc<dyn EmbedResolver> = match &config.oembed_base_url {
            Some(base) => {
                let client = OEmbedClient::new(base, config.http_timeout(), Arc::clone(&cache))
                    .context("failed to create oEmbed client")?;
                info!(endpoint = %client.endpoint(), "oEmbed lookups enabled");
                Arc::new(client)
            }
            None => {
                info!("OEMBED_BASE_URL not set; video and bookmark blocks will be omitted");
                Arc::new(DisabledEmbeds)
            }
        };

        let source: Arc<dyn BlockSource> = Arc::new(notion.clone());
        let compiler = MarkupCompiler::new(source, Arc::clone(&embeds))
            .with_max_depth(config.max_resolve_depth);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                cache,
                notion,
                embeds,
                compiler,
                default_database_id: config.notion_database_id.clone(),
            }),
        })
    }

    /// Get the response cache.
    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.inner.cache
    }

    /// Get the Notion client.
    pub fn notion(&self) -> &NotionClient {
        &self.inner.notion
    }

    /// Get the embed resolver.
    pub fn embeds(&self) -> &Arc<dyn EmbedResolver> {
        &self.inner.embeds
    }

    /// Get the markup compiler.
    pub fn compiler(&self) -> &MarkupCompiler {
        &self.inner.compiler
    }

    /// Get the tree resolver used by the compiler.
    pub fn resolver(&self) -> &TreeResolver {
        self.inner.compiler.resolver()
    }

    /// Get the database listed when none is named.
    pub fn default_database_id(&self) -> Option<&str> {
        self.inner.default_database_id.as_deref()
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            notion_api_key: "secret_test".to_string(),
            notion_api_base: "http://127.0.0.1:1".to_string(),
            notion_version: "2022-06-28".to_string(),
            notion_database_id: Some("db".to_string()),
            oembed_base_url: None,
            redis_url: None,
            cache_ttl_secs: 60,
            max_resolve_depth: 4,
            http_timeout_secs: 1,
        }
    }

    #[tokio::test]
    async fn builds_in_memory_state() {
        let state = AppState::new(&config()).unwrap();
        assert_eq!(state.default_database_id(), Some("db"));
        assert_eq!(state.compiler().max_depth(), 4);
        assert_eq!(state.resolver().max_depth(), 4);
        assert!(state.cache().set("k", "v").await);
        assert_eq!(state.cache().get("k").await.as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn embeds_are_disabled_without_endpoint() {
        let state = AppState::new(&config()).unwrap();
        assert!(state.embeds().lookup("https://youtu.be/x").await.is_err());
    }

    #[test]
    fn bad_token_fails_construction() {
        let mut config = config();
        config.notion_api_key = "bad\ntoken".to_string();
        assert!(AppState::new(&config).is_err());
    }
}
