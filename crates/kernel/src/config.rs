//! Configuration loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cache::DEFAULT_TTL_SECS;
use crate::notion::{DEFAULT_API_BASE, DEFAULT_API_VERSION, DEFAULT_MAX_DEPTH, NotionConfig};

/// Application configuration.
#[derive(Clone)]
pub struct Config {
    /// Notion integration secret (required).
    pub notion_api_key: String,

    /// Notion API host (default: https://api.notion.com).
    pub notion_api_base: String,

    /// Notion-Version header value (default: 2022-06-28).
    pub notion_version: String,

    /// Database listed by `pages` when none is given.
    pub notion_database_id: Option<String>,

    /// REST root of the oEmbed proxy. When None, embeds are disabled.
    pub oembed_base_url: Option<String>,

    /// Redis connection URL. When None, responses are cached in memory.
    pub redis_url: Option<String>,

    /// Cache time-to-live in seconds (default: 3600).
    pub cache_ttl_secs: u64,

    /// Block tree depth cap (default: 16).
    pub max_resolve_depth: usize,

    /// Per-request HTTP timeout in seconds (default: 30).
    pub http_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let notion_api_key = env::var("NOTION_API_KEY")
            .context("NOTION_API_KEY environment variable is required")?;

        let notion_api_base =
            env::var("NOTION_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let notion_version =
            env::var("NOTION_VERSION").unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        let notion_database_id = non_empty_var("NOTION_DATABASE_ID");
        let oembed_base_url = non_empty_var("OEMBED_BASE_URL");
        let redis_url = non_empty_var("REDIS_URL");

        let cache_ttl_secs = env::var("CACHE_TTL_SECS")
            .unwrap_or_else(|_| DEFAULT_TTL_SECS.to_string())
            .parse()
            .context("CACHE_TTL_SECS must be a valid u64")?;

        let max_resolve_depth = env::var("MAX_RESOLVE_DEPTH")
            .unwrap_or_else(|_| DEFAULT_MAX_DEPTH.to_string())
            .parse()
            .context("MAX_RESOLVE_DEPTH must be a valid usize")?;

        let http_timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("HTTP_TIMEOUT_SECS must be a valid u64")?;

        Ok(Self {
            notion_api_key,
            notion_api_base,
            notion_version,
            notion_database_id,
            oembed_base_url,
            redis_url,
            cache_ttl_secs,
            max_resolve_depth,
            http_timeout_secs,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Connection settings for the Notion client.
    pub fn notion(&self) -> NotionConfig {
        let mut notion =
            NotionConfig::new(self.notion_api_key.clone()).with_api_base(&self.notion_api_base);
        notion.api_version = self.notion_version.clone();
        notion.timeout = self.http_timeout();
        notion
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("notion_api_key", &"[redacted]")
            .field("notion_api_base", &self.notion_api_base)
            .field("notion_version", &self.notion_version)
            .field("notion_database_id", &self.notion_database_id)
            .field("oembed_base_url", &self.oembed_base_url)
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[set]"))
            .field("cache_ttl_secs", &self.cache_ttl_secs)
            .field("max_resolve_depth", &self.max_resolve_depth)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .finish()
    }
}
