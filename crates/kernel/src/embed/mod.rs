//! oEmbed metadata lookup for external media URLs.
//!
//! Lookups go through an oEmbed proxy (`/oembed/1.0/proxy?url=…`, as exposed
//! by a WordPress REST API). Any failure is reported as a typed
//! [`EmbedError`]; the compiler drops the embed instead of falling back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheNamespace, CacheStore};

/// Why a lookup produced no metadata.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("no oEmbed endpoint configured")]
    Disabled,

    #[error("oEmbed proxy answered {status} for {url}")]
    Status { status: u16, url: String },

    #[error("oEmbed transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed oEmbed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type alias using EmbedError.
pub type EmbedResult<T> = Result<T, EmbedError>;

/// Third-party description of how to render a URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EmbedMetadata {
    pub title: Option<String>,
    pub html: Option<String>,
    /// oEmbed resource type: `video`, `rich`, `photo` or `link`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub version: Option<String>,
    pub provider_name: Option<String>,
    pub provider_url: Option<String>,
    pub author_name: Option<String>,
    pub author_url: Option<String>,
    pub thumbnail_url: Option<String>,
    #[serde(deserialize_with = "dimension")]
    pub thumbnail_width: Option<u32>,
    #[serde(deserialize_with = "dimension")]
    pub thumbnail_height: Option<u32>,
    #[serde(deserialize_with = "dimension")]
    pub width: Option<u32>,
    #[serde(deserialize_with = "dimension")]
    pub height: Option<u32>,
}

/// Providers send dimensions as numbers, numeric strings, `null`, or
/// things like `"100%"`. Only whole pixel counts are kept.
fn dimension<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Resolves embed metadata for a URL.
#[async_trait]
pub trait EmbedResolver: Send + Sync {
    async fn lookup(&self, url: &str) -> EmbedResult<EmbedMetadata>;
}

/// Resolver used when no oEmbed endpoint is configured: every lookup fails
/// with [`EmbedError::Disabled`].
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEmbeds;

#[async_trait]
impl EmbedResolver for DisabledEmbeds {
    async fn lookup(&self, _url: &str) -> EmbedResult<EmbedMetadata> {
        Err(EmbedError::Disabled)
    }
}

/// HTTP client for an oEmbed proxy endpoint. Successful bodies are cached.
#[derive(Clone)]
pub struct OEmbedClient {
    http: reqwest::Client,
    endpoint: String,
    cache: Arc<dyn CacheStore>,
}

impl OEmbedClient {
    /// `base_url` is the REST root the proxy hangs off, e.g.
    /// `https://example.com/wp-json`.
    pub fn new(
        base_url: &str,
        timeout: Duration,
        cache: Arc<dyn CacheStore>,
    ) -> EmbedResult<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/oembed/1.0/proxy", base_url.trim_end_matches('/')),
            cache,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn fetch(&self, url: &str) -> EmbedResult<String> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("url", url)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EmbedError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl EmbedResolver for OEmbedClient {
    async fn lookup(&self, url: &str) -> EmbedResult<EmbedMetadata> {
        let key = CacheNamespace::Embed.key(url);
        if let Some(body) = self.cache.get(&key).await {
            if let Ok(meta) = serde_json::from_str(&body) {
                debug!(url = %url, "serving oEmbed metadata from cache");
                return Ok(meta);
            }
        }

        let body = self.fetch(url).await?;
        let meta: EmbedMetadata = serde_json::from_str(&body)?;
        if !self.cache.set(&key, &body).await {
            warn!(url = %url, "failed to cache oEmbed metadata");
        }
        Ok(meta)
    }
}

impl std::fmt::Debug for OEmbedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OEmbedClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
