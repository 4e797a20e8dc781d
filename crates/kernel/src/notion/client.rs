//! HTTP client for the Notion REST API with response caching.
//!
//! Every lookup goes through the [`CacheStore`] first. On a miss exactly one
//! request is issued; a non-success status or transport error yields an empty
//! result instead of an error. Only the first page of any list endpoint is
//! read.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::models::{Block, ListResponse, Page};
use super::BlockSource;
use crate::cache::{CacheNamespace, CacheStore};
use crate::error::{ApiError, ApiResult};

/// Production API host.
pub const DEFAULT_API_BASE: &str = "https://api.notion.com";

/// API version sent in the `Notion-Version` header.
pub const DEFAULT_API_VERSION: &str = "2022-06-28";

/// Connection settings for [`NotionClient`].
#[derive(Clone)]
pub struct NotionConfig {
    /// Scheme and host, without a trailing `/v1`.
    pub api_base: String,
    /// Value of the `Notion-Version` header.
    pub api_version: String,
    /// Integration secret, sent as a bearer token.
    pub token: String,
    /// Transport timeout per request.
    pub timeout: Duration,
}

impl NotionConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// The header set sent with every request.
    pub fn headers(&self) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("notion-version"),
            HeaderValue::from_str(&self.api_version)
                .map_err(|e| ApiError::Config(format!("invalid API version header: {e}")))?,
        );
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.token))
            .map_err(|e| ApiError::Config(format!("invalid API token: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }
}

impl std::fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionConfig")
            .field("api_base", &self.api_base)
            .field("api_version", &self.api_version)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Remote resources the client knows how to read.
#[derive(Debug, Clone, Copy)]
enum Endpoint<'a> {
    BlockChildren(&'a str),
    Page(&'a str),
    DatabaseQuery(&'a str),
}

impl Endpoint<'_> {
    fn namespace(self) -> CacheNamespace {
        match self {
            Self::BlockChildren(_) => CacheNamespace::Blocks,
            Self::Page(_) => CacheNamespace::Pages,
            Self::DatabaseQuery(_) => CacheNamespace::Databases,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::BlockChildren(_) => "children",
            Self::Page(_) => "page",
            Self::DatabaseQuery(_) => "query",
        }
    }

    fn resource_id(&self) -> &str {
        match self {
            Self::BlockChildren(id) | Self::Page(id) | Self::DatabaseQuery(id) => id,
        }
    }

    fn path(&self) -> String {
        let id = urlencoding::encode(self.resource_id());
        match self {
            Self::BlockChildren(_) => format!("/v1/blocks/{id}/children"),
            Self::Page(_) => format!("/v1/pages/{id}"),
            Self::DatabaseQuery(_) => format!("/v1/databases/{id}/query"),
        }
    }
}

/// Notion REST client.
///
/// Cheap to clone; clones share the HTTP connection pool, the cache handle
/// and the in-flight table.
#[derive(Clone)]
pub struct NotionClient {
    inner: Arc<NotionClientInner>,
}

struct NotionClientInner {
    http: reqwest::Client,
    api_base: String,
    cache: Arc<dyn CacheStore>,
    /// One lock per cache key with a request outstanding.
    in_flight: DashMap<String, Arc<tokio::sync::Mutex<()>>>,
}

impl NotionClient {
    /// Build a client. Fails only when the configured headers are invalid
    /// or the TLS backend cannot be initialized.
    pub fn new(config: &NotionConfig, cache: Arc<dyn CacheStore>) -> ApiResult<Self> {
        let http = reqwest::Client::builder()
            .default_headers(config.headers()?)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(NotionClientInner {
                http,
                api_base: config.api_base.trim_end_matches('/').to_string(),
                cache,
                in_flight: DashMap::new(),
            }),
        })
    }

    /// First page of a block's (or page's) children.
    pub async fn fetch_children(&self, block_id: &str) -> Vec<Block> {
        match self.cached_body(Endpoint::BlockChildren(block_id)).await {
            Some(body) => parse_block_list(&body),
            None => Vec::new(),
        }
    }

    /// A single page object.
    pub async fn fetch_page(&self, page_id: &str) -> Option<Page> {
        let body = self.cached_body(Endpoint::Page(page_id)).await?;
        match decode::<Page>(&body) {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(error = %e, page_id = %page_id, "malformed page body");
                None
            }
        }
    }

    /// First page of rows of a database.
    pub async fn query_database(&self, database_id: &str) -> Vec<Page> {
        match self.cached_body(Endpoint::DatabaseQuery(database_id)).await {
            Some(body) => parse_page_list(&body),
            None => Vec::new(),
        }
    }

    /// Cached body for `endpoint`, fetching it on a miss.
    ///
    /// Concurrent misses on the same key queue behind one lock; whoever gets
    /// the lock second re-reads the cache before going to the network.
    async fn cached_body(&self, endpoint: Endpoint<'_>) -> Option<String> {
        let key = endpoint.namespace().key(endpoint.resource_id());
        if let Some(body) = self.inner.cache.get(&key).await {
            debug!(key = %key, "serving notion response from cache");
            return Some(body);
        }

        let gate = Arc::clone(self.inner.in_flight.entry(key.clone()).or_default().value());
        let guard = gate.lock().await;

        let body = match self.inner.cache.get(&key).await {
            Some(body) => {
                debug!(key = %key, "response cached by concurrent request");
                Some(body)
            }
            None => match self.send(endpoint).await {
                Ok(body) => {
                    if !self.inner.cache.set(&key, &body).await {
                        warn!(key = %key, "failed to cache notion response");
                    }
                    Some(body)
                }
                Err(e) if e.is_not_found() => {
                    debug!(endpoint = endpoint.label(), key = %key, "notion resource not found or not shared");
                    None
                }
                Err(e) => {
                    warn!(error = %e, endpoint = endpoint.label(), key = %key, "notion request failed; treating as empty");
                    None
                }
            },
        };

        drop(guard);
        // The map and `gate` hold one reference each when nobody is waiting.
        self.inner
            .in_flight
            .remove_if(&key, |_, lock| Arc::strong_count(lock) <= 2);

        body
    }

    async fn send(&self, endpoint: Endpoint<'_>) -> ApiResult<String> {
        let url = format!("{}{}", self.inner.api_base, endpoint.path());
        let request = match endpoint {
            Endpoint::DatabaseQuery(_) => self.inner.http.post(&url).json(&serde_json::json!({})),
            Endpoint::BlockChildren(_) | Endpoint::Page(_) => self.inner.http.get(&url),
        };

        debug!(url = %url, "notion request");
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
            });
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl BlockSource for NotionClient {
    async fn fetch_children(&self, block_id: &str) -> Vec<Block> {
        NotionClient::fetch_children(self, block_id).await
    }
}

impl std::fmt::Debug for NotionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionClient")
            .field("api_base", &self.inner.api_base)
            .finish()
    }
}

fn decode<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    Ok(serde_json::from_str(body)?)
}

fn parse_list(body: &str) -> Option<ListResponse> {
    match decode::<ListResponse>(body) {
        Ok(list) => {
            if list.has_more {
                debug!(
                    next_cursor = ?list.next_cursor,
                    "list truncated to first page; further pages are not fetched"
                );
            }
            Some(list)
        }
        Err(e) => {
            warn!(error = %e, "malformed list body");
            None
        }
    }
}

/// Parse a `{ results: [...] }` body into blocks.
///
/// Elements that are not valid blocks are skipped.
pub fn parse_block_list(body: &str) -> Vec<Block> {
    let Some(list) = parse_list(body) else {
        return Vec::new();
    };

    list.results
        .into_iter()
        .filter_map(|value| match Block::from_value(value) {
            Ok(block) => Some(block),
            Err(e) => {
                warn!(error = %e, "skipping malformed block");
                None
            }
        })
        .collect()
}

/// Parse a `{ results: [...] }` body into pages, skipping malformed rows.
pub fn parse_page_list(body: &str) -> Vec<Page> {
    let Some(list) = parse_list(body) else {
        return Vec::new();
    };

    list.results
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Page>(value) {
            Ok(page) => Some(page),
            Err(e) => {
                warn!(error = %e, "skipping malformed page");
                None
            }
        })
        .collect()
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::BlockKind;

    #[test]
    fn headers_carry_version_auth_and_content_type() {
        let headers = NotionConfig::new("secret_abc").headers().unwrap();
        assert_eq!(headers["notion-version"], "2022-06-28");
        assert_eq!(headers[AUTHORIZATION], "Bearer secret_abc");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn token_with_newline_is_rejected() {
        let err = NotionConfig::new("bad\ntoken").headers().unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn debug_output_redacts_token() {
        let debug = format!("{:?}", NotionConfig::new("secret_abc"));
        assert!(!debug.contains("secret_abc"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(Endpoint::BlockChildren("b1").path(), "/v1/blocks/b1/children");
        assert_eq!(Endpoint::Page("p1").path(), "/v1/pages/p1");
        assert_eq!(Endpoint::DatabaseQuery("d1").path(), "/v1/databases/d1/query");
    }

    #[test]
    fn endpoint_ids_are_escaped() {
        assert_eq!(
            Endpoint::BlockChildren("a/b").path(),
            "/v1/blocks/a%2Fb/children"
        );
    }

    #[test]
    fn parse_block_list_skips_malformed_entries() {
        let body = r#"{
            "object": "list",
            "results": [
                { "id": "a", "type": "paragraph", "paragraph": { "rich_text": [] } },
                { "type": "paragraph" },
                { "id": "c", "type": "divider", "divider": {} }
            ],
            "has_more": false
        }"#;
        let blocks = parse_block_list(body);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind, BlockKind::Paragraph);
        assert_eq!(blocks[1].id, "c");
    }

    #[test]
    fn parse_block_list_tolerates_garbage() {
        assert!(parse_block_list("not json").is_empty());
        assert!(parse_block_list("{}").is_empty());
    }

    #[test]
    fn undecodable_bodies_surface_as_decode_errors() {
        let err = decode::<ListResponse>("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, ApiError::Decode(_)));
        assert!(!err.is_not_found());
        assert!(decode::<Page>(r#"{ "id": "p1" }"#).is_ok());
    }

    #[test]
    fn parse_page_list_reads_rows() {
        let body = r#"{ "results": [ { "id": "p1", "url": "https://notion.so/p1" }, 42 ] }"#;
        let pages = parse_page_list(body);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].url, "https://notion.so/p1");
    }
}
