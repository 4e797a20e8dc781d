#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Common test utilities for integration tests.
//!
//! Clients are built with the real kernel code and pointed at `wiremock`
//! servers standing in for the Notion API and the oEmbed proxy.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notion_press::cache::{CacheStore, TransientCache};
use notion_press::content::MarkupCompiler;
use notion_press::embed::{DisabledEmbeds, EmbedResolver, OEmbedClient};
use notion_press::notion::{NotionClient, NotionConfig};

pub const TOKEN: &str = "secret_test_token";

/// A Notion client against `server`, with its cache.
pub fn notion_client(server: &MockServer) -> (NotionClient, TransientCache) {
    let cache = TransientCache::new(3600);
    let config = NotionConfig::new(TOKEN).with_api_base(server.uri());
    let client = NotionClient::new(&config, Arc::new(cache.clone())).unwrap();
    (client, cache)
}

/// A compiler reading blocks from `notion` and embeds from `oembed`, if any.
pub fn compiler(notion: &MockServer, oembed: Option<&MockServer>) -> MarkupCompiler {
    let (client, cache) = notion_client(notion);
    let embeds: Arc<dyn EmbedResolver> = match oembed {
        Some(server) => {
            let cache: Arc<dyn CacheStore> = Arc::new(cache);
            Arc::new(OEmbedClient::new(&server.uri(), Duration::from_secs(5), cache).unwrap())
        }
        None => Arc::new(DisabledEmbeds),
    };
    MarkupCompiler::new(Arc::new(client), embeds)
}

/// Serve `body` as the children of `block_id`.
pub async fn mount_children(server: &MockServer, block_id: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/blocks/{block_id}/children")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Serve `body` from the oEmbed proxy for `url`.
pub async fn mount_oembed(server: &MockServer, url: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path("/oembed/1.0/proxy"))
        .and(query_param("url", url))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}
