//! Notion API access: models, HTTP client, and child-tree resolution.

mod client;
mod models;
mod resolver;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

pub use client::{
    DEFAULT_API_BASE, DEFAULT_API_VERSION, NotionClient, NotionConfig, parse_block_list,
    parse_page_list,
};
pub use models::{
    Annotations, Block, DEFAULT_COLOR, ListResponse, MediaSource, Page, RichTextRun,
};
pub use resolver::{DEFAULT_MAX_DEPTH, Resolution, TreeResolver};

/// Anything that can list the direct children of a block.
///
/// Implementations degrade to an empty list on failure; callers treat
/// that as "no children".
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch_children(&self, block_id: &str) -> Vec<Block>;
}

/// Trailing 32-hex-digit id, optionally dashed, at the end of an id or URL.
///
/// # Panics
///
/// Panics if the hard-coded regex literal is invalid (impossible in practice).
#[allow(clippy::expect_used)]
static NOTION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9a-fA-F]{8})-?([0-9a-fA-F]{4})-?([0-9a-fA-F]{4})-?([0-9a-fA-F]{4})-?([0-9a-fA-F]{12})$")
        .expect("valid regex literal")
});

/// Canonicalize a Notion id.
///
/// Accepts the dashed or undashed form, or a Notion URL whose path ends in
/// the id (`https://www.notion.so/Title-0123…`). Query strings and fragments
/// are ignored. Returns the lowercase dashed form.
pub fn normalize_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let without_query = trimmed
        .split(['?', '#'])
        .next()
        .unwrap_or(trimmed)
        .trim_end_matches('/');

    let caps = NOTION_ID.captures(without_query)?;
    let parts: Vec<&str> = (1..=5)
        .filter_map(|i| caps.get(i).map(|m| m.as_str()))
        .collect();
    Some(parts.join("-").to_ascii_lowercase())
}
