//! Block kinds and the renderer registry.
//!
//! Provides:
//! - `BlockKind`: closed set of known Notion block types plus `Unknown`
//! - `BlockRenderer`: the per-kind rendering seam
//! - `RendererRegistry`: kind tag → renderer, pre-populated with built-ins
//!   and open to additional registrations before compilation

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::block_render::{
    ColumnListRenderer, EmbedRenderer, FileRenderer, HeadingRenderer, ImageRenderer,
    ListItemRenderer, ParagraphRenderer,
};
use super::compiler::RenderContext;
use crate::notion::Block;

/// Type tag of a Notion block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Heading1,
    Heading2,
    Heading3,
    Paragraph,
    Image,
    File,
    Video,
    Bookmark,
    BulletedListItem,
    NumberedListItem,
    ColumnList,
    Column,
    /// Any tag this crate has no built-in knowledge of.
    Unknown(String),
}

impl BlockKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "heading_1" => Self::Heading1,
            "heading_2" => Self::Heading2,
            "heading_3" => Self::Heading3,
            "paragraph" => Self::Paragraph,
            "image" => Self::Image,
            "file" => Self::File,
            "video" => Self::Video,
            "bookmark" => Self::Bookmark,
            "bulleted_list_item" => Self::BulletedListItem,
            "numbered_list_item" => Self::NumberedListItem,
            "column_list" => Self::ColumnList,
            "column" => Self::Column,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// The API's type tag.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Heading1 => "heading_1",
            Self::Heading2 => "heading_2",
            Self::Heading3 => "heading_3",
            Self::Paragraph => "paragraph",
            Self::Image => "image",
            Self::File => "file",
            Self::Video => "video",
            Self::Bookmark => "bookmark",
            Self::BulletedListItem => "bulleted_list_item",
            Self::NumberedListItem => "numbered_list_item",
            Self::ColumnList => "column_list",
            Self::Column => "column",
            Self::Unknown(tag) => tag,
        }
    }

    pub fn heading_level(&self) -> Option<u8> {
        match self {
            Self::Heading1 => Some(1),
            Self::Heading2 => Some(2),
            Self::Heading3 => Some(3),
            _ => None,
        }
    }

    /// List style for list-item kinds; these are grouped by the compiler.
    pub fn list_style(&self) -> Option<ListStyle> {
        match self {
            Self::BulletedListItem => Some(ListStyle::Unordered),
            Self::NumberedListItem => Some(ListStyle::Ordered),
            _ => None,
        }
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered (`<ol>`) or unordered (`<ul>`) list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    Unordered,
    Ordered,
}

impl ListStyle {
    pub fn tag(self) -> &'static str {
        match self {
            Self::Unordered => "ul",
            Self::Ordered => "ol",
        }
    }

    pub fn is_ordered(self) -> bool {
        matches!(self, Self::Ordered)
    }
}

/// Why a block produced no markup.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("block {block_id} has no `{field}` field")]
    MissingField {
        block_id: String,
        field: &'static str,
    },

    #[error("block {block_id} has a malformed `{field}` field: {source}")]
    Malformed {
        block_id: String,
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("block {block_id} has no usable media source")]
    MissingSource { block_id: String },

    #[error("renderer cannot handle block {block_id} of kind {kind}")]
    UnexpectedKind { block_id: String, kind: String },
}

/// Result type alias using RenderError.
pub type RenderResult<T> = Result<T, RenderError>;

/// Renders one block to markup.
///
/// An `Err` is logged by the compiler and replaced with an empty segment;
/// the remaining siblings still render.
#[async_trait]
pub trait BlockRenderer: Send + Sync {
    async fn render(&self, block: &Block, cx: &RenderContext<'_>) -> RenderResult<String>;
}

/// Registry of renderers, keyed by block type tag.
#[derive(Clone)]
pub struct RendererRegistry {
    renderers: HashMap<String, Arc<dyn BlockRenderer>>,
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RendererRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    /// Create a registry pre-populated with the built-in renderers.
    pub fn with_builtin_renderers() -> Self {
        let mut registry = Self::new();
        registry.register_builtin_renderers();
        registry
    }

    /// Register (or replace) the renderer for a type tag.
    pub fn register(&mut self, tag: impl Into<String>, renderer: Arc<dyn BlockRenderer>) {
        self.renderers.insert(tag.into(), renderer);
    }

    /// Look up the renderer for a block kind.
    pub fn get(&self, kind: &BlockKind) -> Option<&dyn BlockRenderer> {
        self.renderers.get(kind.as_str()).map(|r| r.as_ref())
    }

    /// Check whether a type tag has a renderer.
    pub fn contains(&self, tag: &str) -> bool {
        self.renderers.contains_key(tag)
    }

    /// Return the number of registered renderers.
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }

    /// List all registered type tags.
    pub fn tags(&self) -> Vec<String> {
        self.renderers.keys().cloned().collect()
    }

    /// Register the built-in renderers: headings, paragraph, image, file,
    /// video, bookmark, both list items, and column lists.
    pub fn register_builtin_renderers(&mut self) {
        let heading: Arc<dyn BlockRenderer> = Arc::new(HeadingRenderer);
        for kind in [BlockKind::Heading1, BlockKind::Heading2, BlockKind::Heading3] {
            self.register(kind.as_str(), Arc::clone(&heading));
        }

        self.register(BlockKind::Paragraph.as_str(), Arc::new(ParagraphRenderer));
        self.register(BlockKind::Image.as_str(), Arc::new(ImageRenderer));
        self.register(BlockKind::File.as_str(), Arc::new(FileRenderer));

        let embed: Arc<dyn BlockRenderer> = Arc::new(EmbedRenderer);
        self.register(BlockKind::Video.as_str(), Arc::clone(&embed));
        self.register(BlockKind::Bookmark.as_str(), embed);

        let list_item: Arc<dyn BlockRenderer> = Arc::new(ListItemRenderer);
        self.register(BlockKind::BulletedListItem.as_str(), Arc::clone(&list_item));
        self.register(BlockKind::NumberedListItem.as_str(), list_item);

        self.register(BlockKind::ColumnList.as_str(), Arc::new(ColumnListRenderer));
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags = self.tags();
        tags.sort();
        f.debug_struct("RendererRegistry").field("tags", &tags).finish()
    }
}
