//! Block markup compilation.
//!
//! This module provides:
//! - MarkupCompiler: single-pass block sequence → WordPress block markup
//! - RendererRegistry: block kind → renderer dispatch, open to extension
//! - Built-in renderers for headings, paragraphs, media, lists and columns
//! - Rich text rendering with annotations, colors and links

pub mod block_render;
pub mod block_types;
mod compiler;
pub mod markup;
pub mod rich_text;

pub use block_render::{
    ColumnListRenderer, EmbedRenderer, FileRenderer, HeadingRenderer, ImageRenderer,
    ListItemRenderer, ParagraphRenderer, render_embed, render_list,
};
pub use block_types::{
    BlockKind, BlockRenderer, ListStyle, RenderError, RenderResult, RendererRegistry,
};
pub use compiler::{MarkupCompiler, RenderContext};
pub use rich_text::{plain_text, render_rich_text};
