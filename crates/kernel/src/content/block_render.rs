//! Built-in block renderers.
//!
//! Each renderer turns one Notion block into a WordPress block-markup
//! segment. Missing or malformed fields are reported as [`RenderError`] and
//! become an empty segment in the compiler. Embed lookup failures and hosted
//! files are not errors; they render nothing.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use super::block_types::{BlockKind, BlockRenderer, ListStyle, RenderError, RenderResult};
use super::compiler::RenderContext;
use super::markup::{CRLF, attrs_json, delimited, html_escape};
use super::rich_text::{plain_text, render_rich_text};
use crate::embed::EmbedMetadata;
use crate::notion::{Block, MediaSource, RichTextRun};

/// Parse a block's `rich_text` field, treating absence as an error.
fn rich_text(block: &Block) -> RenderResult<Vec<RichTextRun>> {
    match block.rich_text() {
        None => Err(RenderError::MissingField {
            block_id: block.id.clone(),
            field: "rich_text",
        }),
        Some(Err(source)) => Err(RenderError::Malformed {
            block_id: block.id.clone(),
            field: "rich_text",
            source,
        }),
        Some(Ok(runs)) => Ok(runs),
    }
}

fn media_source(block: &Block) -> RenderResult<MediaSource> {
    block.media_source().ok_or_else(|| RenderError::MissingSource {
        block_id: block.id.clone(),
    })
}

/// `<figcaption>` for a non-empty caption.
fn figcaption(caption: &[RichTextRun]) -> String {
    if caption.is_empty() {
        return String::new();
    }
    format!(
        "<figcaption class=\"wp-element-caption\">{}</figcaption>",
        render_rich_text(caption, false)
    )
}

/// Wrap rendered list items in a `wp:list` block.
pub fn render_list(style: ListStyle, items: &str) -> String {
    #[derive(Serialize)]
    struct ListAttrs {
        ordered: bool,
    }

    let attrs = style
        .is_ordered()
        .then(|| attrs_json(&ListAttrs { ordered: true }))
        .flatten();
    let tag = style.tag();
    delimited("list", attrs, &format!("<{tag}>{CRLF}{items}</{tag}>"))
}

// ---------------------------------------------------------------------------
// Text blocks
// ---------------------------------------------------------------------------

/// `heading_1` … `heading_3`. Headings carry their own styles, so only the
/// plain text is emitted.
pub struct HeadingRenderer;

#[async_trait]
impl BlockRenderer for HeadingRenderer {
    async fn render(&self, block: &Block, _cx: &RenderContext<'_>) -> RenderResult<String> {
        #[derive(Serialize)]
        struct HeadingAttrs {
            level: u8,
        }

        let level = block
            .kind
            .heading_level()
            .ok_or_else(|| RenderError::UnexpectedKind {
                block_id: block.id.clone(),
                kind: block.kind.to_string(),
            })?;
        let runs = rich_text(block)?;
        if runs.is_empty() {
            return Ok(String::new());
        }

        // Level 2 is the editor default; levels 2 and 3 omit attributes.
        let attrs = (level == 1)
            .then(|| attrs_json(&HeadingAttrs { level }))
            .flatten();
        let text = render_rich_text(&runs, true);
        Ok(delimited(
            "heading",
            attrs,
            &format!("<h{level} class=\"wp-block-heading\">{text}</h{level}>"),
        ))
    }
}

pub struct ParagraphRenderer;

#[async_trait]
impl BlockRenderer for ParagraphRenderer {
    async fn render(&self, block: &Block, _cx: &RenderContext<'_>) -> RenderResult<String> {
        let runs = rich_text(block)?;
        let text = render_rich_text(&runs, false);
        Ok(delimited("paragraph", None, &format!("<p>{text}</p>")))
    }
}

// ---------------------------------------------------------------------------
// Media blocks
// ---------------------------------------------------------------------------

/// Images render from either location; hosted URLs are emitted as given.
pub struct ImageRenderer;

#[async_trait]
impl BlockRenderer for ImageRenderer {
    async fn render(&self, block: &Block, _cx: &RenderContext<'_>) -> RenderResult<String> {
        let source = media_source(block)?;
        if !source.is_external() {
            debug!(block_id = %block.id, "image is hosted by Notion; its URL expires");
        }

        let caption = block.caption();
        let inner = format!(
            "<figure class=\"wp-block-image\"><img src=\"{}\" alt=\"{}\"/>{}</figure>",
            html_escape(source.url()),
            html_escape(&plain_text(&caption)),
            figcaption(&caption),
        );
        Ok(delimited("image", None, &inner))
    }
}

/// Files render as a download link, and only when linked externally.
pub struct FileRenderer;

#[async_trait]
impl BlockRenderer for FileRenderer {
    async fn render(&self, block: &Block, _cx: &RenderContext<'_>) -> RenderResult<String> {
        let source = media_source(block)?;
        let MediaSource::External { url } = source else {
            debug!(block_id = %block.id, "hosted files are not supported; skipping");
            return Ok(String::new());
        };

        let caption = block.caption();
        let label = if !caption.is_empty() {
            render_rich_text(&caption, false)
        } else if let Some(name) = block
            .field("name")
            .and_then(|v| v.as_str())
            .filter(|n| !n.is_empty())
        {
            html_escape(name)
        } else {
            html_escape(&url)
        };

        let inner = format!(
            "<div class=\"wp-block-file\"><a href=\"{}\">{label}</a></div>",
            html_escape(&url)
        );
        Ok(delimited("file", None, &inner))
    }
}

/// `video` and `bookmark`: external URLs resolved through oEmbed.
pub struct EmbedRenderer;

#[async_trait]
impl BlockRenderer for EmbedRenderer {
    async fn render(&self, block: &Block, cx: &RenderContext<'_>) -> RenderResult<String> {
        let source = media_source(block)?;
        let MediaSource::External { url } = source else {
            debug!(block_id = %block.id, kind = %block.kind, "hosted media cannot be embedded; skipping");
            return Ok(String::new());
        };

        match cx.embeds().lookup(&url).await {
            Ok(meta) => Ok(render_embed(&url, &meta, &block.caption())),
            Err(e) => {
                warn!(
                    error = %e,
                    block_id = %block.id,
                    url = %url,
                    "embed lookup failed; omitting block"
                );
                Ok(String::new())
            }
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedAttrs<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_name_slug: Option<&'a str>,
    responsive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_name: Option<String>,
}

/// Render a `wp:embed` figure from oEmbed metadata.
pub fn render_embed(url: &str, meta: &EmbedMetadata, caption: &[RichTextRun]) -> String {
    let kind = meta.kind.as_deref().unwrap_or("rich");
    let slug = meta.provider_name.as_deref().and_then(provider_slug);
    let aspect = match (kind, meta.width, meta.height) {
        ("video" | "rich", Some(w), Some(h)) => aspect_ratio_class(w, h),
        _ => None,
    };
    let class_name = aspect.map(|class| format!("{class} wp-has-aspect-ratio"));

    let attrs = attrs_json(&EmbedAttrs {
        url,
        kind,
        provider_name_slug: slug.as_deref(),
        responsive: true,
        class_name: class_name.clone(),
    });

    let mut classes = format!("wp-block-embed is-type-{kind}");
    if let Some(slug) = &slug {
        classes.push_str(&format!(" is-provider-{slug} wp-block-embed-{slug}"));
    }
    if let Some(class_name) = &class_name {
        classes.push(' ');
        classes.push_str(class_name);
    }

    let inner = format!(
        "<figure class=\"{}\"><div class=\"wp-block-embed__wrapper\">{CRLF}{}{CRLF}</div>{}</figure>",
        html_escape(&classes),
        html_escape(url),
        figcaption(caption),
    );
    delimited("embed", attrs, &inner)
}

/// Lowercase, dash-separated provider name (`"YouTube"` → `youtube`).
fn provider_slug(name: &str) -> Option<String> {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_end_matches('-');
    (!slug.is_empty()).then(|| slug.to_string())
}

/// Editor aspect-ratio buckets, widest first.
const ASPECT_RATIOS: [(f64, &str); 7] = [
    (2.33, "wp-embed-aspect-21-9"),
    (2.00, "wp-embed-aspect-18-9"),
    (1.78, "wp-embed-aspect-16-9"),
    (1.33, "wp-embed-aspect-4-3"),
    (1.00, "wp-embed-aspect-1-1"),
    (0.56, "wp-embed-aspect-9-16"),
    (0.50, "wp-embed-aspect-1-2"),
];

/// The editor's aspect class for a width/height pair: the widest bucket the
/// ratio (rounded to two decimals) reaches, if it is within 0.1 of it.
fn aspect_ratio_class(width: u32, height: u32) -> Option<&'static str> {
    if width == 0 || height == 0 {
        return None;
    }
    let ratio = (f64::from(width) / f64::from(height) * 100.0).round() / 100.0;
    let (bucket, class) = ASPECT_RATIOS
        .iter()
        .find(|(bucket, _)| ratio >= *bucket - f64::EPSILON)?;
    (ratio - bucket <= 0.1 + f64::EPSILON).then_some(*class)
}

// ---------------------------------------------------------------------------
// Container blocks
// ---------------------------------------------------------------------------

/// One `wp:list-item`. The compiler groups consecutive items into a list.
///
/// Item children are flattened into a single nested list whose style follows
/// the first child; deeper descendants are not rendered.
pub struct ListItemRenderer;

#[async_trait]
impl BlockRenderer for ListItemRenderer {
    async fn render(&self, block: &Block, cx: &RenderContext<'_>) -> RenderResult<String> {
        let runs = rich_text(block)?;
        let mut inner = format!("<li>{}", render_rich_text(&runs, false));

        let children = cx.direct_children(block).await;
        if let Some(first) = children.first() {
            let style = first.kind.list_style().unwrap_or(ListStyle::Unordered);
            let mut items = String::new();
            for child in children.iter() {
                match rich_text(child) {
                    Ok(runs) => items.push_str(&delimited(
                        "list-item",
                        None,
                        &format!("<li>{}</li>", render_rich_text(&runs, false)),
                    )),
                    Err(e) => {
                        debug!(error = %e, parent_id = %block.id, "skipping nested list child");
                    }
                }
            }
            if !items.is_empty() {
                inner.push_str(&render_list(style, &items));
            }
        }

        inner.push_str("</li>");
        Ok(delimited("list-item", None, &inner))
    }
}

/// `column_list`: each child becomes a `wp:column` inside `wp:columns`.
pub struct ColumnListRenderer;

#[async_trait]
impl BlockRenderer for ColumnListRenderer {
    async fn render(&self, block: &Block, cx: &RenderContext<'_>) -> RenderResult<String> {
        let children = cx.children(block).await;
        let mut columns = String::new();

        for child in children.iter() {
            if child.has_empty_rich_text() {
                debug!(block_id = %child.id, "skipping empty column child");
                continue;
            }

            let inner = if child.kind == BlockKind::Column {
                let column_children = cx.children(child).await;
                cx.compile(&column_children).await
            } else {
                cx.compile(std::slice::from_ref(child)).await
            };
            columns.push_str(&delimited(
                "column",
                None,
                &format!("<div class=\"wp-block-column\">{CRLF}{inner}</div>"),
            ));
        }

        if columns.is_empty() {
            return Ok(String::new());
        }
        Ok(delimited(
            "columns",
            None,
            &format!("<div class=\"wp-block-columns\">{CRLF}{columns}</div>"),
        ))
    }
}
