//! Deserialized Notion objects: blocks, rich text, pages.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::content::BlockKind;

/// One atomic content unit from the Notion API.
///
/// `payload` is the kind-specific object stored under the block's type tag
/// (`block["paragraph"]` for a paragraph). `children` stays empty until the
/// tree resolver attaches them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawBlock")]
pub struct Block {
    pub id: String,
    pub kind: BlockKind,
    pub has_children: bool,
    pub payload: Value,
    pub children: Vec<Block>,
}

#[derive(Deserialize)]
struct RawBlock {
    id: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    has_children: bool,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl From<RawBlock> for Block {
    fn from(mut raw: RawBlock) -> Self {
        let payload = raw.rest.remove(&raw.kind).unwrap_or(Value::Null);
        Self {
            id: raw.id,
            kind: BlockKind::from_tag(&raw.kind),
            has_children: raw.has_children,
            payload,
            children: Vec::new(),
        }
    }
}

impl Block {
    /// Build a block from a single JSON object of the API's shape.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Look up a payload field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// Parse the `rich_text` field. `None` when the field is absent.
    pub fn rich_text(&self) -> Option<serde_json::Result<Vec<RichTextRun>>> {
        self.field("rich_text")
            .map(|v| serde_json::from_value(v.clone()))
    }

    /// Whether the block carries a `rich_text` field that holds no runs.
    pub fn has_empty_rich_text(&self) -> bool {
        self.field("rich_text")
            .and_then(Value::as_array)
            .is_some_and(|runs| runs.is_empty())
    }
}

/// A span of text with formatting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RichTextRun {
    #[serde(default)]
    pub plain_text: String,
    #[serde(default)]
    pub annotations: Annotations,
    #[serde(default)]
    pub href: Option<String>,
}

impl RichTextRun {
    pub fn plain(text: &str) -> Self {
        Self {
            plain_text: text.to_string(),
            annotations: Annotations::default(),
            href: None,
        }
    }
}

/// Formatting flags of a rich text run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
    pub color: String,
}

impl Default for Annotations {
    fn default() -> Self {
        Self {
            bold: false,
            italic: false,
            strikethrough: false,
            underline: false,
            code: false,
            color: DEFAULT_COLOR.to_string(),
        }
    }
}

/// Notion's color tag for "no color".
pub const DEFAULT_COLOR: &str = "default";

/// Where a media block's file lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Linked from a third-party URL.
    External { url: String },
    /// Uploaded to Notion; the URL is signed and short-lived.
    Hosted { url: String },
}

impl MediaSource {
    pub fn url(&self) -> &str {
        match self {
            Self::External { url } | Self::Hosted { url } => url,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, Self::External { .. })
    }
}

#[derive(Deserialize)]
struct FileObject {
    url: String,
}

#[derive(Deserialize)]
struct RawMedia {
    #[serde(rename = "type")]
    source: String,
    #[serde(default)]
    external: Option<FileObject>,
    #[serde(default)]
    file: Option<FileObject>,
}

impl Block {
    /// Resolve the media location of an image/file/video payload.
    ///
    /// Bookmarks carry a bare `url` and are reported as external.
    pub fn media_source(&self) -> Option<MediaSource> {
        if let Some(url) = self.field("url").and_then(Value::as_str) {
            return Some(MediaSource::External {
                url: url.to_string(),
            });
        }

        let raw: RawMedia = serde_json::from_value(self.payload.clone()).ok()?;
        match raw.source.as_str() {
            "external" => raw
                .external
                .map(|f| MediaSource::External { url: f.url }),
            "file" => raw.file.map(|f| MediaSource::Hosted { url: f.url }),
            _ => None,
        }
    }

    /// Parse the `caption` field; absent or malformed captions are empty.
    pub fn caption(&self) -> Vec<RichTextRun> {
        self.field("caption")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

/// A Notion page (database row).
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub last_edited_time: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Page {
    /// Plain text of the page's `title` property.
    pub fn title(&self) -> String {
        self.properties
            .values()
            .find(|p| p.get("type").and_then(Value::as_str) == Some("title"))
            .and_then(|p| p.get("title"))
            .and_then(|t| serde_json::from_value::<Vec<RichTextRun>>(t.clone()).ok())
            .map(|runs| runs.into_iter().map(|r| r.plain_text).collect())
            .unwrap_or_default()
    }
}

/// Envelope of list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn block_payload_is_taken_from_type_tag() {
        let block = Block::from_value(json!({
            "object": "block",
            "id": "b1",
            "type": "paragraph",
            "has_children": false,
            "paragraph": { "rich_text": [{ "plain_text": "Hi" }], "color": "default" }
        }))
        .unwrap();

        assert_eq!(block.kind, BlockKind::Paragraph);
        let runs = block.rich_text().unwrap().unwrap();
        assert_eq!(runs, vec![RichTextRun::plain("Hi")]);
        assert!(block.children.is_empty());
    }

    #[test]
    fn unknown_type_keeps_its_tag() {
        let block = Block::from_value(json!({
            "id": "b2",
            "type": "synced_block",
            "synced_block": {}
        }))
        .unwrap();
        assert_eq!(block.kind, BlockKind::Unknown("synced_block".to_string()));
        assert!(!block.has_children);
    }

    #[test]
    fn missing_rich_text_is_none() {
        let block = Block::from_value(json!({ "id": "b3", "type": "paragraph", "paragraph": {} }))
            .unwrap();
        assert!(block.rich_text().is_none());
        assert!(!block.has_empty_rich_text());
    }

    #[test]
    fn annotations_default_when_missing() {
        let run: RichTextRun = serde_json::from_value(json!({ "plain_text": "x" })).unwrap();
        assert_eq!(run.annotations, Annotations::default());
        assert_eq!(run.annotations.color, "default");
    }

    #[test]
    fn media_source_external_and_hosted() {
        let external = Block::from_value(json!({
            "id": "i1", "type": "image",
            "image": { "type": "external", "external": { "url": "https://x.test/a.png" } }
        }))
        .unwrap();
        assert_eq!(
            external.media_source(),
            Some(MediaSource::External { url: "https://x.test/a.png".into() })
        );

        let hosted = Block::from_value(json!({
            "id": "i2", "type": "image",
            "image": { "type": "file", "file": { "url": "https://s3.test/b.png", "expiry_time": "2024-01-01T00:00:00Z" } }
        }))
        .unwrap();
        assert!(!hosted.media_source().unwrap().is_external());
    }

    #[test]
    fn bookmark_url_is_external() {
        let bookmark = Block::from_value(json!({
            "id": "k1", "type": "bookmark",
            "bookmark": { "url": "https://example.com", "caption": [] }
        }))
        .unwrap();
        assert_eq!(bookmark.media_source().unwrap().url(), "https://example.com");
    }

    #[test]
    fn page_title_joins_title_property() {
        let page: Page = serde_json::from_value(json!({
            "id": "p1",
            "properties": {
                "Tags": { "type": "multi_select", "multi_select": [] },
                "Name": { "type": "title", "title": [
                    { "plain_text": "Hello " }, { "plain_text": "there" }
                ] }
            }
        }))
        .unwrap();
        assert_eq!(page.title(), "Hello there");
    }

    #[test]
    fn page_without_title_is_empty() {
        let page: Page = serde_json::from_value(json!({ "id": "p2" })).unwrap();
        assert_eq!(page.title(), "");
    }
}
