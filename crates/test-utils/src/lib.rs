//! notion-press test utilities.
//!
//! Builders for Notion API JSON (blocks, list envelopes, pages, oEmbed
//! bodies) and assertion helpers for compiled markup.

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value as JsonValue, json};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A fresh block id in Notion's dashed form.
pub fn next_id() -> String {
    let n = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("00000000-0000-4000-8000-{n:012x}")
}

/// A plain rich text run.
pub fn text(content: &str) -> JsonValue {
    annotated(content, json!({}))
}

/// A rich text run with annotation overrides, e.g. `json!({"bold": true})`.
pub fn annotated(content: &str, overrides: JsonValue) -> JsonValue {
    let mut annotations = json!({
        "bold": false,
        "italic": false,
        "strikethrough": false,
        "underline": false,
        "code": false,
        "color": "default"
    });
    if let (Some(base), Some(extra)) = (annotations.as_object_mut(), overrides.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    json!({
        "type": "text",
        "text": { "content": content, "link": null },
        "annotations": annotations,
        "plain_text": content,
        "href": null
    })
}

/// A rich text run linking to `href`.
pub fn link(content: &str, href: &str) -> JsonValue {
    let mut run = text(content);
    run["href"] = json!(href);
    run["text"]["link"] = json!({ "url": href });
    run
}

/// A test block builder.
#[derive(Debug, Clone)]
pub struct TestBlock {
    pub id: String,
    pub kind: String,
    pub has_children: bool,
    pub payload: JsonValue,
}

impl TestBlock {
    /// A block of any type with the given payload.
    pub fn new(kind: &str, payload: JsonValue) -> Self {
        Self {
            id: next_id(),
            kind: kind.to_string(),
            has_children: false,
            payload,
        }
    }

    /// Set a custom ID.
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    /// Flag the block as having children.
    pub fn with_children(mut self) -> Self {
        self.has_children = true;
        self
    }

    /// Set a payload field.
    pub fn with_field(mut self, name: &str, value: JsonValue) -> Self {
        if let Some(obj) = self.payload.as_object_mut() {
            obj.insert(name.to_string(), value);
        }
        self
    }

    /// Replace the rich text runs.
    pub fn with_rich_text(self, runs: Vec<JsonValue>) -> Self {
        self.with_field("rich_text", JsonValue::Array(runs))
    }

    /// Set a caption from plain text.
    pub fn with_caption(self, caption: &str) -> Self {
        self.with_field("caption", json!([text(caption)]))
    }

    /// Drop a payload field.
    pub fn without_field(mut self, name: &str) -> Self {
        if let Some(obj) = self.payload.as_object_mut() {
            obj.remove(name);
        }
        self
    }

    /// The block as the API returns it.
    pub fn to_json(&self) -> JsonValue {
        let mut value = json!({
            "object": "block",
            "id": self.id,
            "created_time": "2024-01-01T00:00:00.000Z",
            "last_edited_time": "2024-01-01T00:00:00.000Z",
            "has_children": self.has_children,
            "archived": false,
            "type": self.kind,
        });
        value[self.kind.as_str()] = self.payload.clone();
        value
    }
}

fn text_block(kind: &str, content: &str) -> TestBlock {
    TestBlock::new(kind, json!({ "rich_text": [text(content)], "color": "default" }))
}

pub fn paragraph(content: &str) -> TestBlock {
    text_block("paragraph", content)
}

/// `heading_1` … `heading_3`.
pub fn heading(level: u8, content: &str) -> TestBlock {
    text_block(&format!("heading_{level}"), content).with_field("is_toggleable", json!(false))
}

pub fn bulleted(content: &str) -> TestBlock {
    text_block("bulleted_list_item", content)
}

pub fn numbered(content: &str) -> TestBlock {
    text_block("numbered_list_item", content)
}

fn external_media(kind: &str, url: &str) -> TestBlock {
    TestBlock::new(
        kind,
        json!({ "caption": [], "type": "external", "external": { "url": url } }),
    )
}

fn hosted_media(kind: &str, url: &str) -> TestBlock {
    TestBlock::new(
        kind,
        json!({
            "caption": [],
            "type": "file",
            "file": { "url": url, "expiry_time": "2024-01-01T01:00:00.000Z" }
        }),
    )
}

pub fn image_external(url: &str) -> TestBlock {
    external_media("image", url)
}

pub fn image_hosted(url: &str) -> TestBlock {
    hosted_media("image", url)
}

pub fn file_external(url: &str, name: &str) -> TestBlock {
    external_media("file", url).with_field("name", json!(name))
}

pub fn file_hosted(url: &str) -> TestBlock {
    hosted_media("file", url)
}

pub fn video_external(url: &str) -> TestBlock {
    external_media("video", url)
}

pub fn video_hosted(url: &str) -> TestBlock {
    hosted_media("video", url)
}

pub fn bookmark(url: &str) -> TestBlock {
    TestBlock::new("bookmark", json!({ "caption": [], "url": url }))
}

/// A `column_list`; its columns are served as its children.
pub fn column_list() -> TestBlock {
    TestBlock::new("column_list", json!({})).with_children()
}

pub fn column() -> TestBlock {
    TestBlock::new("column", json!({})).with_children()
}

/// A block of a type with no renderer.
pub fn unsupported(kind: &str) -> TestBlock {
    TestBlock::new(kind, json!({}))
}

/// A `GET /v1/blocks/{id}/children` body.
pub fn list_response(blocks: &[TestBlock]) -> JsonValue {
    json!({
        "object": "list",
        "results": blocks.iter().map(TestBlock::to_json).collect::<Vec<_>>(),
        "next_cursor": null,
        "has_more": false,
        "type": "block",
        "block": {}
    })
}

/// A children body that claims further pages.
pub fn list_response_with_more(blocks: &[TestBlock], next_cursor: &str) -> JsonValue {
    let mut body = list_response(blocks);
    body["has_more"] = json!(true);
    body["next_cursor"] = json!(next_cursor);
    body
}

/// A page object with a `Name` title property.
pub fn page(id: &str, title: &str) -> JsonValue {
    json!({
        "object": "page",
        "id": id,
        "created_time": "2024-01-01T00:00:00.000Z",
        "last_edited_time": "2024-02-01T12:00:00.000Z",
        "archived": false,
        "url": format!("https://www.notion.so/{}", id.replace('-', "")),
        "properties": {
            "Name": { "id": "title", "type": "title", "title": [text(title)] }
        }
    })
}

/// A `POST /v1/databases/{id}/query` body.
pub fn page_list(pages: Vec<JsonValue>) -> JsonValue {
    json!({
        "object": "list",
        "results": pages,
        "next_cursor": null,
        "has_more": false,
        "type": "page_database",
        "page_database": {}
    })
}

/// An oEmbed response for a video.
pub fn oembed_video(provider: &str, width: u32, height: u32) -> JsonValue {
    json!({
        "type": "video",
        "version": "1.0",
        "title": "A video",
        "provider_name": provider,
        "provider_url": format!("https://www.{}.com/", provider.to_lowercase()),
        "width": width,
        "height": height,
        "thumbnail_url": "https://img.test/thumb.jpg",
        "thumbnail_width": 480,
        "thumbnail_height": 360,
        "html": "<iframe></iframe>"
    })
}

/// Assertion helpers for compiled markup.
pub mod assert {
    /// Assert that a string contains a substring.
    pub fn contains(haystack: &str, needle: &str) {
        assert!(
            haystack.contains(needle),
            "Expected string to contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a string does not contain a substring.
    pub fn not_contains(haystack: &str, needle: &str) {
        assert!(
            !haystack.contains(needle),
            "Expected string to NOT contain '{needle}'\nActual: {haystack}"
        );
    }

    /// Assert that a substring occurs exactly `expected` times.
    pub fn occurs(haystack: &str, needle: &str, expected: usize) {
        let actual = haystack.matches(needle).count();
        assert_eq!(
            actual, expected,
            "Expected '{needle}' {expected} time(s), found {actual}\nActual: {haystack}"
        );
    }

    /// Assert that the needles appear in the given order.
    pub fn in_order(haystack: &str, needles: &[&str]) {
        let mut from = 0;
        for needle in needles {
            match haystack[from..].find(needle) {
                Some(pos) => from += pos + needle.len(),
                None => panic!("Expected '{needle}' after offset {from}\nActual: {haystack}"),
            }
        }
    }
}
