//! Single-pass compiler from Notion block sequences to WordPress block markup.
//!
//! Blocks are visited left to right. Consecutive list items of the same kind
//! are collected into a pending group that is flushed as one `wp:list` when
//! the kind changes or the sequence ends. Container blocks resolve their
//! children lazily through [`RenderContext`] and compile them one level
//! deeper; compilation past the depth cap yields nothing, and so does a block
//! whose id already appears among its own ancestors.

use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use super::block_render::render_list;
use super::block_types::{BlockRenderer, ListStyle, RendererRegistry};
use crate::embed::EmbedResolver;
use crate::notion::{Block, BlockSource, DEFAULT_MAX_DEPTH, TreeResolver};

/// Compiles block sequences into markup.
#[derive(Clone)]
pub struct MarkupCompiler {
    source: Arc<dyn BlockSource>,
    resolver: TreeResolver,
    embeds: Arc<dyn EmbedResolver>,
    registry: RendererRegistry,
    max_depth: usize,
}

impl MarkupCompiler {
    /// Create a compiler with the built-in renderers.
    pub fn new(source: Arc<dyn BlockSource>, embeds: Arc<dyn EmbedResolver>) -> Self {
        Self {
            resolver: TreeResolver::new(Arc::clone(&source)),
            source,
            embeds,
            registry: RendererRegistry::with_builtin_renderers(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Cap both child resolution and nested compilation at `max_depth`.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.resolver = self.resolver.with_max_depth(max_depth);
        self.max_depth = max_depth;
        self
    }

    /// Replace the renderer registry.
    pub fn with_registry(mut self, registry: RendererRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register (or replace) the renderer for a block type tag.
    pub fn register(&mut self, tag: impl Into<String>, renderer: Arc<dyn BlockRenderer>) {
        self.registry.register(tag, renderer);
    }

    pub fn registry(&self) -> &RendererRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &TreeResolver {
        &self.resolver
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Compile an ordered sibling sequence. Never fails; blocks that cannot
    /// be rendered contribute nothing.
    pub async fn compile(&self, blocks: &[Block]) -> String {
        self.compile_at(blocks, 0, &[]).await
    }

    /// Fetch the children of `root_id` and compile them.
    ///
    /// Returns an empty string when the root has no children or could not
    /// be fetched.
    pub async fn compile_from_root(&self, root_id: &str) -> String {
        let blocks = self.source.fetch_children(root_id).await;
        if blocks.is_empty() {
            debug!(root_id = %root_id, "root has no children; nothing to compile");
            return String::new();
        }
        self.compile(&blocks).await
    }

    fn compile_at<'a>(
        &'a self,
        blocks: &'a [Block],
        depth: usize,
        ancestors: &'a [String],
    ) -> Pin<Box<dyn Future<Output = String> + Send + 'a>> {
        Box::pin(async move {
            if depth > self.max_depth {
                warn!(
                    depth,
                    max_depth = self.max_depth,
                    count = blocks.len(),
                    "nested compilation exceeds depth cap; omitting"
                );
                return String::new();
            }

            let mut html = String::new();
            let mut group: Option<(ListStyle, String)> = None;

            for block in blocks {
                let segment = self.render_block(block, depth, ancestors).await;

                let Some(style) = block.kind.list_style() else {
                    flush_group(&mut html, group.take());
                    html.push_str(&segment);
                    continue;
                };

                let continues = matches!(&group, Some((current, _)) if *current == style);
                if !continues {
                    flush_group(&mut html, group.take());
                    group = Some((style, String::new()));
                }
                if let Some((_, items)) = group.as_mut() {
                    items.push_str(&segment);
                }
            }

            flush_group(&mut html, group.take());
            html
        })
    }

    async fn render_block(&self, block: &Block, depth: usize, ancestors: &[String]) -> String {
        if ancestors.contains(&block.id) {
            warn!(block_id = %block.id, depth, "block contains itself; omitting");
            return String::new();
        }
        let Some(renderer) = self.registry.get(&block.kind) else {
            debug!(block_id = %block.id, kind = %block.kind, "no renderer for block kind; skipping");
            return String::new();
        };

        let mut path = Vec::with_capacity(ancestors.len() + 1);
        path.extend_from_slice(ancestors);
        path.push(block.id.clone());
        let cx = RenderContext {
            compiler: self,
            depth,
            path: &path,
        };
        match renderer.render(block, &cx).await {
            Ok(html) => html,
            Err(e) => {
                warn!(
                    error = %e,
                    block_id = %block.id,
                    kind = %block.kind,
                    "failed to render block; emitting empty segment"
                );
                String::new()
            }
        }
    }
}

fn flush_group(html: &mut String, group: Option<(ListStyle, String)>) {
    if let Some((style, items)) = group {
        if !items.is_empty() {
            html.push_str(&render_list(style, &items));
        }
    }
}

impl std::fmt::Debug for MarkupCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkupCompiler")
            .field("registry", &self.registry)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

/// What a renderer can reach while rendering one block.
pub struct RenderContext<'a> {
    compiler: &'a MarkupCompiler,
    depth: usize,
    /// Ids from the top-level block down to the one being rendered.
    path: &'a [String],
}

impl RenderContext<'_> {
    pub fn embeds(&self) -> &dyn EmbedResolver {
        self.compiler.embeds.as_ref()
    }

    /// The block's children: already attached ones as-is, otherwise resolved
    /// from the remote source when the block reports having any.
    pub async fn children<'b>(&self, block: &'b Block) -> Cow<'b, [Block]> {
        if !block.has_children || !block.children.is_empty() || self.is_ancestor(block) {
            return Cow::Borrowed(&block.children);
        }
        Cow::Owned(
            self.compiler
                .resolver
                .resolve_one_within(&block.id, self.path)
                .await,
        )
    }

    /// Like [`RenderContext::children`], but only one level deep: remote
    /// children come back without their own subtrees.
    pub async fn direct_children<'b>(&self, block: &'b Block) -> Cow<'b, [Block]> {
        if !block.has_children || !block.children.is_empty() || self.is_ancestor(block) {
            return Cow::Borrowed(&block.children);
        }
        if self.depth >= self.compiler.max_depth {
            warn!(block_id = %block.id, depth = self.depth, "children past depth cap; not fetching");
            return Cow::Borrowed(&block.children);
        }
        Cow::Owned(self.compiler.source.fetch_children(&block.id).await)
    }

    /// Compile a nested sequence one level below the current block.
    pub async fn compile(&self, blocks: &[Block]) -> String {
        self.compiler
            .compile_at(blocks, self.depth + 1, self.path)
            .await
    }

    /// Whether `block` is an ancestor of the block being rendered.
    fn is_ancestor(&self, block: &Block) -> bool {
        match self.path.split_last() {
            Some((current, ancestors)) => *current != block.id && ancestors.contains(&block.id),
            None => false,
        }
    }
}

#[cfg(test)]
// Tests are allowed to use unwrap/expect freely.
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::content::block_types::{RenderError, RenderResult};
    use crate::embed::{DisabledEmbeds, EmbedError, EmbedMetadata, EmbedResult};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapSource {
        children: HashMap<String, Vec<Value>>,
        calls: Mutex<Vec<String>>,
    }

    impl MapSource {
        fn with(mut self, parent: &str, kids: Vec<Value>) -> Self {
            self.children.insert(parent.to_string(), kids);
            self
        }
    }

    #[async_trait]
    impl BlockSource for MapSource {
        async fn fetch_children(&self, block_id: &str) -> Vec<Block> {
            self.calls.lock().unwrap().push(block_id.to_string());
            self.children
                .get(block_id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .map(|v| Block::from_value(v).unwrap())
                .collect()
        }
    }

    struct TransportFailure;

    #[async_trait]
    impl EmbedResolver for TransportFailure {
        async fn lookup(&self, url: &str) -> EmbedResult<EmbedMetadata> {
            Err(EmbedError::Status {
                status: 502,
                url: url.to_string(),
            })
        }
    }

    fn compiler() -> MarkupCompiler {
        MarkupCompiler::new(Arc::new(MapSource::default()), Arc::new(DisabledEmbeds))
    }

    fn text(id: &str, kind: &str, plain: &str) -> Value {
        json!({ "id": id, "type": kind, "has_children": false,
                kind: { "rich_text": [{ "plain_text": plain }] } })
    }

    fn blocks(values: Vec<Value>) -> Vec<Block> {
        values.into_iter().map(|v| Block::from_value(v).unwrap()).collect()
    }

    #[tokio::test]
    async fn heading_one_carries_level_attribute() {
        let html = compiler()
            .compile(&blocks(vec![text("h", "heading_1", "Hello")]))
            .await;
        assert_eq!(
            html,
            "<!-- wp:heading {\"level\":1} -->\r\n<h1 class=\"wp-block-heading\">Hello</h1>\r\n<!-- /wp:heading -->\r\n"
        );
    }

    #[tokio::test]
    async fn bold_paragraph() {
        let p = json!({ "id": "p", "type": "paragraph", "paragraph": { "rich_text": [
            { "plain_text": "World", "annotations": { "bold": true } }
        ] } });
        let html = compiler().compile(&blocks(vec![p])).await;
        assert!(html.contains("<p><strong>World</strong></p>"));
    }

    #[tokio::test]
    async fn consecutive_list_items_share_one_list() {
        let html = compiler()
            .compile(&blocks(vec![
                text("a", "bulleted_list_item", "one"),
                text("b", "bulleted_list_item", "two"),
                text("c", "bulleted_list_item", "three"),
            ]))
            .await;
        assert_eq!(html.matches("<ul>").count(), 1);
        assert_eq!(html.matches("<li>").count(), 3);
        let one = html.find("one").unwrap();
        let two = html.find("two").unwrap();
        let three = html.find("three").unwrap();
        assert!(one < two && two < three);
    }

    #[tokio::test]
    async fn kind_change_closes_the_group() {
        let html = compiler()
            .compile(&blocks(vec![
                text("a", "bulleted_list_item", "a"),
                text("b", "numbered_list_item", "b"),
                text("c", "numbered_list_item", "c"),
                text("p", "paragraph", "between"),
                text("d", "bulleted_list_item", "d"),
            ]))
            .await;
        assert_eq!(html.matches("<ul>").count(), 2);
        assert_eq!(html.matches("<ol>").count(), 1);
        let ol_end = html.find("</ol>").unwrap();
        let para = html.find("<p>between</p>").unwrap();
        assert!(ol_end < para);
        assert!(html.ends_with("</ul>\r\n<!-- /wp:list -->\r\n"));
    }

    #[tokio::test]
    async fn failing_bookmark_embed_renders_empty() {
        let c = MarkupCompiler::new(Arc::new(MapSource::default()), Arc::new(TransportFailure));
        let bookmark = json!({ "id": "b", "type": "bookmark", "bookmark": { "url": "https://example.com" } });
        assert_eq!(c.compile(&blocks(vec![bookmark])).await, "");
    }

    #[tokio::test]
    async fn missing_rich_text_blanks_only_that_block() {
        let html = compiler()
            .compile(&blocks(vec![
                text("a", "paragraph", "before"),
                json!({ "id": "bad", "type": "paragraph", "paragraph": {} }),
                text("c", "paragraph", "after"),
            ]))
            .await;
        assert_eq!(
            html,
            "<!-- wp:paragraph -->\r\n<p>before</p>\r\n<!-- /wp:paragraph -->\r\n\
             <!-- wp:paragraph -->\r\n<p>after</p>\r\n<!-- /wp:paragraph -->\r\n"
        );
    }

    #[tokio::test]
    async fn unknown_kinds_are_skipped() {
        let html = compiler()
            .compile(&blocks(vec![
                json!({ "id": "t", "type": "table", "table": { "table_width": 2 } }),
                text("p", "paragraph", "kept"),
            ]))
            .await;
        assert_eq!(html.matches("wp:paragraph").count(), 2);
        assert!(!html.contains("table"));
    }

    #[tokio::test]
    async fn compile_is_idempotent() {
        let input = blocks(vec![
            text("h", "heading_2", "Title"),
            text("a", "numbered_list_item", "x"),
            text("p", "paragraph", "y"),
        ]);
        let c = compiler();
        assert_eq!(c.compile(&input).await, c.compile(&input).await);
    }

    #[tokio::test]
    async fn compile_from_root_with_no_children_is_empty() {
        let source = Arc::new(MapSource::default());
        let c = MarkupCompiler::new(source.clone(), Arc::new(DisabledEmbeds));
        assert_eq!(c.compile_from_root("empty").await, "");
        assert_eq!(*source.calls.lock().unwrap(), vec!["empty".to_string()]);
    }

    #[tokio::test]
    async fn compile_from_root_fetches_then_compiles() {
        let source = Arc::new(MapSource::default().with("root", vec![text("p", "paragraph", "hi")]));
        let c = MarkupCompiler::new(source, Arc::new(DisabledEmbeds));
        assert_eq!(
            c.compile_from_root("root").await,
            "<!-- wp:paragraph -->\r\n<p>hi</p>\r\n<!-- /wp:paragraph -->\r\n"
        );
    }

    #[tokio::test]
    async fn nested_columns_past_depth_cap_are_omitted() {
        let source = Arc::new(
            MapSource::default()
                .with("outer", vec![json!({ "id": "inner", "type": "column_list", "has_children": true, "column_list": {} })])
                .with("inner", vec![text("p", "paragraph", "deep")]),
        );
        let c = MarkupCompiler::new(source, Arc::new(DisabledEmbeds)).with_max_depth(1);
        let outer = blocks(vec![json!({ "id": "outer", "type": "column_list", "has_children": true, "column_list": {} })]);

        let html = c.compile(&outer).await;
        assert!(html.starts_with("<!-- wp:columns -->\r\n"));
        assert!(!html.contains("deep"));
    }

    fn column_list(id: &str) -> Value {
        json!({ "id": id, "type": "column_list", "has_children": true, "column_list": {} })
    }

    #[tokio::test]
    async fn self_containing_columns_are_fetched_once() {
        // "x" lists three copies of itself as its children.
        let source = Arc::new(
            MapSource::default().with("x", vec![column_list("x"), column_list("x"), column_list("x")]),
        );
        let c = MarkupCompiler::new(source.clone(), Arc::new(DisabledEmbeds));

        let html = c.compile(&blocks(vec![column_list("x")])).await;
        assert_eq!(html.matches("<div class=\"wp-block-column\">\r\n</div>").count(), 3);
        assert_eq!(html.matches("wp-block-columns").count(), 1);
        assert_eq!(*source.calls.lock().unwrap(), vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn mutually_nested_columns_stop_at_the_repeat() {
        let source = Arc::new(
            MapSource::default()
                .with("a", vec![column_list("b"), column_list("b")])
                .with("b", vec![column_list("a"), text("p", "paragraph", "leaf")]),
        );
        let c = MarkupCompiler::new(source.clone(), Arc::new(DisabledEmbeds));

        let html = c.compile(&blocks(vec![column_list("a")])).await;
        assert_eq!(html.matches("<p>leaf</p>").count(), 2);
        // The first walk from "a" leaves the second "b" unexpanded; resolving
        // it later must not descend into its ancestor "a" again.
        let calls = source.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["a", "b", "b"]);
    }

    #[tokio::test]
    async fn list_item_children_are_fetched_one_level_deep() {
        let item = |id: &str, has_children: bool| {
            json!({ "id": id, "type": "bulleted_list_item", "has_children": has_children,
                    "bulleted_list_item": { "rich_text": [{ "plain_text": id }] } })
        };
        let source = Arc::new(
            MapSource::default()
                .with("top", vec![item("child", true)])
                .with("child", vec![item("grandchild", false)]),
        );
        let c = MarkupCompiler::new(source.clone(), Arc::new(DisabledEmbeds));

        let html = c.compile(&blocks(vec![item("top", true)])).await;
        assert!(html.contains("<li>child</li>"));
        assert!(!html.contains("grandchild"));
        assert_eq!(*source.calls.lock().unwrap(), vec!["top".to_string()]);
    }

    #[tokio::test]
    async fn empty_registry_renders_nothing() {
        let c = compiler().with_registry(RendererRegistry::new());
        let html = c
            .compile(&blocks(vec![
                text("h", "heading_1", "Hello"),
                text("a", "bulleted_list_item", "one"),
            ]))
            .await;
        assert_eq!(html, "");
        assert!(c.registry().is_empty());
    }

    struct Shout;

    #[async_trait]
    impl BlockRenderer for Shout {
        async fn render(&self, block: &Block, _cx: &RenderContext<'_>) -> RenderResult<String> {
            let text = block
                .field("text")
                .and_then(Value::as_str)
                .ok_or_else(|| RenderError::MissingField {
                    block_id: block.id.clone(),
                    field: "text",
                })?;
            Ok(text.to_uppercase())
        }
    }

    #[tokio::test]
    async fn registered_renderers_handle_new_kinds() {
        let mut c = compiler();
        c.register("callout", Arc::new(Shout));
        let html = c
            .compile(&blocks(vec![
                json!({ "id": "c", "type": "callout", "callout": { "text": "hey" } }),
                json!({ "id": "d", "type": "callout", "callout": {} }),
            ]))
            .await;
        assert_eq!(html, "HEY");
        assert!(c.registry().contains("callout"));
    }
}
