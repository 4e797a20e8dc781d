//! Materializes block trees of unknown depth.
//!
//! The walk is an explicit stack over an arena of nodes rather than
//! recursive calls, so a malformed `has_children` chain can neither blow the
//! stack nor loop forever: expansion stops at `max_depth` and a block id is
//! expanded at most once per walk.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::BlockSource;
use super::models::Block;

/// Default cap on nesting below the starting blocks.
pub const DEFAULT_MAX_DEPTH: usize = 16;

/// Outcome of a resolution walk.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Resolved blocks with `children` attached, in original order.
    pub blocks: Vec<Block>,
    /// At least one block flagged `has_children` was left unexpanded
    /// because of the depth cap.
    pub truncated: bool,
    /// Number of children requests issued.
    pub fetches: usize,
}

struct Node {
    block: Option<Block>,
    parent: Option<usize>,
    depth: usize,
    /// Resolved children, collected in reverse order during assembly.
    children: Vec<Block>,
}

/// Attaches remote children to every block that reports having them.
#[derive(Clone)]
pub struct TreeResolver {
    source: Arc<dyn BlockSource>,
    max_depth: usize,
}

impl TreeResolver {
    pub fn new(source: Arc<dyn BlockSource>) -> Self {
        Self {
            source,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Resolve the subtrees of `blocks`.
    pub async fn resolve(&self, blocks: Vec<Block>) -> Vec<Block> {
        self.walk(blocks, 0, HashSet::new()).await.blocks
    }

    /// Fetch a container's children and resolve their subtrees.
    pub async fn resolve_one(&self, block_id: &str) -> Vec<Block> {
        self.resolve_one_report(block_id).await.blocks
    }

    /// [`TreeResolver::resolve_one`] that treats `ancestors` as already
    /// expanded, so a subtree that points back up the tree is not walked again.
    pub async fn resolve_one_within(&self, block_id: &str, ancestors: &[String]) -> Vec<Block> {
        self.resolve_under(block_id, ancestors).await.blocks
    }

    /// [`TreeResolver::resolve_one`] with truncation and fetch counts.
    pub async fn resolve_one_report(&self, block_id: &str) -> Resolution {
        self.resolve_under(block_id, &[]).await
    }

    async fn resolve_under(&self, block_id: &str, ancestors: &[String]) -> Resolution {
        if self.max_depth == 0 {
            warn!(block_id = %block_id, "resolution depth cap is zero; not expanding");
            return Resolution {
                truncated: true,
                ..Resolution::default()
            };
        }

        let roots = self.source.fetch_children(block_id).await;
        let mut expanded: HashSet<String> = ancestors.iter().cloned().collect();
        expanded.insert(block_id.to_string());

        let mut resolution = self.walk(roots, 1, expanded).await;
        resolution.fetches += 1;
        resolution
    }

    /// [`TreeResolver::resolve`] with truncation and fetch counts.
    pub async fn resolve_report(&self, blocks: Vec<Block>) -> Resolution {
        self.walk(blocks, 0, HashSet::new()).await
    }

    async fn walk(
        &self,
        roots: Vec<Block>,
        start_depth: usize,
        mut expanded: HashSet<String>,
    ) -> Resolution {
        let mut arena: Vec<Node> = roots
            .into_iter()
            .map(|block| Node {
                block: Some(block),
                parent: None,
                depth: start_depth,
                children: Vec::new(),
            })
            .collect();
        let mut stack: Vec<usize> = (0..arena.len()).rev().collect();
        let mut truncated = false;
        let mut fetches = 0;

        while let Some(idx) = stack.pop() {
            let node = &arena[idx];
            let Some(block) = node.block.as_ref() else {
                continue;
            };
            if !block.has_children || !block.children.is_empty() {
                continue;
            }
            if node.depth >= self.max_depth {
                warn!(
                    block_id = %block.id,
                    depth = node.depth,
                    max_depth = self.max_depth,
                    "block tree exceeds depth cap; truncating"
                );
                truncated = true;
                continue;
            }
            if !expanded.insert(block.id.clone()) {
                warn!(block_id = %block.id, "block already expanded in this tree; skipping");
                continue;
            }

            let id = block.id.clone();
            let depth = node.depth + 1;
            let children = self.source.fetch_children(&id).await;
            fetches += 1;
            debug!(block_id = %id, count = children.len(), depth, "resolved children");

            let first = arena.len();
            arena.extend(children.into_iter().map(|child| Node {
                block: Some(child),
                parent: Some(idx),
                depth,
                children: Vec::new(),
            }));
            stack.extend((first..arena.len()).rev());
        }

        Resolution {
            blocks: assemble(arena),
            truncated,
            fetches,
        }
    }
}

/// Fold the arena back into a tree. Children always sit at higher indices
/// than their parent, so a reverse sweep finishes every child before its
/// parent is moved.
fn assemble(mut arena: Vec<Node>) -> Vec<Block> {
    let mut roots = Vec::new();

    for idx in (0..arena.len()).rev() {
        let Some(mut block) = arena[idx].block.take() else {
            continue;
        };
        let mut children = std::mem::take(&mut arena[idx].children);
        if !children.is_empty() {
            children.reverse();
            block.children = children;
        }

        match arena[idx].parent {
            Some(parent) => arena[parent].children.push(block),
            None => roots.push(block),
        }
    }

    roots.reverse();
    roots
}

impl std::fmt::Debug for TreeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeResolver")
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
