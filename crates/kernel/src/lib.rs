//! Notion to WordPress block markup.
//!
//! This library exposes the block client, tree resolver, embed lookup and
//! markup compiler. The command-line entry point is the `notion-press`
//! binary.

pub mod cache;
pub mod config;
pub mod content;
pub mod embed;
pub mod error;
pub mod notion;
pub mod state;
