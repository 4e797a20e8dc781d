//! Inline rendering of Notion rich text runs.
//!
//! Annotation elements nest in a fixed order, outermost first:
//! `<strong>`, `<em>`, `<s>`, `<u>`, `<code>`. A link wraps everything, and a
//! non-default color sits between the link and the annotations.

use super::markup::html_escape;
use crate::notion::{Annotations, DEFAULT_COLOR, RichTextRun};

/// Render a sequence of runs.
///
/// With `plain_text_only` the annotations, colors and links are ignored and
/// only the escaped text is emitted.
pub fn render_rich_text(runs: &[RichTextRun], plain_text_only: bool) -> String {
    let mut html = String::new();
    for run in runs {
        let text = html_escape(&run.plain_text);
        if plain_text_only {
            html.push_str(&text);
            continue;
        }

        let mut formatted = render_annotations(&text, &run.annotations);
        if let Some(class) = color_class(&run.annotations.color) {
            formatted = format!("<mark class=\"has-inline-color {class}\">{formatted}</mark>");
        }
        if let Some(href) = run.href.as_deref().filter(|h| !h.is_empty()) {
            formatted = format!("<a href=\"{}\">{formatted}</a>", html_escape(href));
        }
        html.push_str(&formatted);
    }
    html
}

/// Plain text of a run sequence, unescaped.
pub fn plain_text(runs: &[RichTextRun]) -> String {
    runs.iter().map(|r| r.plain_text.as_str()).collect()
}

/// Wrap already-escaped `text` in the elements its annotations call for.
pub fn render_annotations(text: &str, annotations: &Annotations) -> String {
    let tags: Vec<&str> = [
        (annotations.bold, "strong"),
        (annotations.italic, "em"),
        (annotations.strikethrough, "s"),
        (annotations.underline, "u"),
        (annotations.code, "code"),
    ]
    .into_iter()
    .filter_map(|(on, tag)| on.then_some(tag))
    .collect();

    let mut html = String::with_capacity(text.len() + tags.len() * 16);
    for tag in &tags {
        html.push_str(&format!("<{tag}>"));
    }
    html.push_str(text);
    for tag in tags.iter().rev() {
        html.push_str(&format!("</{tag}>"));
    }
    html
}

/// Editor color class for a Notion color tag (`red`, `blue_background`, …).
fn color_class(color: &str) -> Option<String> {
    if color.is_empty() || color == DEFAULT_COLOR {
        return None;
    }
    let slug: String = color
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    match slug.strip_suffix("_background") {
        Some(base) if !base.is_empty() => Some(format!("has-{base}-background-color")),
        Some(_) => None,
        None if slug.is_empty() => None,
        None => Some(format!("has-{slug}-color")),
    }
}
