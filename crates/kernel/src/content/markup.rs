//! Block-comment delimiters and escaping for WordPress block markup.

use serde::Serialize;

/// Line ending used between delimiters and inner markup.
pub const CRLF: &str = "\r\n";

/// Escape text for use in HTML content or a quoted attribute.
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Serialize block attributes for an opening delimiter.
pub fn attrs_json<T: Serialize>(attrs: &T) -> Option<String> {
    serde_json::to_string(attrs).ok()
}

/// Wrap `inner` in `<!-- wp:NAME ATTRS -->` / `<!-- /wp:NAME -->`.
///
/// Both delimiters sit on their own line and the segment ends with CRLF.
pub fn delimited(name: &str, attrs: Option<String>, inner: &str) -> String {
    let open = match attrs {
        Some(attrs) => format!("<!-- wp:{name} {attrs} -->"),
        None => format!("<!-- wp:{name} -->"),
    };
    format!("{open}{CRLF}{inner}{CRLF}<!-- /wp:{name} -->{CRLF}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Level {
        level: u8,
    }

    #[test]
    fn html_escape_special_chars() {
        assert_eq!(html_escape("<>&\"'"), "&lt;&gt;&amp;&quot;&#x27;");
    }

    #[test]
    fn delimited_without_attrs() {
        assert_eq!(
            delimited("paragraph", None, "<p>x</p>"),
            "<!-- wp:paragraph -->\r\n<p>x</p>\r\n<!-- /wp:paragraph -->\r\n"
        );
    }

    #[test]
    fn delimited_with_attrs() {
        assert_eq!(
            delimited("heading", attrs_json(&Level { level: 1 }), "<h1>x</h1>"),
            "<!-- wp:heading {\"level\":1} -->\r\n<h1>x</h1>\r\n<!-- /wp:heading -->\r\n"
        );
    }
}
