//! Escaping for values interpolated into the embedded pages.
//!
//! - `escape()`, `escape_attr()` - HTML entity escaping
//! - `script_json()` - JSON literal safe inside a `<script>` element

use std::borrow::Cow;

use serde::Serialize;

/// Characters that require HTML escaping.
const ESCAPE_CHARS: [char; 5] = ['<', '>', '&', '"', '\''];

/// Get the HTML entity for a special character.
#[inline]
fn escape_char(c: char) -> Option<&'static str> {
    match c {
        '<' => Some("&lt;"),
        '>' => Some("&gt;"),
        '&' => Some("&amp;"),
        '"' => Some("&quot;"),
        '\'' => Some("&#39;"),
        _ => None,
    }
}

/// Escape HTML special characters in text content.
///
/// Uses `Cow` to avoid allocation when no escaping is needed.
#[inline]
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(ESCAPE_CHARS) {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match escape_char(c) {
            Some(entity) => result.push_str(entity),
            None => result.push(c),
        }
    }
    Cow::Owned(result)
}

/// Escape HTML attribute values (same set as [`escape`]).
#[inline]
pub fn escape_attr(s: &str) -> Cow<'_, str> {
    escape(s)
}

/// Serialize `value` as a JSON literal that cannot close its `<script>`.
///
/// `<`, `>` and `&` become `\u` escapes, as do the line separators JSON
/// allows but older JavaScript parsers reject.
pub fn script_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let json = serde_json::to_string(value)?;
    if !json.contains(['<', '>', '&', '\u{2028}', '\u{2029}']) {
        return Ok(json);
    }

    let mut out = String::with_capacity(json.len() + 16);
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_plain() {
        assert_eq!(escape("github.com/goplus/FlappyCalf"), "github.com/goplus/FlappyCalf");
        assert!(matches!(escape("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_escape_special_chars() {
        assert_eq!(escape("<script>"), "&lt;script&gt;");
        assert_eq!(escape("a & b"), "a &amp; b");
        assert_eq!(escape_attr("a\"b&c"), "a&quot;b&amp;c");
        assert_eq!(escape_attr("it's"), "it&#39;s");
    }

    #[test]
    fn test_script_json_plain() {
        let argv = ["github.com/goplus/FlappyCalf"];
        assert_eq!(
            script_json(&argv).unwrap(),
            r#"["github.com/goplus/FlappyCalf"]"#
        );
    }

    #[test]
    fn test_script_json_cannot_close_script() {
        let json = script_json(&["</script><script>alert(1)</script>"]).unwrap();
        assert!(!json.contains("</script>"));
        assert!(json.starts_with(r#"["\u003c/script\u003e"#));
    }

    #[test]
    fn test_script_json_quotes_escaped() {
        let json = script_json(&["a\"b"]).unwrap();
        assert_eq!(json, r#"["a\"b"]"#);
    }
}
