//! HTML auto-escaping

use std::borrow::Cow;

use crate::value::Value;

/// Replace `& < > " '` with their HTML entities
///
/// `&` goes first so the entities introduced afterwards are not escaped twice.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(&['&', '<', '>', '"', '\''][..]) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(
        s.replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;")
            .replace('"', "&quot;")
            .replace('\'', "&#39;"),
    )
}

/// Text of a value for output; safe values pass through unchanged
pub fn escape_value(value: &Value) -> String {
    match value {
        Value::Safe(s) => s.clone(),
        other => escape(&other.to_string()).into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_all_five() {
        assert_eq!(escape("<b>&\"'"), "&lt;b&gt;&amp;&quot;&#39;");
    }

    #[test]
    fn test_escape_does_not_double_escape_its_own_entities() {
        assert_eq!(escape("&lt;"), "&amp;lt;");
        assert_eq!(escape("<"), "&lt;");
    }

    #[test]
    fn test_plain_text_is_borrowed() {
        assert!(matches!(escape("plain"), Cow::Borrowed("plain")));
    }

    #[test]
    fn test_safe_passes_through() {
        assert_eq!(escape_value(&Value::safe("<i>")), "<i>");
        assert_eq!(escape_value(&Value::from("<i>")), "&lt;i&gt;");
        assert_eq!(escape_value(&Value::Float(2.0)), "2.0");
    }
}
