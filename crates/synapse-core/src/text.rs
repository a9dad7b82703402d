use serde::Serialize;

/// Truncate `text` to at most `max_chars` characters, appending an ellipsis
/// when anything was cut. Never splits a UTF-8 code point.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Serialize `value` to compact JSON and truncate the result.
///
/// Plain JSON strings are rendered without their surrounding quotes.
/// Serialization failures degrade to a placeholder instead of an error.
pub fn truncate_json<T: Serialize + ?Sized>(value: &T, max_chars: usize) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => truncate(&s, max_chars),
        Ok(other) => truncate(&other.to_string(), max_chars),
        Err(_) => "[unserializable output]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_text_unchanged() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_long_text() {
        assert_eq!(truncate("hello world", 5), "hello...");
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("préstamo", 3), "pré...");
    }

    #[test]
    fn test_truncate_json_string_and_object() {
        assert_eq!(truncate_json("plain", 50), "plain");
        let obj = serde_json::json!({"rate": 4.5});
        assert_eq!(truncate_json(&obj, 50), "{\"rate\":4.5}");
        assert_eq!(truncate_json(&obj, 4), "{\"ra...");
    }
}
