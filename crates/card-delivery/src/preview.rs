//! Text preview of a card for channels without card rendering

use serde::{Deserialize, Serialize};
use serde_json::Value;

use card_types::Document;

const DEFAULT_MAX_LINES: usize = 8;

/// Title plus the first text lines of a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preview {
    pub title: String,
    pub lines: Vec<String>,
}

impl Preview {
    /// Collect `TextBlock` texts and `FactSet` facts in document order.
    ///
    /// Hidden subtrees (`isVisible: false`) are skipped, as are texts still
    /// holding `{{...}}` placeholders.
    pub fn from_document(document: &Document, title: impl Into<String>) -> Self {
        Self::with_max_lines(document, title, DEFAULT_MAX_LINES)
    }

    pub fn with_max_lines(document: &Document, title: impl Into<String>, max_lines: usize) -> Self {
        let mut lines = Vec::new();
        collect_lines(document, &mut lines, max_lines);
        Self {
            title: title.into(),
            lines,
        }
    }

    /// Plain-text rendering, one bullet per line
    pub fn to_text(&self) -> String {
        let mut text = self.title.clone();
        for line in &self.lines {
            text.push_str("\n- ");
            text.push_str(line);
        }
        text
    }
}

fn collect_lines(value: &Value, lines: &mut Vec<String>, max_lines: usize) {
    if lines.len() >= max_lines {
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                collect_lines(item, lines, max_lines);
            }
        }
        Value::Object(map) => {
            if map.get("isVisible") == Some(&Value::Bool(false)) {
                return;
            }
            match map.get("type").and_then(Value::as_str) {
                Some("TextBlock") => {
                    if let Some(text) = map.get("text").and_then(Value::as_str) {
                        push_line(lines, text);
                    }
                }
                Some("FactSet") => {
                    for fact in map.get("facts").and_then(Value::as_array).into_iter().flatten() {
                        let title = fact.get("title").and_then(Value::as_str).unwrap_or_default();
                        let value = fact.get("value").and_then(Value::as_str).unwrap_or_default();
                        if lines.len() < max_lines {
                            push_line(lines, &format!("{title} {value}"));
                        }
                    }
                }
                _ => {}
            }
            for key in ["body", "items", "columns"] {
                if let Some(child) = map.get(key) {
                    collect_lines(child, lines, max_lines);
                }
            }
        }
        _ => {}
    }
}

fn push_line(lines: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() && !text.contains("{{") {
        lines.push(text.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_preview_collects_visible_text() {
        let card = json!({
            "body": [
                { "type": "TextBlock", "text": "Hello Ada" },
                { "type": "Container", "items": [
                    { "type": "TextBlock", "text": " Sign contract " },
                    { "type": "FactSet", "facts": [ { "title": "Due:", "value": "06.09." } ] }
                ] },
                { "type": "Container", "isVisible": false, "items": [ { "type": "TextBlock", "text": "hidden" } ] },
                { "type": "TextBlock", "text": "{{unresolved}}" }
            ]
        });

        let preview = Preview::from_document(&card, "New tasks");

        assert_eq!(preview.lines, vec!["Hello Ada", "Sign contract", "Due: 06.09."]);
        assert_eq!(
            preview.to_text(),
            "New tasks\n- Hello Ada\n- Sign contract\n- Due: 06.09."
        );
    }

    #[test]
    fn test_preview_line_limit() {
        let card = json!({ "body": [
            { "type": "TextBlock", "text": "a" },
            { "type": "TextBlock", "text": "b" },
            { "type": "TextBlock", "text": "c" }
        ] });
        assert_eq!(Preview::with_max_lines(&card, "t", 2).lines, vec!["a", "b"]);
    }
}
