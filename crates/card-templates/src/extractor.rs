//! Structural extraction of the sample table fragment
//!
//! The full template contains exactly one sample table: a column header, the
//! first task row (activatable, referencing `tasks[0]`) and optionally the
//! first details panel. Extraction finds that triple by shape, searching the
//! whole tree depth-first in document order. Fixed positional paths are never
//! consulted, so reordering unrelated template content does not break it.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use card_types::Document;

use crate::marker::IndexMarker;
use crate::node::{self, NodeShape, COLUMN_SET, CONTAINER};

// ============================================================================
// PATTERN
// ============================================================================

/// Shape rules for the header, row and details parts of a table fragment
#[derive(Debug, Clone)]
pub struct FragmentPattern {
    pub header_type: String,
    pub row_type: String,
    pub details_type: String,
    /// Id prefix marking details panels (`details` → `details1`, `details2`, ...)
    pub details_prefix: String,
    marker: IndexMarker,
}

impl Default for FragmentPattern {
    fn default() -> Self {
        Self::for_collection("tasks")
    }
}

impl FragmentPattern {
    pub fn for_collection(collection: &str) -> Self {
        Self {
            header_type: COLUMN_SET.to_string(),
            row_type: CONTAINER.to_string(),
            details_type: CONTAINER.to_string(),
            details_prefix: "details".to_string(),
            marker: IndexMarker::new(collection),
        }
    }

    pub fn marker(&self) -> &IndexMarker {
        &self.marker
    }

    pub fn is_header_candidate(&self, node: &Value) -> bool {
        node.is_type(&self.header_type)
    }

    /// Activatable node whose subtree references element zero
    pub fn is_row_candidate(&self, node: &Value) -> bool {
        node.is_type(&self.row_type)
            && node.has_activation()
            && node::any_string(node, &|s| self.marker.is_in(s))
    }

    pub fn is_details_candidate(&self, node: &Value) -> bool {
        node.is_type(&self.details_type)
            && node
                .element_id()
                .is_some_and(|id| id.starts_with(&self.details_prefix))
    }

    /// Id of the `n`th details panel, 1-based
    pub fn details_id(&self, n: usize) -> String {
        format!("{}{n}", self.details_prefix)
    }
}

// ============================================================================
// FRAGMENT
// ============================================================================

/// The sample table located in a full template
#[derive(Debug, Clone, PartialEq)]
pub struct TableFragment {
    pub header: Value,
    pub row_template: Value,
    pub details_template: Option<Value>,
}

impl TableFragment {
    /// Id the sample row targets, used when rewriting copies
    pub fn sample_details_id(&self, pattern: &FragmentPattern) -> String {
        self.details_template
            .as_ref()
            .and_then(|d| d.element_id())
            .map(str::to_string)
            .unwrap_or_else(|| pattern.details_id(1))
    }
}

/// Counts reported when no fragment could be found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionDiagnostics {
    pub header_candidates: usize,
    pub activation_nodes: usize,
    pub row_candidates: usize,
    pub details_candidates: usize,
    pub index_marker_occurrences: usize,
    pub body_items: usize,
}

impl fmt::Display for ExtractionDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "header candidates: {}, activation nodes: {}, row candidates: {}, \
             details candidates: {}, index marker occurrences: {}, body items: {}",
            self.header_candidates,
            self.activation_nodes,
            self.row_candidates,
            self.details_candidates,
            self.index_marker_occurrences,
            self.body_items
        )
    }
}

// ============================================================================
// EXTRACTION
// ============================================================================

/// Locate the sample table fragment in `full`.
///
/// A match is a header candidate immediately followed, in the same child
/// list, by a row candidate. The details panel is the first details
/// candidate after the row in that list, if any. Returns diagnostics when
/// nothing matches; never guesses.
pub fn extract_fragment(
    full: &Document,
    pattern: &FragmentPattern,
) -> Result<TableFragment, ExtractionDiagnostics> {
    let found = match full {
        Value::Array(items) => scan(items, pattern),
        other => other
            .child_lists()
            .into_iter()
            .find_map(|list| scan(list, pattern)),
    };

    match found {
        Some(fragment) => {
            debug!(
                has_details = fragment.details_template.is_some(),
                "Extracted table fragment"
            );
            Ok(fragment)
        }
        None => Err(diagnose(full, pattern)),
    }
}

fn scan(items: &[Value], pattern: &FragmentPattern) -> Option<TableFragment> {
    for (i, item) in items.iter().enumerate() {
        if pattern.is_header_candidate(item) {
            let row = items.get(i + 1).filter(|n| pattern.is_row_candidate(n));
            if let Some(row) = row {
                let details = items[i + 2..]
                    .iter()
                    .find(|n| pattern.is_details_candidate(n))
                    .cloned();
                return Some(TableFragment {
                    header: item.clone(),
                    row_template: row.clone(),
                    details_template: details,
                });
            }
        }

        if let Some(found) = item
            .child_lists()
            .into_iter()
            .find_map(|list| scan(list, pattern))
        {
            return Some(found);
        }
    }
    None
}

fn diagnose(full: &Document, pattern: &FragmentPattern) -> ExtractionDiagnostics {
    let mut diagnostics = ExtractionDiagnostics {
        body_items: full
            .get("body")
            .and_then(Value::as_array)
            .map_or(0, Vec::len),
        ..Default::default()
    };

    node::visit_nodes(full, &mut |n| {
        if pattern.is_header_candidate(n) {
            diagnostics.header_candidates += 1;
        }
        if n.has_activation() {
            diagnostics.activation_nodes += 1;
        }
        if pattern.is_row_candidate(n) {
            diagnostics.row_candidates += 1;
        }
        if pattern.is_details_candidate(n) {
            diagnostics.details_candidates += 1;
        }
    });
    diagnostics.index_marker_occurrences = count_markers(full, pattern.marker());

    diagnostics
}

fn count_markers(value: &Value, marker: &IndexMarker) -> usize {
    match value {
        Value::String(s) => marker.count_in(s),
        Value::Array(items) => items.iter().map(|v| count_markers(v, marker)).sum(),
        Value::Object(map) => map.values().map(|v| count_markers(v, marker)).sum(),
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn header() -> Value {
        json!({ "type": "ColumnSet", "columns": [ { "type": "Column", "items": [ { "type": "TextBlock", "text": "Title" } ] } ] })
    }

    fn row() -> Value {
        json!({
            "type": "Container",
            "selectAction": {
                "type": "Action.ToggleVisibility",
                "targetElements": [ { "elementId": "details1" } ]
            },
            "items": [ { "type": "TextBlock", "text": "{{tasks[0].title}}" } ]
        })
    }

    fn details() -> Value {
        json!({ "type": "Container", "id": "details1", "isVisible": false, "items": [] })
    }

    #[test]
    fn test_extracts_nested_fragment() {
        let full = json!({
            "type": "AdaptiveCard",
            "body": [
                { "type": "TextBlock", "text": "Banner" },
                { "type": "Container", "items": [ header(), row(), { "type": "TextBlock" }, details() ] }
            ]
        });

        let fragment = extract_fragment(&full, &FragmentPattern::default()).unwrap();

        assert_eq!(fragment.header, header());
        assert_eq!(fragment.row_template, row());
        assert_eq!(fragment.details_template, Some(details()));
        assert_eq!(
            fragment.sample_details_id(&FragmentPattern::default()),
            "details1"
        );
    }

    #[test]
    fn test_reordered_siblings_still_found() {
        let full = json!({
            "body": [
                { "type": "Container", "items": [ details(), header(), row() ] },
                { "type": "TextBlock", "text": "moved banner" }
            ]
        });

        let fragment = extract_fragment(&full, &FragmentPattern::default()).unwrap();
        // details before the row are not picked up
        assert_eq!(fragment.details_template, None);
    }

    #[test]
    fn test_header_must_be_immediately_followed_by_row() {
        let full = json!({
            "body": [ header(), { "type": "TextBlock" }, row(), details() ]
        });

        let diagnostics = extract_fragment(&full, &FragmentPattern::default()).unwrap_err();

        assert_eq!(diagnostics.header_candidates, 1);
        assert_eq!(diagnostics.row_candidates, 1);
        assert_eq!(diagnostics.details_candidates, 1);
        assert_eq!(diagnostics.body_items, 4);
    }

    #[test]
    fn test_row_without_marker_is_not_a_candidate() {
        let mut plain_row = row();
        plain_row["items"][0]["text"] = json!("{{title}}");
        let full = json!({ "body": [ header(), plain_row ] });

        let diagnostics = extract_fragment(&full, &FragmentPattern::default()).unwrap_err();

        assert_eq!(diagnostics.activation_nodes, 1);
        assert_eq!(diagnostics.row_candidates, 0);
        assert_eq!(diagnostics.index_marker_occurrences, 0);
    }

    #[test]
    fn test_dotted_marker_spelling_matches() {
        let mut dotted = row();
        dotted["items"][0]["text"] = json!("{{tasks.0.title}}");
        let full = json!({ "body": [ header(), dotted ] });

        assert!(extract_fragment(&full, &FragmentPattern::default()).is_ok());
    }

    #[test]
    fn test_diagnostics_display_mentions_counts() {
        let full = json!({ "body": [] });
        let diagnostics = extract_fragment(&full, &FragmentPattern::default()).unwrap_err();
        let text = diagnostics.to_string();
        assert!(text.contains("header candidates: 0"));
        assert!(text.contains("body items: 0"));
    }
}
