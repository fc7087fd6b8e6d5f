//! Fragment multiplication
//!
//! Turns the single sample row/details pair into one pair per task record.
//! Copy `i` references `tasks[i]` in its placeholders and owns the details
//! panel `details{i+1}`.

use serde_json::Value;
use tracing::{debug, warn};

use card_types::TaskRecord;

use crate::disclosure;
use crate::extractor::{FragmentPattern, TableFragment};
use crate::icons;
use crate::marker::IndexMarker;

/// How index and id references inside copies are rewritten
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RewriteStrategy {
    /// Rewrite index markers only inside `{{...}}` spans and ids only in
    /// `id`/`elementId` attributes (and plain `targetElements` entries) that
    /// equal the sample id.
    #[default]
    Structural,
    /// Plain substring replacement over the serialized copy. Kept for cards
    /// authored against the old behaviour; it also rewrites ids that merely
    /// start with the sample id (`details10`).
    Literal,
}

/// One task's row plus its details panel
#[derive(Debug, Clone, PartialEq)]
pub struct RowInstance {
    pub row: Value,
    pub details: Option<Value>,
}

/// Header plus per-task instances, ready to splice into a body
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentInstances {
    pub header: Value,
    pub rows: Vec<RowInstance>,
    /// Ids of the details panels actually emitted, in row order
    pub details_ids: Vec<String>,
}

impl FragmentInstances {
    pub fn rows_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.rows.iter_mut().map(|r| &mut r.row)
    }

    /// Number of nodes `into_nodes` yields
    pub fn node_count(&self) -> usize {
        1 + self
            .rows
            .iter()
            .map(|r| 1 + usize::from(r.details.is_some()))
            .sum::<usize>()
    }

    /// Header followed by row/details pairs in task order
    pub fn into_nodes(self) -> Vec<Value> {
        let mut nodes = Vec::with_capacity(self.node_count());
        nodes.push(self.header);
        for instance in self.rows {
            nodes.push(instance.row);
            nodes.extend(instance.details);
        }
        nodes
    }
}

/// Produce one row/details pair per record.
///
/// An empty record list yields the header alone. Every details panel starts
/// hidden. Without a details template rows lose their toggle activation,
/// since there is no panel for it to open.
pub fn multiply(
    fragment: &TableFragment,
    records: &[TaskRecord],
    pattern: &FragmentPattern,
    strategy: RewriteStrategy,
) -> FragmentInstances {
    let sample_id = fragment.sample_details_id(pattern);
    let mut rows = Vec::with_capacity(records.len());
    let mut details_ids = Vec::new();

    for (i, record) in records.iter().enumerate() {
        let new_id = pattern.details_id(i + 1);

        let mut row = rewrite(
            &fragment.row_template,
            pattern.marker(),
            i,
            &sample_id,
            &new_id,
            strategy,
        );
        icons::normalize_instance(&mut row, record, i);
        if fragment.details_template.is_some() {
            disclosure::target_only(&mut row, &new_id);
        } else {
            disclosure::strip_toggles(&mut row);
        }

        let details = fragment.details_template.as_ref().map(|template| {
            let mut details = rewrite(template, pattern.marker(), i, &sample_id, &new_id, strategy);
            icons::normalize_instance(&mut details, record, i);
            if let Value::Object(map) = &mut details {
                map.insert("id".to_string(), Value::String(new_id.clone()));
            }
            disclosure::hide(&mut details);
            details
        });
        if details.is_some() {
            details_ids.push(new_id);
        }

        rows.push(RowInstance { row, details });
    }

    debug!(rows = rows.len(), ?strategy, "Multiplied table fragment");

    FragmentInstances {
        header: fragment.header.clone(),
        rows,
        details_ids,
    }
}

fn rewrite(
    template: &Value,
    marker: &IndexMarker,
    index: usize,
    sample_id: &str,
    new_id: &str,
    strategy: RewriteStrategy,
) -> Value {
    match strategy {
        RewriteStrategy::Structural => {
            let mut copy = template.clone();
            rewrite_structural(&mut copy, marker, index, sample_id, new_id);
            copy
        }
        RewriteStrategy::Literal => match rewrite_literal(template, marker, index, sample_id, new_id) {
            Ok(copy) => copy,
            Err(e) => {
                warn!(error = %e, index, "Literal rewrite produced invalid JSON, using structural rewrite");
                let mut copy = template.clone();
                rewrite_structural(&mut copy, marker, index, sample_id, new_id);
                copy
            }
        },
    }
}

const ID_KEYS: [&str; 2] = ["id", "elementId"];

fn rewrite_structural(
    value: &mut Value,
    marker: &IndexMarker,
    index: usize,
    sample_id: &str,
    new_id: &str,
) {
    match value {
        Value::String(s) => {
            if let Some(rewritten) = marker.rewrite_placeholders(s, index) {
                *s = rewritten;
            }
        }
        Value::Array(items) => {
            for item in items {
                rewrite_structural(item, marker, index, sample_id, new_id);
            }
        }
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if ID_KEYS.contains(&key.as_str()) && child.as_str() == Some(sample_id) {
                    *child = Value::String(new_id.to_string());
                } else if key == "targetElements" {
                    retarget_plain_ids(child, sample_id, new_id);
                    rewrite_structural(child, marker, index, sample_id, new_id);
                } else {
                    rewrite_structural(child, marker, index, sample_id, new_id);
                }
            }
        }
        _ => {}
    }
}

fn retarget_plain_ids(targets: &mut Value, sample_id: &str, new_id: &str) {
    if let Value::Array(items) = targets {
        for item in items {
            if item.as_str() == Some(sample_id) {
                *item = Value::String(new_id.to_string());
            }
        }
    }
}

fn rewrite_literal(
    template: &Value,
    marker: &IndexMarker,
    index: usize,
    sample_id: &str,
    new_id: &str,
) -> serde_json::Result<Value> {
    let text = serde_json::to_string(template)?
        .replace(&marker.canonical(), &format!("{}[{index}]", marker.collection()))
        .replace(sample_id, new_id);
    serde_json::from_str(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disclosure::{toggle_targets, TargetElement};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    pub(super) fn fragment() -> TableFragment {
        TableFragment {
            header: json!({ "type": "ColumnSet", "columns": [] }),
            row_template: json!({
                "type": "Container",
                "selectAction": {
                    "type": "Action.ToggleVisibility",
                    "targetElements": [ { "elementId": "details1" } ]
                },
                "items": [
                    { "type": "TextBlock", "text": "{{tasks[0].title}} (tasks[0])" },
                    { "type": "Icon", "name": "CheckmarkStarburst" },
                    { "type": "Input.Toggle", "id": "toggle", "title": "done" },
                    { "type": "TextBlock", "id": "details10-note", "text": "{{ tasks.0.dueDate }}" }
                ]
            }),
            details_template: Some(json!({
                "type": "Container",
                "id": "details1",
                "items": [ { "type": "TextBlock", "text": "{{tasks[0].detailsTitle}}" } ]
            })),
        }
    }

    fn records() -> Vec<TaskRecord> {
        vec![
            TaskRecord::new("Sign contract", "Agreement"),
            TaskRecord::new("Pick vendor", "Decision").completed(true),
            TaskRecord::new("Server down", "Issue").status("Closed"),
        ]
    }

    #[test]
    fn test_structural_rewrite() {
        let instances = multiply(
            &fragment(),
            &records(),
            &FragmentPattern::default(),
            RewriteStrategy::Structural,
        );

        assert_eq!(instances.details_ids, vec!["details1", "details2", "details3"]);
        let second = &instances.rows[1];
        assert_eq!(
            second.row["items"][0]["text"],
            json!("{{tasks[1].title}} (tasks[0])")
        );
        assert_eq!(second.row["items"][1]["name"], json!("Diamond"));
        assert_eq!(second.row["items"][2]["id"], json!("task_1_completed"));
        assert_eq!(second.row["items"][2]["value"], json!(true));
        assert_eq!(second.row["items"][3]["id"], json!("details10-note"));
        assert_eq!(second.row["items"][3]["text"], json!("{{ tasks.1.dueDate }}"));
        assert_eq!(
            toggle_targets(&second.row),
            Some(vec![TargetElement::toggle("details2")])
        );

        let details = second.details.as_ref().unwrap();
        assert_eq!(details["id"], json!("details2"));
        assert_eq!(details["isVisible"], json!(false));
        assert_eq!(details["items"][0]["text"], json!("{{tasks[1].detailsTitle}}"));

        let third = &instances.rows[2];
        assert_eq!(third.row["items"][1]["name"], json!("Info"));
        assert_eq!(third.row["items"][2]["value"], json!(true));
    }

    #[test]
    fn test_literal_rewrite_keeps_legacy_overmatch() {
        let instances = multiply(
            &fragment(),
            &records(),
            &FragmentPattern::default(),
            RewriteStrategy::Literal,
        );

        let second = &instances.rows[1].row;
        assert_eq!(second["items"][0]["text"], json!("{{tasks[1].title}} (tasks[1])"));
        assert_eq!(second["items"][3]["id"], json!("details20-note"));
        // dotted spelling is not known to the literal rewrite
        assert_eq!(second["items"][3]["text"], json!("{{ tasks.0.dueDate }}"));
    }

    #[test]
    fn test_zero_records_yield_header_only() {
        let instances = multiply(
            &fragment(),
            &[],
            &FragmentPattern::default(),
            RewriteStrategy::Structural,
        );
        assert!(instances.details_ids.is_empty());
        assert_eq!(instances.into_nodes(), vec![fragment().header]);
    }

    #[test]
    fn test_without_details_template() {
        let mut without = fragment();
        without.details_template = None;

        let instances = multiply(
            &without,
            &records()[..2],
            &FragmentPattern::default(),
            RewriteStrategy::Structural,
        );

        assert!(instances.details_ids.is_empty());
        assert_eq!(instances.node_count(), 3);
        for instance in &instances.rows {
            assert!(instance.details.is_none());
            assert_eq!(toggle_targets(&instance.row), None);
        }
    }

    #[test]
    fn test_input_record_order_preserved() {
        let instances = multiply(
            &fragment(),
            &records(),
            &FragmentPattern::default(),
            RewriteStrategy::Structural,
        );
        let nodes = instances.into_nodes();
        let ids: Vec<_> = nodes.iter().filter_map(|n| n.get("id")).collect();
        assert_eq!(ids, vec![&json!("details1"), &json!("details2"), &json!("details3")]);
    }
}
