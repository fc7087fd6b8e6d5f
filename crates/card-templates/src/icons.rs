//! Icon and completion-state normalization for row/details instances

use serde_json::{Map, Value};

use card_types::TaskRecord;

use crate::node::{visit_objects_mut, ICON, INPUT_TOGGLE};

/// Canonical icons a category label maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IconId {
    Agreement,
    Decision,
    Issue,
}

impl IconId {
    pub const ALL: [IconId; 3] = [IconId::Agreement, IconId::Decision, IconId::Issue];

    /// Icon name as written in card documents
    pub fn as_str(&self) -> &'static str {
        match self {
            IconId::Agreement => "CheckmarkStarburst",
            IconId::Decision => "Diamond",
            IconId::Issue => "Info",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|icon| icon.as_str() == name)
    }
}

/// Map a free-text category label to its icon.
///
/// Matching is case-insensitive on the trimmed label. The German labels and
/// the misspellings seen in production data are accepted; anything else
/// falls back to the agreement icon.
pub fn icon_for(label: Option<&str>) -> IconId {
    let label = label.map(|l| l.trim().to_lowercase()).unwrap_or_default();
    match label.as_str() {
        "decision" | "decison" | "decisonj" | "entscheidung" => IconId::Decision,
        "issue" | "info" => IconId::Issue,
        _ => IconId::Agreement,
    }
}

const DONE_STATUSES: [&str; 4] = ["done", "completed", "closed", "resolved"];

/// Completion as shown by a row's toggle.
///
/// `completed` wins over `isDone`, which wins over `status`.
pub fn is_completed(record: &TaskRecord) -> bool {
    if let Some(completed) = record.completed {
        return completed;
    }
    if let Some(done) = record.is_done {
        return done;
    }
    record
        .status
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .is_some_and(|s| DONE_STATUSES.contains(&s.as_str()))
}

/// Replace canonical icon names in the subtree with `icon`.
///
/// Icons outside the canonical set are decorative and stay as they are.
pub fn apply_icon(node: &mut Value, icon: IconId) {
    visit_objects_mut(node, &mut |map: &mut Map<String, Value>| {
        if map.get("type").and_then(Value::as_str) != Some(ICON) {
            return;
        }
        let canonical = map
            .get("name")
            .and_then(Value::as_str)
            .and_then(IconId::from_name)
            .is_some();
        if canonical {
            map.insert("name".to_string(), Value::String(icon.as_str().to_string()));
        }
    });
}

/// Id of the completion toggle in row `index` (0-based)
pub fn toggle_id(index: usize) -> String {
    format!("task_{index}_completed")
}

/// Set every completion toggle in the subtree to `completed` and give it the
/// row's toggle id.
///
/// The toggle's own `valueOn`/`valueOff` strings are used when present,
/// otherwise the value is a boolean. A second toggle in the same row gets a
/// numeric suffix so ids stay unique.
pub fn apply_toggle(node: &mut Value, completed: bool, index: usize) {
    let mut seen = 0usize;
    visit_objects_mut(node, &mut |map: &mut Map<String, Value>| {
        if map.get("type").and_then(Value::as_str) != Some(INPUT_TOGGLE) {
            return;
        }

        let id = match seen {
            0 => toggle_id(index),
            n => format!("{}_{n}", toggle_id(index)),
        };
        seen += 1;
        map.insert("id".to_string(), Value::String(id));

        let key = if completed { "valueOn" } else { "valueOff" };
        let value = map
            .get(key)
            .and_then(Value::as_str)
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Bool(completed));
        map.insert("value".to_string(), value);
    });
}

/// Apply icon and completion state for `record` to one instance
pub fn normalize_instance(node: &mut Value, record: &TaskRecord, index: usize) {
    apply_icon(node, icon_for(record.category()));
    apply_toggle(node, is_completed(record), index);
}

/// Rename icon nodes named `from` to `to`, returning how many changed
pub fn rename_icon(node: &mut Value, from: &str, to: &str) -> usize {
    let mut renamed = 0;
    visit_objects_mut(node, &mut |map: &mut Map<String, Value>| {
        if map.get("type").and_then(Value::as_str) == Some(ICON)
            && map.get("name").and_then(Value::as_str) == Some(from)
        {
            map.insert("name".to_string(), Value::String(to.to_string()));
            renamed += 1;
        }
    });
    renamed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_icon_labels() {
        assert_eq!(icon_for(Some("Agreement")), IconId::Agreement);
        assert_eq!(icon_for(Some("vereinbarung")), IconId::Agreement);
        assert_eq!(icon_for(Some(" Decision ")), IconId::Decision);
        assert_eq!(icon_for(Some("decison")), IconId::Decision);
        assert_eq!(icon_for(Some("decisonj")), IconId::Decision);
        assert_eq!(icon_for(Some("Entscheidung")), IconId::Decision);
        assert_eq!(icon_for(Some("ISSUE")), IconId::Issue);
        assert_eq!(icon_for(Some("info")), IconId::Issue);
        assert_eq!(icon_for(Some("Retro")), IconId::Agreement);
        assert_eq!(icon_for(None), IconId::Agreement);
    }

    #[test]
    fn test_completion_precedence() {
        let base = TaskRecord::new("t", "Issue");
        assert!(!is_completed(&base));
        assert!(is_completed(&base.clone().status("Resolved")));
        assert!(!is_completed(&base.clone().status("open")));

        let mut done = base.clone().status("done");
        done.is_done = Some(false);
        assert!(!is_completed(&done));

        let explicit = base.status("open").completed(true);
        assert!(is_completed(&explicit));
    }

    #[test]
    fn test_apply_icon_skips_decorative_icons() {
        let mut node = json!({
            "type": "Container",
            "items": [
                { "type": "Icon", "name": "CheckmarkStarburst" },
                { "type": "Icon", "name": "Calendar" }
            ]
        });

        apply_icon(&mut node, IconId::Decision);

        assert_eq!(node["items"][0]["name"], json!("Diamond"));
        assert_eq!(node["items"][1]["name"], json!("Calendar"));
    }

    #[test]
    fn test_apply_toggle_prefers_value_strings() {
        let mut node = json!({
            "items": [
                { "type": "Input.Toggle", "valueOn": "true", "valueOff": "false" },
                { "type": "Input.Toggle" }
            ]
        });

        apply_toggle(&mut node, true, 4);

        assert_eq!(node["items"][0]["id"], json!("task_4_completed"));
        assert_eq!(node["items"][0]["value"], json!("true"));
        assert_eq!(node["items"][1]["id"], json!("task_4_completed_1"));
        assert_eq!(node["items"][1]["value"], json!(true));
    }

    #[test]
    fn test_rename_icon_counts() {
        let mut node = json!([
            { "type": "Icon", "name": "CheckmarkCircle" },
            { "type": "TextBlock", "name": "CheckmarkCircle" }
        ]);
        assert_eq!(rename_icon(&mut node, "CheckmarkCircle", "Info"), 1);
        assert_eq!(node[0]["name"], json!("Info"));
        assert_eq!(node[1]["name"], json!("CheckmarkCircle"));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    const SYNONYMS: [&str; 8] = [
        "agreement",
        "vereinbarung",
        "decision",
        "decison",
        "decisonj",
        "entscheidung",
        "issue",
        "info",
    ];

    proptest! {
        #[test]
        fn any_label_maps_to_a_canonical_icon(label in ".*") {
            prop_assert!(IconId::ALL.contains(&icon_for(Some(&label))));
        }

        #[test]
        fn case_and_padding_do_not_change_the_icon(
            index in 0usize..SYNONYMS.len(),
            upper in any::<bool>(),
            left in "[ \t]{0,3}",
            right in "[ \t]{0,3}",
        ) {
            let label = SYNONYMS[index];
            let cased = if upper { label.to_uppercase() } else { label.to_string() };
            let padded = format!("{left}{cased}{right}");
            prop_assert_eq!(icon_for(Some(&padded)), icon_for(Some(label)));
        }
    }
}
