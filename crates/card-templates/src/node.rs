//! Node shape capabilities
//!
//! The extractor and the rewriting passes only ever ask a node a few
//! questions: what is its type, does it carry an id or an activation, and
//! which child lists does it expose. [`NodeShape`] captures exactly those so
//! matching rules can be tested in isolation.

use serde_json::{Map, Value};

/// Keys whose array values hold further nodes
pub const CHILD_LIST_KEYS: [&str; 3] = ["items", "columns", "body"];

pub const COLUMN_SET: &str = "ColumnSet";
pub const CONTAINER: &str = "Container";
pub const ACTION_SET: &str = "ActionSet";
pub const ICON: &str = "Icon";
pub const INPUT_TOGGLE: &str = "Input.Toggle";
pub const SELECT_ACTION: &str = "selectAction";

/// Structural questions asked of a card node
pub trait NodeShape {
    /// The `type` tag, if any
    fn node_type(&self) -> Option<&str>;

    /// The `id` attribute, if any
    fn element_id(&self) -> Option<&str>;

    /// Whether the node carries an activation behaviour (`selectAction`)
    fn has_activation(&self) -> bool;

    /// Nested node lists (`items`, `columns`, `body`), in document order
    fn child_lists(&self) -> Vec<&Vec<Value>>;

    /// Mutable access to nested node lists
    fn child_lists_mut(&mut self) -> Vec<&mut Vec<Value>>;

    fn is_type(&self, node_type: &str) -> bool {
        self.node_type() == Some(node_type)
    }
}

impl NodeShape for Value {
    fn node_type(&self) -> Option<&str> {
        self.get("type").and_then(Value::as_str)
    }

    fn element_id(&self) -> Option<&str> {
        self.get("id").and_then(Value::as_str)
    }

    fn has_activation(&self) -> bool {
        self.get(SELECT_ACTION).is_some_and(Value::is_object)
    }

    fn child_lists(&self) -> Vec<&Vec<Value>> {
        match self {
            Value::Object(map) => map
                .iter()
                .filter(|(key, _)| CHILD_LIST_KEYS.contains(&key.as_str()))
                .filter_map(|(_, value)| value.as_array())
                .collect(),
            _ => Vec::new(),
        }
    }

    fn child_lists_mut(&mut self) -> Vec<&mut Vec<Value>> {
        match self {
            Value::Object(map) => map
                .iter_mut()
                .filter(|(key, _)| CHILD_LIST_KEYS.contains(&key.as_str()))
                .filter_map(|(_, value)| value.as_array_mut())
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Visit every JSON object in a subtree, parents before children.
pub fn visit_objects_mut<F>(value: &mut Value, visit: &mut F)
where
    F: FnMut(&mut Map<String, Value>),
{
    match value {
        Value::Object(map) => {
            visit(map);
            for child in map.values_mut() {
                visit_objects_mut(child, visit);
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_objects_mut(item, visit);
            }
        }
        _ => {}
    }
}

/// Visit every node in a subtree, parents before children.
pub fn visit_nodes<F>(value: &Value, visit: &mut F)
where
    F: FnMut(&Value),
{
    match value {
        Value::Object(map) => {
            visit(value);
            for child in map.values() {
                visit_nodes(child, visit);
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_nodes(item, visit);
            }
        }
        _ => {}
    }
}

/// Whether any string leaf in the subtree satisfies `predicate`
pub fn any_string<P>(value: &Value, predicate: &P) -> bool
where
    P: Fn(&str) -> bool,
{
    match value {
        Value::String(s) => predicate(s),
        Value::Array(items) => items.iter().any(|item| any_string(item, predicate)),
        Value::Object(map) => map.values().any(|v| any_string(v, predicate)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_of_row_container() {
        let node = json!({
            "type": "Container",
            "id": "row",
            "selectAction": { "type": "Action.ToggleVisibility" },
            "items": [ { "type": "TextBlock" } ]
        });

        assert_eq!(node.node_type(), Some("Container"));
        assert_eq!(node.element_id(), Some("row"));
        assert!(node.has_activation());
        assert_eq!(node.child_lists().len(), 1);
    }

    #[test]
    fn test_child_lists_include_columns_and_body() {
        let node = json!({
            "type": "ColumnSet",
            "columns": [ { "type": "Column", "items": [] } ],
            "body": [],
            "actions": [ { "type": "Action.Submit" } ]
        });
        assert_eq!(node.child_lists().len(), 2);
    }

    #[test]
    fn test_any_string_descends() {
        let node = json!({ "a": [ { "b": "needle" } ] });
        assert!(any_string(&node, &|s| s == "needle"));
        assert!(!any_string(&node, &|s| s == "hay"));
    }
}
