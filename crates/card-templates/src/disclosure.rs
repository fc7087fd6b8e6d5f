//! Exclusive disclosure wiring
//!
//! Each task row toggles its own details panel. Wiring makes the toggle
//! exclusive: activating row `r` shows `detailsIds[r]` and hides every other
//! panel. "Closer" regions (banners, the table header, the footer) hide all
//! panels at once.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::node::{visit_objects_mut, SELECT_ACTION};

pub const TOGGLE_VISIBILITY: &str = "Action.ToggleVisibility";

/// One entry of an `Action.ToggleVisibility` target list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetElement {
    pub element_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_visible: Option<bool>,
}

impl TargetElement {
    /// Flip visibility
    pub fn toggle(id: impl Into<String>) -> Self {
        Self {
            element_id: id.into(),
            is_visible: None,
        }
    }

    pub fn show(id: impl Into<String>) -> Self {
        Self {
            element_id: id.into(),
            is_visible: Some(true),
        }
    }

    pub fn hide(id: impl Into<String>) -> Self {
        Self {
            element_id: id.into(),
            is_visible: Some(false),
        }
    }
}

/// Build a toggle-visibility action for `targets`
pub fn toggle_action(targets: &[TargetElement]) -> Value {
    let mut action = Map::new();
    action.insert("type".to_string(), Value::String(TOGGLE_VISIBILITY.to_string()));
    action.insert(
        "targetElements".to_string(),
        serde_json::to_value(targets).unwrap_or_else(|_| Value::Array(Vec::new())),
    );
    Value::Object(action)
}

/// Targets for the row owning `own`: show it, hide the rest.
///
/// Every entry carries an explicit state, so activating an open row again
/// keeps its panel open.
pub fn exclusive_targets(own: &str, all: &[String]) -> Vec<TargetElement> {
    all.iter()
        .map(|id| {
            if id == own {
                TargetElement::show(id.as_str())
            } else {
                TargetElement::hide(id.as_str())
            }
        })
        .collect()
}

/// Targets that hide every panel
pub fn collapse_targets(all: &[String]) -> Vec<TargetElement> {
    all.iter().map(|id| TargetElement::hide(id.as_str())).collect()
}

fn is_toggle(action: &Value) -> bool {
    action.get("type").and_then(Value::as_str) == Some(TOGGLE_VISIBILITY)
}

/// Point a row instance's activation at a single details panel.
///
/// The row's own `selectAction` becomes a toggle of `details_id` whatever it
/// was before; nested toggle actions inside the row are retargeted too.
pub fn target_only(row: &mut Value, details_id: &str) {
    set_row_action(row, &[TargetElement::toggle(details_id)]);
}

/// Drop every toggle activation from a row that has no panel to open.
///
/// Other activations (links, submits) stay.
pub fn strip_toggles(row: &mut Value) {
    visit_objects_mut(row, &mut |map: &mut Map<String, Value>| {
        if map.get(SELECT_ACTION).is_some_and(is_toggle) {
            map.remove(SELECT_ACTION);
        }
    });
}

/// Wire rows so each toggles its own panel and hides all others.
///
/// Row `r` is paired with `details_ids[r]`; rows without a partner are left
/// untouched.
pub fn wire_exclusive<'a, I>(rows: I, details_ids: &[String])
where
    I: IntoIterator<Item = &'a mut Value>,
{
    for (row, own) in rows.into_iter().zip(details_ids) {
        set_row_action(row, &exclusive_targets(own, details_ids));
    }
}

fn set_row_action(row: &mut Value, targets: &[TargetElement]) {
    let action = toggle_action(targets);

    visit_objects_mut(row, &mut |map: &mut Map<String, Value>| {
        if let Some(existing) = map.get_mut(SELECT_ACTION) {
            if is_toggle(existing) {
                *existing = action.clone();
            }
        }
    });

    if let Value::Object(map) = row {
        let replace = map.get(SELECT_ACTION).map_or(true, |a| !is_toggle(a));
        if replace {
            debug!("Replacing non-toggle row activation with a details toggle");
            map.insert(SELECT_ACTION.to_string(), action);
        }
    }
}

/// Make `node` collapse every panel when activated.
///
/// Nodes that already carry a non-toggle activation (links, submits) keep
/// it. Returns whether the node was wired.
pub fn wire_closer(node: &mut Value, details_ids: &[String]) -> bool {
    let Value::Object(map) = node else {
        return false;
    };
    if map.get(SELECT_ACTION).is_some_and(|a| !is_toggle(a)) {
        debug!("Keeping existing activation on closer region");
        return false;
    }
    map.insert(
        SELECT_ACTION.to_string(),
        toggle_action(&collapse_targets(details_ids)),
    );
    true
}

/// Mark a details panel hidden
pub fn hide(details: &mut Value) {
    if let Value::Object(map) = details {
        map.insert("isVisible".to_string(), Value::Bool(false));
    }
}

/// Target list of a node's own toggle action, if any
pub fn toggle_targets(node: &Value) -> Option<Vec<TargetElement>> {
    let action = node.get(SELECT_ACTION).filter(|a| is_toggle(a))?;
    let targets = action.get("targetElements")?.as_array()?;
    Some(
        targets
            .iter()
            .filter_map(|t| match t {
                Value::String(id) => Some(TargetElement::toggle(id.as_str())),
                other => serde_json::from_value(other.clone()).ok(),
            })
            .collect(),
    )
}
