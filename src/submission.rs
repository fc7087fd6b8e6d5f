//! Card submissions: completion toggles back to task updates, and the
//! confirmation card sent in reply.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};

use card_types::Document;

use crate::error::{NotifyError, Result};

/// `action` value carried by the task card's submit button
pub const UPDATE_TASKS_ACTION: &str = "update_deadline_tasks";

const CARD_SCHEMA: &str = "http://adaptivecards.io/schemas/adaptive-card.json";
const CARD_VERSION: &str = "1.4";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub task_id: String,
    pub completed: bool,
    /// Row index the toggle belonged to
    pub task_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskUpdateResult {
    pub task_id: String,
    pub completed: bool,
    /// Failure reason; `None` when the update succeeded
    pub error: Option<String>,
}

impl TaskUpdateResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Writes completion state back to the task system
#[async_trait]
pub trait TaskUpdater: Send + Sync {
    async fn set_completed(
        &self,
        task_id: &str,
        completed: bool,
        user: &str,
    ) -> std::result::Result<(), String>;
}

// ============================================================================
// PARSING
// ============================================================================

/// Whether a submission came from the task card's update button
pub fn is_task_update(action_data: &Value) -> bool {
    action_data.get("action").and_then(Value::as_str) == Some(UPDATE_TASKS_ACTION)
}

/// Collect `task_{i}_completed` toggles, in row order.
///
/// The task id comes from `task_{i}_id`, else from `tasks[i].id` or
/// `tasks[i].taskId`. Toggles whose id cannot be found are skipped.
pub fn extract_task_updates(action_data: &Value) -> Result<Vec<TaskUpdate>> {
    let fields = action_data
        .as_object()
        .ok_or_else(|| NotifyError::InvalidSubmission("action data is not an object".into()))?;

    let mut updates = Vec::new();
    for (key, value) in fields {
        let Some(task_index) = toggle_index(key) else {
            continue;
        };
        match task_id_for(fields, task_index) {
            Some(task_id) => updates.push(TaskUpdate {
                task_id,
                completed: truthy(value),
                task_index,
            }),
            None => warn!("Could not find task id for index {}", task_index),
        }
    }

    updates.sort_by_key(|u| u.task_index);
    info!("Extracted {} task updates", updates.len());
    Ok(updates)
}

fn toggle_index(key: &str) -> Option<usize> {
    key.strip_prefix("task_")?
        .strip_suffix("_completed")?
        .parse()
        .ok()
}

fn task_id_for(fields: &Map<String, Value>, index: usize) -> Option<String> {
    if let Some(id) = fields.get(&format!("task_{index}_id")).and_then(as_id) {
        return Some(id);
    }
    let task = fields.get("tasks")?.as_array()?.get(index)?;
    task.get("id")
        .and_then(as_id)
        .or_else(|| task.get("taskId").and_then(as_id))
}

fn as_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Toggle values arrive as booleans or as their `valueOn`/`valueOff` text
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "1" | "yes" | "on"
        ),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

// ============================================================================
// APPLYING
// ============================================================================

/// Apply every update; one failure does not stop the others
pub async fn apply_task_updates(
    updater: &dyn TaskUpdater,
    updates: &[TaskUpdate],
    user: &str,
) -> Vec<TaskUpdateResult> {
    let mut results = Vec::with_capacity(updates.len());
    for update in updates {
        info!(
            task_id = %update.task_id,
            completed = update.completed,
            "Updating task for {}", user
        );
        let outcome = updater
            .set_completed(&update.task_id, update.completed, user)
            .await;
        if let Err(e) = &outcome {
            error!(task_id = %update.task_id, error = %e, "Task update failed");
        }
        results.push(TaskUpdateResult {
            task_id: update.task_id.clone(),
            completed: update.completed,
            error: outcome.err(),
        });
    }
    results
}

// ============================================================================
// CONFIRMATION CARD
// ============================================================================

/// Summary card listing successful and failed updates
pub fn confirmation_card(results: &[TaskUpdateResult], now: NaiveDateTime) -> Document {
    let (succeeded, failed): (Vec<_>, Vec<_>) = results.iter().partition(|r| r.succeeded());

    let mut body = vec![json!({
        "type": "TextBlock",
        "text": "Task Update Confirmation",
        "size": "Large",
        "weight": "Bolder"
    })];

    if !succeeded.is_empty() {
        body.push(json!({
            "type": "TextBlock",
            "text": format!("Successfully updated {} task(s)", succeeded.len()),
            "color": "Good",
            "spacing": "Medium"
        }));
        for result in &succeeded {
            let status = if result.completed { "Completed" } else { "Not completed" };
            body.push(json!({
                "type": "TextBlock",
                "text": format!("• Task {}: {}", result.task_id, status),
                "wrap": true,
                "spacing": "Small"
            }));
        }
    }

    if !failed.is_empty() {
        body.push(json!({
            "type": "TextBlock",
            "text": format!("Failed to update {} task(s)", failed.len()),
            "color": "Attention",
            "spacing": "Medium"
        }));
        for result in &failed {
            body.push(json!({
                "type": "TextBlock",
                "text": format!(
                    "• Task {}: {}",
                    result.task_id,
                    result.error.as_deref().unwrap_or("Unknown error")
                ),
                "wrap": true,
                "spacing": "Small"
            }));
        }
    }

    body.push(json!({
        "type": "TextBlock",
        "text": format!("Updated at: {}", now.format("%Y-%m-%d %H:%M:%S")),
        "size": "Small",
        "isSubtle": true,
        "spacing": "Medium"
    }));

    json!({
        "$schema": CARD_SCHEMA,
        "type": "AdaptiveCard",
        "version": CARD_VERSION,
        "body": body
    })
}

/// Parse, apply and summarise a submission.
///
/// Returns `None` when the submission is not a task update or carries no
/// toggles, so the caller can route it elsewhere.
pub async fn handle_submission(
    updater: &dyn TaskUpdater,
    action_data: &Value,
    user: &str,
    now: NaiveDateTime,
) -> Result<Option<Document>> {
    if !is_task_update(action_data) {
        return Ok(None);
    }
    let updates = extract_task_updates(action_data)?;
    if updates.is_empty() {
        warn!("Task update submission from {} carried no toggles", user);
        return Ok(None);
    }
    let results = apply_task_updates(updater, &updates, user).await;
    Ok(Some(confirmation_card(&results, now)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingUpdater {
        reject: Option<String>,
        calls: Mutex<Vec<(String, bool, String)>>,
    }

    #[async_trait]
    impl TaskUpdater for RecordingUpdater {
        async fn set_completed(
            &self,
            task_id: &str,
            completed: bool,
            user: &str,
        ) -> std::result::Result<(), String> {
            self.calls
                .lock()
                .unwrap()
                .push((task_id.to_string(), completed, user.to_string()));
            match &self.reject {
                Some(id) if id == task_id => Err("not found".to_string()),
                _ => Ok(()),
            }
        }
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 9, 4)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_extracts_toggles_in_row_order() {
        let data = json!({
            "action": UPDATE_TASKS_ACTION,
            "task_10_completed": "true",
            "task_2_completed": false,
            "task_2_id": "t-2",
            "task_10_id": "t-10"
        });

        let updates = extract_task_updates(&data).unwrap();

        assert_eq!(
            updates,
            vec![
                TaskUpdate { task_id: "t-2".into(), completed: false, task_index: 2 },
                TaskUpdate { task_id: "t-10".into(), completed: true, task_index: 10 },
            ]
        );
    }

    #[test]
    fn test_ids_fall_back_to_task_list() {
        let data = json!({
            "task_0_completed": "false",
            "task_1_completed": true,
            "task_5_completed": true,
            "tasks": [{ "id": "a" }, { "taskId": "b" }]
        });

        let updates = extract_task_updates(&data).unwrap();

        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].task_id, "a");
        assert!(!updates[0].completed);
        assert_eq!(updates[1].task_id, "b");
    }

    #[test]
    fn test_unrelated_keys_are_ignored() {
        let data = json!({ "task_x_completed": true, "task_1_comment": "hi" });
        assert!(extract_task_updates(&data).unwrap().is_empty());
    }

    #[test]
    fn test_non_object_is_invalid() {
        assert!(matches!(
            extract_task_updates(&json!([1, 2])),
            Err(NotifyError::InvalidSubmission(_))
        ));
    }

    #[test]
    fn test_confirmation_card_lists_both_outcomes() {
        let results = vec![
            TaskUpdateResult { task_id: "a".into(), completed: true, error: None },
            TaskUpdateResult { task_id: "b".into(), completed: false, error: Some("timeout".into()) },
        ];

        let card = confirmation_card(&results, now());
        let texts: Vec<&str> = card["body"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|n| n["text"].as_str())
            .collect();

        assert_eq!(card["version"], json!("1.4"));
        assert_eq!(
            texts,
            vec![
                "Task Update Confirmation",
                "Successfully updated 1 task(s)",
                "• Task a: Completed",
                "Failed to update 1 task(s)",
                "• Task b: timeout",
                "Updated at: 2025-09-04 08:30:00",
            ]
        );
    }

    #[tokio::test]
    async fn test_handle_submission_applies_all_updates() {
        let updater = RecordingUpdater {
            reject: Some("a".into()),
            ..Default::default()
        };
        let data = json!({
            "action": UPDATE_TASKS_ACTION,
            "task_0_completed": true,
            "task_1_completed": true,
            "tasks": [{ "id": "a" }, { "id": "b" }]
        });

        let card = handle_submission(&updater, &data, "ada@example.com", now())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updater.calls.lock().unwrap().len(), 2);
        assert_eq!(card["body"][1]["text"], json!("Successfully updated 1 task(s)"));
    }

    #[tokio::test]
    async fn test_other_actions_are_not_handled() {
        let updater = RecordingUpdater::default();
        let data = json!({ "action": "snooze", "task_0_completed": true });

        let handled = handle_submission(&updater, &data, "ada@example.com", now())
            .await
            .unwrap();

        assert_eq!(handled, None);
        assert!(updater.calls.lock().unwrap().is_empty());
    }
}
