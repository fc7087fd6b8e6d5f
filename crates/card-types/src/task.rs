//! Task records and the composition input wrapper.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// TASK RECORD
// ============================================================================

/// One pending work item shown as a row of a card.
///
/// Field names follow the camelCase JSON used by templates
/// (`{{tasks[0].dueDate}}`). Unknown fields are kept in `extra` so templates
/// may reference them too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Free-text category label ("Agreement", "Decision", ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agenda_item: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_done: Option<bool>,
    /// Free-text workflow status ("open", "Done", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskRecord {
    /// Create a record with a title and category label
    pub fn new(title: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            task_type: Some(task_type.into()),
            ..Default::default()
        }
    }

    /// Builder: set the due date text
    pub fn due(mut self, due_date: impl Into<String>) -> Self {
        self.due_date = Some(due_date.into());
        self
    }

    /// Builder: set the explicit completion flag
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Builder: set the free-text status
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Identifier used when reporting a record back upstream.
    ///
    /// Prefers `taskId` over `id`, matching how submissions carry them.
    pub fn stable_id(&self) -> Option<&str> {
        self.task_id.as_deref().or(self.id.as_deref())
    }

    /// Category label, if present
    pub fn category(&self) -> Option<&str> {
        self.task_type.as_deref()
    }

    /// Return a copy with missing fields filled from `defaults`.
    ///
    /// `relation` and `detailsTitle` fall back to the record's own title when
    /// the defaults leave them unset.
    pub fn with_defaults(&self, defaults: &TaskDefaults) -> TaskRecord {
        let mut filled = self.clone();

        fill(&mut filled.title, &defaults.title);
        fill(&mut filled.task_type, &defaults.task_type);
        fill(&mut filled.due_date, &defaults.due_date);
        fill(&mut filled.meeting_origin, &defaults.meeting_origin);
        fill(&mut filled.meeting_date, &defaults.meeting_date);
        fill(&mut filled.agenda_item, &defaults.agenda_item);

        let title_fallback = filled.title.clone();
        fill(&mut filled.relation, &defaults.relation);
        fill(&mut filled.relation, &title_fallback);
        fill(&mut filled.details_title, &defaults.details_title);
        fill(&mut filled.details_title, &title_fallback);

        if filled.completed.is_none() && filled.is_done.is_none() && filled.status.is_none() {
            filled.completed = defaults.completed;
        }

        filled
    }
}

fn fill(slot: &mut Option<String>, fallback: &Option<String>) {
    if slot.is_none() {
        slot.clone_from(fallback);
    }
}

// ============================================================================
// DEFAULTS
// ============================================================================

/// Per-field fallbacks for records arriving with gaps.
///
/// Different notification paths historically used slightly different
/// literals, so these are configuration rather than constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDefaults {
    pub title: Option<String>,
    pub task_type: Option<String>,
    pub due_date: Option<String>,
    pub details_title: Option<String>,
    pub meeting_origin: Option<String>,
    pub meeting_date: Option<String>,
    pub agenda_item: Option<String>,
    pub relation: Option<String>,
    pub completed: Option<bool>,
}

impl Default for TaskDefaults {
    fn default() -> Self {
        Self {
            title: None,
            task_type: Some("Agreement".to_string()),
            due_date: None,
            details_title: None,
            meeting_origin: Some("Automated Deadline Notification".to_string()),
            meeting_date: None,
            agenda_item: Some("Progress item review".to_string()),
            relation: None,
            completed: Some(false),
        }
    }
}

impl TaskDefaults {
    /// Defaults that fill nothing
    pub fn none() -> Self {
        Self {
            title: None,
            task_type: None,
            due_date: None,
            details_title: None,
            meeting_origin: None,
            meeting_date: None,
            agenda_item: None,
            relation: None,
            completed: None,
        }
    }
}

// ============================================================================
// CARD DATA
// ============================================================================

/// Composition input: the task list plus any other top-level template fields
/// (`meetingTitle`, `deadline.daysLeft`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardData {
    #[serde(default)]
    pub tasks: Vec<TaskRecord>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl CardData {
    pub fn new(tasks: Vec<TaskRecord>) -> Self {
        Self {
            tasks,
            fields: Map::new(),
        }
    }

    /// Builder: add a top-level field
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Copy with every task filled from `defaults`
    pub fn with_task_defaults(&self, defaults: &TaskDefaults) -> CardData {
        CardData {
            tasks: self
                .tasks
                .iter()
                .map(|t| t.with_defaults(defaults))
                .collect(),
            fields: self.fields.clone(),
        }
    }

    /// The JSON context placeholders are resolved against
    pub fn to_context(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}
