//! Upstream progress items and their mapping onto card task records.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;

use card_types::{CardData, TaskRecord};

const DUE_DATE_FORMAT: &str = "%d.%m.";
const MEETING_DATE_FORMAT: &str = "%d.%m.%Y";

// ============================================================================
// UPSTREAM SHAPES
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Titled {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub name: Option<String>,
}

/// A work item as reported by the progress tracking service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub item_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Lower-case category (`agreement`, `decision`, ...)
    #[serde(default)]
    pub progress_item_type: Option<String>,
    /// Assignee user id
    #[serde(default)]
    pub assignee: Option<String>,
    /// ISO date or timestamp
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub meeting_date: Option<String>,
    #[serde(default)]
    pub touch_point_origin: Option<Titled>,
    #[serde(default)]
    pub agenda_item: Option<Titled>,
    #[serde(default)]
    pub item_relation: Option<Named>,
    #[serde(default)]
    pub resolved: bool,
}

/// Directory profile of an assignee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
}

impl ProgressItem {
    pub fn due(&self) -> Option<NaiveDate> {
        self.due_date.as_deref().and_then(parse_date)
    }

    /// Map onto the record shape card templates reference.
    ///
    /// Dates are shortened for display; unparseable dates pass through.
    /// Fields the item lacks stay empty so configured defaults can fill them.
    pub fn to_task_record(&self, assigned_to: Option<&str>) -> TaskRecord {
        let mut record = TaskRecord {
            id: self.id.clone(),
            task_id: self.item_id.clone().or_else(|| self.id.clone()),
            title: self.description.clone(),
            task_type: self.progress_item_type.as_deref().map(title_case),
            due_date: self
                .due_date
                .as_deref()
                .map(|raw| display_date(raw, DUE_DATE_FORMAT)),
            meeting_origin: self.touch_point_origin.as_ref().and_then(|t| t.title.clone()),
            meeting_date: self
                .meeting_date
                .as_deref()
                .map(|raw| display_date(raw, MEETING_DATE_FORMAT)),
            agenda_item: self.agenda_item.as_ref().and_then(|t| t.title.clone()),
            relation: self.item_relation.as_ref().and_then(|r| r.name.clone()),
            completed: Some(self.resolved),
            assigned_to: assigned_to.map(str::to_string),
            ..Default::default()
        };
        if let Some(raw) = &self.due_date {
            record.extra.insert("dueDateFull".to_string(), json!(raw));
        }
        if let Some(assignee) = &self.assignee {
            record.extra.insert("assigneeId".to_string(), json!(assignee));
        }
        record
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

fn display_date(raw: &str, format: &str) -> String {
    match parse_date(raw) {
        Some(date) => date.format(format).to_string(),
        None => raw.to_string(),
    }
}

fn title_case(label: &str) -> String {
    label
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ============================================================================
// GROUPING
// ============================================================================

/// Items sharing one assignee, in first-seen order
#[derive(Debug, Clone, PartialEq)]
pub struct AssigneeGroup {
    pub assignee_id: String,
    pub items: Vec<ProgressItem>,
}

impl AssigneeGroup {
    /// Whole days until the earliest due item, clamped at zero
    pub fn days_left(&self, today: NaiveDate) -> Option<i64> {
        self.items
            .iter()
            .filter_map(ProgressItem::due)
            .min()
            .map(|due| (due - today).num_days().max(0))
    }

    /// Card input for this assignee: one task per item plus the countdown
    /// under `deadline.daysLeft`.
    pub fn card_data(&self, address: Option<&str>, today: NaiveDate) -> CardData {
        let tasks = self
            .items
            .iter()
            .map(|item| item.to_task_record(address))
            .collect();
        let mut data = CardData::new(tasks);
        if let Some(days) = self.days_left(today) {
            data = data.with_field("deadline", json!({ "daysLeft": days }));
        }
        data
    }
}

/// Group items by assignee. Items without an assignee are dropped.
pub fn group_by_assignee(items: impl IntoIterator<Item = ProgressItem>) -> Vec<AssigneeGroup> {
    let mut groups: Vec<AssigneeGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in items {
        let Some(assignee) = item.assignee.clone().filter(|a| !a.is_empty()) else {
            continue;
        };
        match index.get(&assignee) {
            Some(&i) => groups[i].items.push(item),
            None => {
                index.insert(assignee.clone(), groups.len());
                groups.push(AssigneeGroup {
                    assignee_id: assignee,
                    items: vec![item],
                });
            }
        }
    }
    groups
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn items() -> impl Strategy<Value = Vec<ProgressItem>> {
        prop::collection::vec((prop::option::of("[a-d]"), 0u32..60), 0..20).prop_map(|specs| {
            specs
                .into_iter()
                .map(|(assignee, offset)| ProgressItem {
                    assignee,
                    due_date: Some(
                        (NaiveDate::from_ymd_opt(2025, 8, 20).unwrap()
                            + chrono::Duration::days(offset as i64))
                        .format("%Y-%m-%d")
                        .to_string(),
                    ),
                    ..Default::default()
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn grouping_keeps_every_assigned_item(items in items()) {
            let assigned = items.iter().filter(|i| i.assignee.is_some()).count();
            let groups = group_by_assignee(items);

            let grouped: usize = groups.iter().map(|g| g.items.len()).sum();
            prop_assert_eq!(grouped, assigned);

            let mut ids: Vec<&str> = groups.iter().map(|g| g.assignee_id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            prop_assert_eq!(ids.len(), groups.len());
        }

        #[test]
        fn days_left_is_never_negative(items in items()) {
            let today = NaiveDate::from_ymd_opt(2025, 9, 4).unwrap();
            for group in group_by_assignee(items) {
                prop_assert!(group.days_left(today).is_some_and(|d| d >= 0));
            }
        }
    }
}
