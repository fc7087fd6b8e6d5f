//! Task notification cards.
//!
//! Composes interactive task cards from JSON templates
//! ([`card_templates`]) and delivers them over a fallback chain of messaging
//! channels ([`card_delivery`]). This crate adds the application layer:
//! configuration, tracing bootstrap, mapping of upstream progress items,
//! per-assignee notification runs and handling of card submissions.

pub mod config;
mod error;
pub mod progress;
pub mod service;
pub mod submission;
pub mod telemetry;

pub use card_delivery;
pub use card_templates;
pub use card_types;

pub use config::NotifierConfig;
pub use error::{NotifyError, Result};
pub use progress::{group_by_assignee, AssigneeGroup, ProgressItem, UserProfile};
pub use service::{AssigneeOutcome, Notification, NotificationService, RunSummary};
pub use submission::{
    confirmation_card, extract_task_updates, handle_submission, TaskUpdate, TaskUpdateResult,
    TaskUpdater,
};
pub use telemetry::init_tracing;
