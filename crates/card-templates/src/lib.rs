//! Card Composition Engine
//!
//! Builds interactive notification cards from two static templates and a list
//! of task records:
//!
//! - a **base** template carrying the header and footer skeleton
//! - a **full** template carrying one sample table (header row, first task
//!   row, first details panel) written against `tasks[0]`
//!
//! Key concepts:
//! - The sample table is located structurally, never by fixed path; if it
//!   cannot be found composition fails with diagnostics instead of guessing
//! - Each task gets its own row/details pair with ids `details1..detailsN`
//! - Rows are wired so at most one details panel is visible at a time
//! - `{{path}}` placeholders are resolved last; unresolved ones stay in place
//!   and are reported as warnings
//!
//! # Example
//!
//! ```ignore
//! use card_templates::{CardComposer, TemplateRegistry};
//! use card_types::{CardData, TaskRecord};
//!
//! let registry = TemplateRegistry::load_from_dir("resources/cards".as_ref())?;
//! let composer = CardComposer::new(registry);
//! let data = CardData::new(vec![TaskRecord::new("Prepare budget", "Decision")]);
//! let card = composer.compose("task_assigning_card_template.json", "TasksAssignedToUser.json", &data)?;
//! assert!(card.warnings.is_empty());
//! ```

pub mod composer;
pub mod disclosure;
mod error;
pub mod extractor;
pub mod icons;
pub mod marker;
pub mod multiplier;
pub mod node;
pub mod resolver;
pub mod source;

pub use composer::{CardComposer, ClosingRegions, ComposeOptions, ComposedCard, TemplatePair};
pub use disclosure::{wire_exclusive, TargetElement};
pub use error::TemplateError;
pub use extractor::{extract_fragment, ExtractionDiagnostics, FragmentPattern, TableFragment};
pub use icons::{icon_for, is_completed, IconId};
pub use marker::IndexMarker;
pub use multiplier::{multiply, FragmentInstances, RewriteStrategy, RowInstance};
pub use node::NodeShape;
pub use resolver::{
    unresolved_placeholders, PlaceholderResolver, Resolution, UnresolvedPlaceholder,
    UnresolvedReason,
};
pub use source::{InMemoryTemplates, TemplateRegistry, TemplateSource};
