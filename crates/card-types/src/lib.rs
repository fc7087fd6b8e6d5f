//! Card Types - Foundation data structures for card composition and delivery
//!
//! This crate holds the plain data that crosses the boundary between the
//! composition engine (`card-templates`), the delivery orchestrator
//! (`card-delivery`) and the application layer. It carries no behaviour beyond
//! constructors, accessors and default filling.
//!
//! ## Contents
//!
//! - [`Document`] / [`Node`]: the JSON card tree
//! - [`TaskRecord`] and [`CardData`]: composition input
//! - [`TaskDefaults`]: configurable fallbacks for missing record fields
//! - [`ContinuationContext`] and [`Recipient`]: delivery addressing
//!
//! ## Rules
//!
//! 1. No workspace dependencies
//! 2. Everything is serde-serializable
//! 3. Input records are never mutated by the engine; defaulting returns a copy

pub mod context;
pub mod task;

pub use context::{ContinuationContext, Recipient};
pub use task::{CardData, TaskDefaults, TaskRecord};

/// A card document: a tree of JSON nodes.
pub type Document = serde_json::Value;

/// One node of a card document. Structurally identical to [`Document`].
pub type Node = serde_json::Value;
