use std::time::Duration;

use thiserror::Error;

use crate::orchestrator::DeliveryAttempt;

/// Failure of a single channel call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The channel cannot be used right now (not configured, no context,
    /// transport down)
    #[error("Channel unavailable: {0}")]
    Unavailable(String),

    /// The channel answered and refused (including auth/permission failures)
    #[error("Channel rejected the request: {0}")]
    Rejected(String),

    #[error("Channel call timed out after {0:?}")]
    TimedOut(Duration),
}

impl ChannelError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("No recipient found for '{address}'")]
    RecipientNotFound { address: String },

    #[error("Directory lookup failed for '{address}': {source}")]
    Directory {
        address: String,
        #[source]
        source: ChannelError,
    },

    #[error("All channels failed for '{address}': {}", summarize(attempts))]
    Exhausted {
        address: String,
        attempts: Vec<DeliveryAttempt>,
    },

    #[error("No message id to replace")]
    ReplacementTargetUnknown,

    #[error("Replacement failed after trying {tried:?}: {source}")]
    ReplacementFailed {
        tried: Vec<String>,
        #[source]
        source: ChannelError,
    },
}

fn summarize(attempts: &[DeliveryAttempt]) -> String {
    attempts
        .iter()
        .filter_map(|a| a.error.as_ref().map(|e| format!("{}: {e}", a.channel)))
        .collect::<Vec<_>>()
        .join("; ")
}
