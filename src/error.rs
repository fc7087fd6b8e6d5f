use card_delivery::DeliveryError;
use card_templates::TemplateError;

/// Errors surfaced by the notification service
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Card composition failed: {0}")]
    Template(#[from] TemplateError),

    #[error("Card delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("No delivery address for assignee {assignee}")]
    MissingAddress { assignee: String },

    #[error("Invalid submission: {0}")]
    InvalidSubmission(String),
}

pub type Result<T> = std::result::Result<T, NotifyError>;
