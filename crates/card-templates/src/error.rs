//! Composition errors

use std::path::PathBuf;

use thiserror::Error;

use crate::extractor::ExtractionDiagnostics;

/// Fatal composition errors.
///
/// These are content or configuration defects, never transient conditions;
/// callers must not replace the card with a default one.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template '{name}' not found")]
    NotFound { name: String },

    #[error("Failed to read template '{name}' from {}: {source}", path.display())]
    Io {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Template '{name}' is not valid JSON: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Template '{name}' is unusable: {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("No header+row table fragment found in template '{template}' ({diagnostics})")]
    StructuralExtractionFailed {
        template: String,
        diagnostics: ExtractionDiagnostics,
    },

    #[error("Failed to build placeholder context: {0}")]
    Context(#[from] serde_json::Error),
}

impl TemplateError {
    /// Diagnostic counts when extraction failed
    pub fn diagnostics(&self) -> Option<&ExtractionDiagnostics> {
        match self {
            TemplateError::StructuralExtractionFailed { diagnostics, .. } => Some(diagnostics),
            _ => None,
        }
    }
}
