//
// error.rs
// PDT-Tools-rs
//
// Validation errors raised before any dosimetry or fluorescence computation runs.
//
// Thales Matheus Mendonça Santos - November 2025

use thiserror::Error;

/// Request-level failures. Every variant maps to a 400 response in the web layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required parameters")]
    MissingParameters,
    #[error("Invalid parameter {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
    #[error("{field} must contain at least one intensity value")]
    EmptySample { field: &'static str },
    #[error("Invalid request body: {0}")]
    Malformed(String),
}

impl ValidationError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ValidationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}
