//! Error types for the estimation engine
//!
//! Only malformed input is a hard error. Degenerate but well-formed
//! configurations (single GPU, single region, zero distances) always
//! produce an estimate.

use thiserror::Error;

/// Main error type for regionplan
#[derive(Error, Debug)]
pub enum EstimateError {
    /// A field of the scenario failed validation
    #[error("Invalid input for `{field}`: {message}")]
    InvalidInput { field: String, message: String },

    /// Scenario file could not be interpreted
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, EstimateError>;

impl EstimateError {
    /// Create an invalid input error for a named field
    pub fn invalid<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field, if this is a validation error
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { field, .. } => Some(field),
            _ => None,
        }
    }
}
