//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid field value
    #[error("Invalid {field}: {value} (expected {expected})")]
    InvalidFieldValue {
        field: String,
        value: String,
        expected: String,
    },

    /// Unknown indicator key in a preferences store
    #[error("Unknown indicator key: {0}")]
    UnknownIndicator(String),
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
