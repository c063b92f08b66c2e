//! Error types for the tabflow engine.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`HostError`] - failures reported by the host platform or the evaluator
//! - [`TransformError`] - validation, type and structural errors raised by operators
//! - [`RegistryError`] - active transformation graph errors
//! - [`StoreError`] - on-disk workspace errors
//! - [`CliError`] - top-level command line errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;
use uuid::Uuid;

use crate::parser::CsvError;

// =============================================================================
// Host Errors
// =============================================================================

/// Errors reported by the host platform.
#[derive(Debug, Error)]
pub enum HostError {
    /// The requested dataset does not exist.
    #[error("No dataset named \"{0}\" exists")]
    ContextNotFound(String),

    /// The requested text output does not exist.
    #[error("No text output named \"{0}\" exists")]
    TextNotFound(String),

    /// The expression evaluator rejected a formula.
    #[error("{0}")]
    Evaluation(String),
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors raised while running a transform operator.
#[derive(Debug, Error)]
pub enum TransformError {
    /// Missing or invalid input selection. Checked before any data is touched.
    #[error("{0}")]
    Validation(String),

    /// A value did not have the type the operator requires.
    #[error("{0}")]
    TypeMismatch(String),

    /// A referenced attribute does not exist in any collection.
    #[error("{message}")]
    MissingAttribute { name: String, message: String },

    /// The expression evaluator failed or returned a malformed result.
    #[error("{0}")]
    Evaluation(String),

    /// The host platform failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

impl TransformError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch(message.into())
    }

    /// Structural error with the default message.
    pub fn missing_attribute(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::MissingAttribute {
            message: format!("Invalid attribute name: {}", name),
            name,
        }
    }
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the active transformation registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No description with this id is registered.
    #[error("No active transformation with id {0}")]
    DescriptionNotFound(Uuid),

    /// Only full-override transformations can be edited in place.
    #[error("Transformation {0} is not a full-override transformation and cannot be edited")]
    NotFullOverride(Uuid),

    /// A description must depend on at least one input.
    #[error("Transformation {0} does not declare any inputs")]
    NoInputs(Uuid),

    /// The transformer produced an output the description cannot push.
    #[error("{0}")]
    OutputMismatch(String),

    /// Operator failure.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Host failure.
    #[error(transparent)]
    Host(#[from] HostError),
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors from the on-disk workspace.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("Workspace IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Workspace JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored file does not hold a dataset.
    #[error("Invalid stored dataset {path}: {message}")]
    InvalidContext { path: String, message: String },
}

// =============================================================================
// CLI Errors (top-level)
// =============================================================================

/// Top-level errors surfaced by the `tabflow` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// CSV import error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Operator error.
    #[error("{0}")]
    Transform(#[from] TransformError),

    /// Registry error.
    #[error("{0}")]
    Registry(#[from] RegistryError),

    /// Workspace error.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Host error.
    #[error("{0}")]
    Host(#[from] HostError),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Bad command line usage.
    #[error("{0}")]
    Usage(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Result type for transform operators.
pub type TransformResult<T> = Result<T, TransformError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for workspace operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for the command line.
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // HostError -> TransformError
        let host_err = HostError::ContextNotFound("People".into());
        let transform_err: TransformError = host_err.into();
        assert!(transform_err.to_string().contains("People"));

        // TransformError -> RegistryError
        let registry_err: RegistryError = TransformError::missing_attribute("Age").into();
        assert_eq!(registry_err.to_string(), "Invalid attribute name: Age");
    }

    #[test]
    fn test_missing_attribute_keeps_name() {
        match TransformError::missing_attribute("Height") {
            TransformError::MissingAttribute { name, message } => {
                assert_eq!(name, "Height");
                assert!(message.contains("Height"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
