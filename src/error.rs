// Error taxonomy for venue operations
//
// Validation and session-rule failures are raised locally before any store
// call. Store failures are reported as-is and never retried.

use crate::session::SessionError;
use crate::store::StoreError;
use thiserror::Error;

/// A single form field that failed validation
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        FieldError {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub type ValidationResult = Result<(), Vec<FieldError>>;

#[derive(Debug, Error)]
pub enum PosError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid input: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },
}

impl PosError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        PosError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Operator-facing guidance for remote failures, if any is known
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            PosError::Store(e) => e.hint(),
            _ => None,
        }
    }
}

impl From<Vec<FieldError>> for PosError {
    fn from(errors: Vec<FieldError>) -> Self {
        PosError::Validation(errors)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type PosResult<T> = Result<T, PosError>;
