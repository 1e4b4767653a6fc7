//! crates/tutoring_core/src/error.rs
//!
//! The error taxonomy shared by every manager in the core.

use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Missing or malformed input, or a business rule checked before any write.
    #[error("{0}")]
    Validation(String),

    /// No principal was supplied.
    #[error("Authentication required")]
    Unauthorized,

    /// The principal's role or ownership does not allow the operation.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// An invariant would be violated (duplicate assignment, overlap, signed certificate).
    #[error("{0}")]
    Conflict(String),

    /// The underlying store failed. The detail is for logs, not clients.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// The renderer, storage or another collaborator failed.
    #[error("Collaborator failure: {0}")]
    Collaborator(String),
}

impl From<PortError> for ServiceError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => ServiceError::NotFound(msg),
            PortError::Conflict(msg) => ServiceError::Conflict(msg),
            PortError::Unexpected(msg) => ServiceError::Persistence(msg),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Fails with `Validation` when `value` is empty after trimming.
pub(crate) fn require_text(field: &str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{} is required", field)));
    }
    Ok(())
}
