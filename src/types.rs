//! Shared error type for agrosystem

use thiserror::Error;

/// Errors raised by store adapters, services and the HTTP layer.
///
/// `Validation`, `NotFound`, `Conflict`, `Unauthorized` and `Forbidden`
/// carry a caller-facing message. `NoChange` is not a failure: it marks an
/// operation that matched its target but had nothing to write, and is
/// reported as INFO. `Database` and `Internal` are logged and never echoed.
#[derive(Debug, Error)]
pub enum AgroError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No change: {0}")]
    NoChange(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Auth error: {0}")]
    Auth(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgroError {
    /// Whether this error is an unexpected fault rather than an expected
    /// rejection of the request.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            AgroError::Auth(_) | AgroError::Database(_) | AgroError::Internal(_) | AgroError::Io(_)
        )
    }
}

impl From<bson::ser::Error> for AgroError {
    fn from(e: bson::ser::Error) -> Self {
        AgroError::Internal(format!("BSON serialization failed: {e}"))
    }
}

impl From<bson::de::Error> for AgroError {
    fn from(e: bson::de::Error) -> Self {
        AgroError::Internal(format!("BSON deserialization failed: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, AgroError>;
