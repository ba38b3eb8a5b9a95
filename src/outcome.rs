//! Uniform response envelope
//!
//! Every operation answers with `{estatus, mensaje, datos?}`. Internally
//! operations return `Result<Outcome<T>>` so that expected failures flow
//! through `?`; [`Outcome::settle`] folds the error side into the envelope
//! once, at the boundary.

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::types::{AgroError, Result};

/// Status discriminator carried in every response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Error,
    Info,
}

/// Finer-grained classification used to pick the HTTP status code.
/// Not serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Ok,
    Created,
    NoChange,
    Validation,
    NotFound,
    Conflict,
    Unauthorized,
    Forbidden,
    Internal,
}

/// Generic message for faults whose detail must not reach the caller
pub const INTERNAL_MESSAGE: &str = "Error interno del servidor. Consulte al administrador.";

#[derive(Debug, Clone, Serialize)]
pub struct Outcome<T> {
    #[serde(rename = "estatus")]
    pub status: Status,

    #[serde(rename = "mensaje")]
    pub message: String,

    #[serde(rename = "datos", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip)]
    kind: OutcomeKind,
}

impl<T> Outcome<T> {
    pub fn ok(message: impl Into<String>) -> Self {
        Self::build(Status::Ok, OutcomeKind::Ok, message.into(), None)
    }

    pub fn ok_with(message: impl Into<String>, data: T) -> Self {
        Self::build(Status::Ok, OutcomeKind::Ok, message.into(), Some(data))
    }

    /// OK for operations that inserted a new document
    pub fn created(message: impl Into<String>) -> Self {
        Self::build(Status::Ok, OutcomeKind::Created, message.into(), None)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::build(Status::Info, OutcomeKind::NoChange, message.into(), None)
    }

    /// Convert an error into an envelope.
    ///
    /// Internal faults are logged here and replaced by a generic message.
    pub fn from_error(err: AgroError) -> Self {
        let (status, kind, message) = match err {
            AgroError::NoChange(m) => (Status::Info, OutcomeKind::NoChange, m),
            AgroError::Validation(m) => (Status::Error, OutcomeKind::Validation, m),
            AgroError::NotFound(m) => (Status::Error, OutcomeKind::NotFound, m),
            AgroError::Conflict(m) => (Status::Error, OutcomeKind::Conflict, m),
            AgroError::Unauthorized(m) => (Status::Error, OutcomeKind::Unauthorized, m),
            AgroError::Forbidden(m) => (Status::Error, OutcomeKind::Forbidden, m),
            other => {
                error!("Operation failed: {}", other);
                (Status::Error, OutcomeKind::Internal, INTERNAL_MESSAGE.to_string())
            }
        };
        Self::build(status, kind, message, None)
    }

    /// Fold an operation result into a single envelope
    pub fn settle(result: Result<Outcome<T>>) -> Self {
        result.unwrap_or_else(Self::from_error)
    }

    pub fn kind(&self) -> OutcomeKind {
        self.kind
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }

    pub fn is_info(&self) -> bool {
        self.status == Status::Info
    }

    fn build(status: Status, kind: OutcomeKind, message: String, data: Option<T>) -> Self {
        Self {
            status,
            message,
            data,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_change_settles_as_info() {
        let outcome: Outcome<()> =
            Outcome::settle(Err(AgroError::NoChange("sin cambios".into())));
        assert_eq!(outcome.status, Status::Info);
        assert_eq!(outcome.kind(), OutcomeKind::NoChange);
        assert_eq!(outcome.message, "sin cambios");
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let outcome: Outcome<()> =
            Outcome::settle(Err(AgroError::Database("connection reset by peer".into())));
        assert!(outcome.is_error());
        assert_eq!(outcome.kind(), OutcomeKind::Internal);
        assert_eq!(outcome.message, INTERNAL_MESSAGE);
    }

    #[test]
    fn test_serialized_shape() {
        let outcome = Outcome::ok_with("listo", vec![1, 2]);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["estatus"], "OK");
        assert_eq!(json["mensaje"], "listo");
        assert_eq!(json["datos"], serde_json::json!([1, 2]));

        let bare: Outcome<()> = Outcome::info("nada");
        let json = serde_json::to_value(&bare).unwrap();
        assert_eq!(json["estatus"], "INFO");
        assert!(json.get("datos").is_none());
    }
}
