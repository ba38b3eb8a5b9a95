//! Response builders shared by every route family

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE};
use hyper::{Request, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::outcome::{Outcome, OutcomeKind};
use crate::types::{AgroError, Result};

/// HTTP status for an envelope
pub fn status_for(kind: OutcomeKind) -> StatusCode {
    match kind {
        OutcomeKind::Ok | OutcomeKind::NoChange => StatusCode::OK,
        OutcomeKind::Created => StatusCode::CREATED,
        OutcomeKind::Validation => StatusCode::BAD_REQUEST,
        OutcomeKind::Unauthorized => StatusCode::UNAUTHORIZED,
        OutcomeKind::Forbidden => StatusCode::FORBIDDEN,
        OutcomeKind::NotFound => StatusCode::NOT_FOUND,
        OutcomeKind::Conflict => StatusCode::CONFLICT,
        OutcomeKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Serialize `body` as JSON with the given status
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_vec(body).unwrap_or_else(|_| {
        br#"{"estatus":"ERROR","mensaje":"Serialization failed"}"#.to_vec()
    });

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

pub fn outcome_response<T: Serialize>(outcome: Outcome<T>) -> Response<Full<Bytes>> {
    json_response(status_for(outcome.kind()), &outcome)
}

/// Envelope for a failure raised before any operation ran
pub fn error_response(err: AgroError) -> Response<Full<Bytes>> {
    outcome_response(Outcome::<()>::from_error(err))
}

pub fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    error_response(AgroError::NotFound(format!("Ruta no encontrada: {}", path)))
}

pub fn method_not_allowed_response() -> Response<Full<Bytes>> {
    let mut response = error_response(AgroError::Validation(
        "Método no permitido para esta ruta.".into(),
    ));
    *response.status_mut() = StatusCode::METHOD_NOT_ALLOWED;
    response
}

/// CORS preflight response
pub fn preflight_response() -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    let headers = response.headers_mut();
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    response
}

/// Read and decode a JSON request body
pub async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T> {
    let body = req
        .into_body()
        .collect()
        .await
        .map_err(|e| AgroError::Validation(format!("No se pudo leer el cuerpo de la petición: {e}")))?
        .to_bytes();

    serde_json::from_slice(&body)
        .map_err(|e| AgroError::Validation(format!("Cuerpo JSON inválido: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(OutcomeKind::NoChange), StatusCode::OK);
        assert_eq!(status_for(OutcomeKind::Created), StatusCode::CREATED);
        assert_eq!(status_for(OutcomeKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(
            status_for(OutcomeKind::Internal),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let response = error_response(AgroError::Database("connection reset by peer".into()));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[tokio::test]
    async fn test_envelope_body_shape() {
        let response = outcome_response(Outcome::ok_with("listo", vec![1, 2]));
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["estatus"], "OK");
        assert_eq!(json["mensaje"], "listo");
        assert_eq!(json["datos"], serde_json::json!([1, 2]));
    }
}
