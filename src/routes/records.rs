//! Open record routes: `/alertas` and `/historial-suelo`

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};

use super::response::{method_not_allowed_response, not_found_response, outcome_response};
use crate::server::AppState;
use crate::services::{AlertPatch, NewAlert, NewSoilRecord, SoilRecordPatch};

pub async fn handle_alert_request(
    state: &AppState,
    req: Request<Incoming>,
    segments: &[String],
) -> Response<Full<Bytes>> {
    let alerts = &state.services.alerts;
    let method = req.method().clone();
    let segs: Vec<&str> = segments.iter().map(String::as_str).collect();

    match (method, segs.as_slice()) {
        (Method::POST, []) => with_json!(req, |input: NewAlert| alerts.create(input)),
        (Method::GET, []) => outcome_response(alerts.list().await),
        (Method::GET, [id]) => outcome_response(alerts.get(id).await),
        (Method::PUT, [id]) => with_json!(req, |patch: AlertPatch| alerts.update(id, patch)),
        (Method::DELETE, [id]) => outcome_response(alerts.delete(id).await),
        (_, [] | [_]) => method_not_allowed_response(),
        _ => not_found_response(req.uri().path()),
    }
}

pub async fn handle_soil_request(
    state: &AppState,
    req: Request<Incoming>,
    segments: &[String],
) -> Response<Full<Bytes>> {
    let soil = &state.services.soil;
    let method = req.method().clone();
    let segs: Vec<&str> = segments.iter().map(String::as_str).collect();

    match (method, segs.as_slice()) {
        (Method::POST, []) => with_json!(req, |input: NewSoilRecord| soil.create(input)),
        (Method::GET, []) => outcome_response(soil.list().await),
        (Method::GET, [id]) => outcome_response(soil.get(id).await),
        (Method::PUT, [id]) => with_json!(req, |patch: SoilRecordPatch| soil.update(id, patch)),
        (Method::DELETE, [id]) => outcome_response(soil.delete(id).await),
        (_, [] | [_]) => method_not_allowed_response(),
        _ => not_found_response(req.uri().path()),
    }
}
