//! Crop routes (`/cultivos/...`)
//!
//! Unauthenticated. Every sub-resource lives under the crop id.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};

use super::response::{method_not_allowed_response, not_found_response, outcome_response};
use crate::crops::{
    CropPatch, InputApplicationPatch, IrrigationPatch, LocationPatch, NewCrop,
    NewInputApplication, NewIrrigation, NewLocation, NewTracking, TrackingPatch,
};
use crate::server::AppState;

pub async fn handle_crop_request(
    state: &AppState,
    req: Request<Incoming>,
    segments: &[String],
) -> Response<Full<Bytes>> {
    let crops = &state.crops;
    let method = req.method().clone();
    let segs: Vec<&str> = segments.iter().map(String::as_str).collect();

    match (method, segs.as_slice()) {
        (Method::POST, []) => with_json!(req, |input: NewCrop| crops.create_crop(input)),
        (Method::GET, []) => outcome_response(crops.list_crops().await),

        (Method::GET, [id]) => outcome_response(crops.get_crop(id).await),
        (Method::PUT, [id]) => with_json!(req, |patch: CropPatch| crops.update_crop(id, patch)),
        (Method::DELETE, [id]) => outcome_response(crops.delete_crop(id).await),

        (Method::POST, [id, "ubicacion"]) => {
            with_json!(req, |input: NewLocation| crops.create_location(id, input))
        }
        (Method::GET, [id, "ubicacion"]) => outcome_response(crops.get_location(id).await),
        (Method::PUT, [id, "ubicacion"]) => {
            with_json!(req, |patch: LocationPatch| crops.update_location(id, patch))
        }
        (Method::DELETE, [id, "ubicacion"]) => outcome_response(crops.delete_location(id).await),

        (Method::POST, [id, "insumos"]) => {
            with_json!(req, |input: NewInputApplication| crops
                .add_input_application(id, input))
        }
        (Method::GET, [id, "insumos"]) => {
            outcome_response(crops.list_input_applications(id).await)
        }
        (Method::GET, [id, "insumos", sub]) => {
            outcome_response(crops.get_input_application(id, sub).await)
        }
        (Method::PUT, [id, "insumos", sub]) => {
            with_json!(req, |patch: InputApplicationPatch| crops
                .update_input_application(id, sub, patch))
        }
        (Method::DELETE, [id, "insumos", sub]) => {
            outcome_response(crops.delete_input_application(id, sub).await)
        }

        (Method::POST, [id, "riegos"]) => {
            with_json!(req, |input: NewIrrigation| crops.add_irrigation(id, input))
        }
        (Method::GET, [id, "riegos"]) => outcome_response(crops.list_irrigations(id).await),
        (Method::GET, [id, "riegos", sub]) => {
            outcome_response(crops.get_irrigation(id, sub).await)
        }
        (Method::PUT, [id, "riegos", sub]) => {
            with_json!(req, |patch: IrrigationPatch| crops.update_irrigation(id, sub, patch))
        }
        (Method::DELETE, [id, "riegos", sub]) => {
            outcome_response(crops.delete_irrigation(id, sub).await)
        }

        (Method::POST, [id, "seguimientos"]) => {
            with_json!(req, |input: NewTracking| crops.add_tracking(id, input))
        }
        (Method::GET, [id, "seguimientos"]) => outcome_response(crops.list_tracking(id).await),
        (Method::GET, [id, "seguimientos", sub]) => {
            outcome_response(crops.get_tracking(id, sub).await)
        }
        (Method::PUT, [id, "seguimientos", sub]) => {
            with_json!(req, |patch: TrackingPatch| crops.update_tracking(id, sub, patch))
        }
        (Method::DELETE, [id, "seguimientos", sub]) => {
            outcome_response(crops.delete_tracking(id, sub).await)
        }

        (_, [] | [_] | [_, "ubicacion"] | [_, "insumos" | "riegos" | "seguimientos"])
        | (_, [_, "insumos" | "riegos" | "seguimientos", _]) => method_not_allowed_response(),

        _ => not_found_response(req.uri().path()),
    }
}
