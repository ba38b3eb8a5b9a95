//! Routes behind HTTP Basic authentication
//!
//! - `/usuarios` - accounts, login
//! - `/insumos` - supply catalogue
//! - `/actividades` - assigned tasks
//!
//! Credentials are resolved on every request, then the role gate for the
//! operation runs before the service is invoked.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::AUTHORIZATION;
use hyper::{Method, Request, Response};
use serde::Deserialize;
use tracing::debug;

use super::response::{
    error_response, method_not_allowed_response, not_found_response, outcome_response, read_json,
};
use crate::auth::{parse_basic_header, BasicCredentials, Principal};
use crate::db::schemas::Role;
use crate::server::AppState;
use crate::services::{ActivityPatch, NewActivity, NewSupply, NewUser, SupplyPatch, UserPatch};
use crate::types::{AgroError, Result};
use crate::validation::parse_object_id;

/// Authenticate and authorize, or return the error envelope
macro_rules! gate {
    ($state:expr, $req:expr, $op:expr) => {
        match authenticate($state, &$req).await {
            Ok(principal) => match principal.authorize($op) {
                Ok(()) => principal,
                Err(e) => return error_response(e),
            },
            Err(e) => return error_response(e),
        }
    };
}

fn basic_credentials(req: &Request<Incoming>) -> Option<BasicCredentials> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic_header)
}

async fn authenticate(state: &AppState, req: &Request<Incoming>) -> Result<Principal> {
    let creds = basic_credentials(req).ok_or_else(|| {
        AgroError::Unauthorized("Se requieren credenciales (Authorization: Basic).".into())
    })?;
    state.services.users.authenticate(&creds).await
}

fn segments_of(segments: &[String]) -> Vec<&str> {
    segments.iter().map(String::as_str).collect()
}

// ============================================================================
// Users
// ============================================================================

/// Login body accepted when no Authorization header is sent
#[derive(Debug, Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

pub async fn handle_user_request(
    state: &AppState,
    req: Request<Incoming>,
    segments: &[String],
) -> Response<Full<Bytes>> {
    let users = &state.services.users;
    let method = req.method().clone();
    let segs = segments_of(segments);

    match (method, segs.as_slice()) {
        (Method::POST, ["login"]) => {
            let creds = match basic_credentials(&req) {
                Some(creds) => creds,
                None => match read_json::<LoginBody>(req).await {
                    Ok(body) => BasicCredentials {
                        email: body.email,
                        password: body.password,
                    },
                    Err(e) => return error_response(e),
                },
            };
            outcome_response(users.login(&creds).await)
        }

        (Method::POST, []) => match users.has_users().await {
            Ok(false) => with_json!(req, |input: NewUser| users.register_first_admin(input)),
            Ok(true) => {
                let principal = gate!(state, req, "user.create");
                debug!("User creation requested by {}", principal.id);
                with_json!(req, |input: NewUser| users.create(input))
            }
            Err(e) => error_response(e),
        },
        (Method::GET, []) => {
            gate!(state, req, "user.list");
            outcome_response(users.list().await)
        }

        (Method::GET, [id]) => {
            let principal = match authenticate(state, &req).await {
                Ok(p) => p,
                Err(e) => return error_response(e),
            };
            if let Err(e) = parse_object_id(id, "del usuario")
                .and_then(|target| principal.authorize_self_or("user.get", target))
            {
                return error_response(e);
            }
            outcome_response(users.get(id).await)
        }
        (Method::PUT, [id]) => {
            let principal = match authenticate(state, &req).await {
                Ok(p) => p,
                Err(e) => return error_response(e),
            };
            if let Err(e) = parse_object_id(id, "del usuario")
                .and_then(|target| principal.authorize_self_or("user.update", target))
            {
                return error_response(e);
            }
            let patch = match read_json::<UserPatch>(req).await {
                Ok(patch) => patch,
                Err(e) => return error_response(e),
            };
            // Role and active flag stay admin-only even on one's own account
            if (patch.rol.is_some() || patch.estatus.is_some())
                && principal.rol != Role::Administrator
            {
                return error_response(AgroError::Forbidden(
                    "Solo un Administrador puede cambiar el rol o el estatus.".into(),
                ));
            }
            outcome_response(users.update(id, patch).await)
        }
        (Method::DELETE, [id]) => {
            gate!(state, req, "user.deactivate");
            outcome_response(users.deactivate(id).await)
        }

        (_, [] | [_]) => method_not_allowed_response(),
        _ => not_found_response(req.uri().path()),
    }
}

// ============================================================================
// Supplies
// ============================================================================

pub async fn handle_supply_request(
    state: &AppState,
    req: Request<Incoming>,
    segments: &[String],
) -> Response<Full<Bytes>> {
    let supplies = &state.services.supplies;
    let method = req.method().clone();
    let segs = segments_of(segments);

    match (method, segs.as_slice()) {
        (Method::POST, []) => {
            gate!(state, req, "supply.create");
            with_json!(req, |input: NewSupply| supplies.create(input))
        }
        (Method::GET, []) => {
            gate!(state, req, "supply.list");
            outcome_response(supplies.list().await)
        }
        (Method::GET, [id]) => {
            gate!(state, req, "supply.get");
            outcome_response(supplies.get(id).await)
        }
        (Method::PUT, [id]) => {
            gate!(state, req, "supply.update");
            with_json!(req, |patch: SupplyPatch| supplies.update(id, patch))
        }
        (Method::DELETE, [id]) => {
            gate!(state, req, "supply.delete");
            outcome_response(supplies.delete(id).await)
        }

        (_, [] | [_]) => method_not_allowed_response(),
        _ => not_found_response(req.uri().path()),
    }
}

// ============================================================================
// Activities
// ============================================================================

pub async fn handle_activity_request(
    state: &AppState,
    req: Request<Incoming>,
    segments: &[String],
) -> Response<Full<Bytes>> {
    let activities = &state.services.activities;
    let method = req.method().clone();
    let segs = segments_of(segments);

    match (method, segs.as_slice()) {
        (Method::POST, []) => {
            gate!(state, req, "activity.create");
            with_json!(req, |input: NewActivity| activities.create(input))
        }
        (Method::GET, []) => {
            gate!(state, req, "activity.list");
            outcome_response(activities.list().await)
        }
        (Method::GET, [id]) => {
            gate!(state, req, "activity.get");
            outcome_response(activities.get(id).await)
        }
        (Method::PUT, [id]) => {
            gate!(state, req, "activity.update");
            with_json!(req, |patch: ActivityPatch| activities.update(id, patch))
        }
        (Method::DELETE, [id]) => {
            gate!(state, req, "activity.delete");
            outcome_response(activities.cancel(id).await)
        }

        (_, [] | [_]) => method_not_allowed_response(),
        _ => not_found_response(req.uri().path()),
    }
}
