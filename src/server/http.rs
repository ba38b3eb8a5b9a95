//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo; one task per accepted connection.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::crops::CropManager;
use crate::db::DocumentStore;
use crate::routes::{self, path_segments, response::preflight_response};
use crate::services::Services;
use crate::types::Result;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Backend every service writes through
    pub store: Arc<dyn DocumentStore>,
    pub crops: CropManager,
    pub services: Services,
}

impl AppState {
    pub fn new(args: Args, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            args,
            crops: CropManager::new(Arc::clone(&store)),
            services: Services::new(Arc::clone(&store)),
            store,
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "agrosystem listening on {} (store: {})",
        state.args.listen,
        state.store.kind()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    if method == Method::OPTIONS {
        return Ok(to_boxed(preflight_response()));
    }

    Ok(to_boxed(dispatch(&state, req, &path).await))
}

async fn dispatch(state: &AppState, req: Request<Incoming>, path: &str) -> Response<Full<Bytes>> {
    let segments = path_segments(path);
    let Some((family, rest)) = segments.split_first() else {
        return routes::response::not_found_response(path);
    };

    match family.as_str() {
        "health" | "healthz" if rest.is_empty() && req.method() == Method::GET => {
            routes::health_check(state)
        }
        "version" if rest.is_empty() && req.method() == Method::GET => routes::version_info(),

        "cultivos" => routes::handle_crop_request(state, req, rest).await,
        "usuarios" => routes::handle_user_request(state, req, rest).await,
        "insumos" => routes::handle_supply_request(state, req, rest).await,
        "actividades" => routes::handle_activity_request(state, req, rest).await,
        "alertas" => routes::handle_alert_request(state, req, rest).await,
        "historial-suelo" => routes::handle_soil_request(state, req, rest).await,

        _ => routes::response::not_found_response(path),
    }
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}
