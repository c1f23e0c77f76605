pub mod admin;
pub mod webhook;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{header::HeaderValue, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::Mutex;
use tower_http::services::ServeDir;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::MediaConfig;
use crate::ingest::IngestPipeline;
use crate::store::Db;

const MAX_REQUEST_BODY_BYTES: usize = 4 * 1024 * 1024;
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state for all handlers.
///
/// The sqlite connection sits behind a mutex; handlers hold it for store
/// operations only, never across ingestion network I/O.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Db>>,
    pub pipeline: IngestPipeline,
}

pub fn build_router(state: AppState, media: &MediaConfig) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .merge(webhook::router(state.clone()))
        .merge(admin::router(state));

    // Serve localized media when the public prefix is a local path (a
    // CDN-style absolute URL means something else serves the files).
    if media.url.starts_with('/') {
        let mount = media.url.trim_end_matches('/');
        if !mount.is_empty() {
            router = router.nest_service(mount, ServeDir::new(&media.root));
        }
    }

    apply_middleware(router)
}

fn apply_middleware(router: Router) -> Router {
    router
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(request_context_middleware))
        .layer(middleware::from_fn(panic_handler))
}

async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

async fn panic_handler(request: Request<Body>, next: Next) -> Response {
    match tokio::spawn(async move { next.run(request).await }).await {
        Ok(response) => response,
        Err(join_error) => {
            error!(?join_error, "request handling panicked");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn request_context_middleware(request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started_at = Instant::now();

    let mut response = next.run(request).await;

    if let Ok(request_id_header) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, request_id_header);
    }

    info!(
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status().as_u16(),
        latency_ms = started_at.elapsed().as_millis() as u64,
        "request completed"
    );

    response
}
