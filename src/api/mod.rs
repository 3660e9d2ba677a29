use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{HeaderName, Method, Request, StatusCode},
    routing::get,
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::middleware::headers;
use crate::store::ResourceStore;
use crate::AppState;

pub mod handlers;

/// Build the public-access router.
/// All routes are relative; the caller mounts this under `/api/access`.
pub fn access_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/students",
            get(handlers::list_students).post(handlers::create_student),
        )
        .route(
            "/attendance",
            get(handlers::get_attendance).post(handlers::save_attendance),
        )
        .route("/attendance/summary", get(handlers::attendance_summary))
        .fallback(fallback_404)
}

/// The complete application: health checks, the access API and the
/// cross-cutting layers.
pub fn app(state: Arc<AppState>) -> Router {
    let body_limit = state.config.body_limit_bytes;
    let cors = cors_layer(state.config.allowed_origin.clone());

    Router::new()
        // Health endpoints (no auth)
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .nest("/api/access", access_router())
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(cors)
        .layer(axum::middleware::from_fn(headers::request_id))
        .layer(axum::middleware::from_fn(headers::security_headers))
}

/// Request span carrying the path only; the query string may hold a pass token.
fn request_span(req: &Request<Body>) -> tracing::Span {
    tracing::debug_span!(
        "http",
        method = %req.method(),
        path = %req.uri().path(),
        version = ?req.version(),
    )
}

async fn fallback_404() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn readiness_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            tracing::warn!("readiness check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "store unavailable")
        }
    }
}

/// CORS restricted to the configured front-end origin plus local development.
fn cors_layer(allowed_origin: String) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            origin_str == allowed_origin
                || origin_str.starts_with("http://localhost:")
                || origin_str.starts_with("http://127.0.0.1:")
        }))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("authorization"),
            HeaderName::from_static("x-request-id"),
        ])
}
