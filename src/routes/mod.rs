//! Router assembly: HTTP endpoints, WebSocket upgrade, static files, CORS,
//! and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::store::ReportStore;

pub mod http;
pub mod ws;

/// Build the application router with:
/// - WebSocket at `/ws` (interactive worksheet session)
/// - REST-ish API under `/api/v1/...` (worksheet + teacher dashboard)
/// - Static SPA from `./static` with index fallback
/// - CORS (allow any origin/method/headers) – adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(store: Arc<ReportStore>) -> Router {
    // Static files with SPA fallback
    let static_service = ServeDir::new("./static")
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new("./static/index.html"));

    Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_upgrade))
        // HTTP API
        .route("/api/v1/health", get(http::http_health))
        .route("/api/v1/steps", get(http::http_get_steps))
        .route("/api/v1/answer", post(http::http_post_answer))
        .route("/api/v1/record", get(http::http_get_record))
        .route("/api/v1/submissions", get(http::http_get_submissions))
        .route("/api/v1/evaluation", get(http::http_get_evaluation))
        .route("/api/v1/refresh", post(http::http_post_refresh))
        .route("/api/v1/advice", post(http::http_post_advice))
        // State + CORS + HTTP tracing
        .with_state(store)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Frontend fallback
        .fallback_service(static_service)
}
