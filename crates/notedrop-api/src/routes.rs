//! API route definitions

use crate::{handlers, state::AppState};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::limit::RequestBodyLimitLayer;

/// Upload and job routes
///
/// The upload route replaces axum's default body limit with `max_upload_size`
/// bytes; recordings are routinely far larger than the default.
pub fn job_routes(max_upload_size: usize) -> Router<Arc<AppState>> {
    let upload = Router::new()
        .route("/upload", post(handlers::upload::upload))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_size));

    Router::new()
        .route("/", get(handlers::index::index))
        .merge(upload)
        .route("/status/:job_id", get(handlers::jobs::get_status))
        .route("/result/:job_id", get(handlers::jobs::get_result))
        .route("/log/:job_id", get(handlers::jobs::get_log))
}

/// Build health check routes
pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(handlers::health::health_check))
}

/// Build all routes
pub fn build_router(max_upload_size: usize) -> Router<Arc<AppState>> {
    Router::new()
        .merge(job_routes(max_upload_size))
        .merge(health_routes())
}
