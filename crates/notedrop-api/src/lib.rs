//! HTTP drop server for meeting recordings
//!
//! Clients upload a recording, get a job identifier back, and poll for the
//! transcription while a worker pool runs the external command in the
//! background.

#![forbid(unsafe_code)]

pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
pub mod tunnel;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::Router;
use notedrop_core::{Config, Result};
use notedrop_jobs::{Executor, JobQueue, JobRegistry, JobStore, WorkerPool};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Wire store, registry, queue and worker pool into a ready router
///
/// Creates the dropbox directories and starts the workers, so it must run
/// inside a tokio runtime. The caller owns the returned pool and is
/// responsible for shutting it down.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the dropbox cannot be
/// created or written, or the pool fails to start.
pub fn build_app(config: Config, executor: Arc<dyn Executor>) -> Result<(Router, WorkerPool)> {
    config.validate()?;

    let store = JobStore::from_config(&config.storage);
    store.ensure_directories()?;
    info!(
        jobs = %store.jobs_root().display(),
        logs = %store.logs_root().display(),
        "Dropbox ready"
    );

    let registry = Arc::new(JobRegistry::new());
    let queue = JobQueue::new();
    let mut pool = WorkerPool::new(
        config.workers.count,
        queue.clone(),
        Arc::clone(&registry),
        executor,
    );

    let state = Arc::new(AppState::new(config, store, registry, queue, pool.monitor()));
    state.validate()?;

    pool.start()?;
    Ok((build_router(state), pool))
}

/// Build the API router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    let max_upload_size = usize::try_from(state.config.storage.max_upload_size).unwrap_or(usize::MAX);

    routes::build_router(max_upload_size)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
