//! Health check endpoint for monitoring

use crate::state::AppState;
use axum::{extract::State, response::Json};
use notedrop_jobs::StatusCounts;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, or `shutting_down` once the queue stops accepting jobs
    pub status: String,
    /// Service version
    pub version: String,
    /// Timestamp of the check
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Seconds since startup
    pub uptime_seconds: u64,
    /// Worker pool statistics
    pub workers: WorkerHealth,
    /// Jobs per status since startup
    pub jobs: StatusCounts,
}

/// Worker pool statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerHealth {
    /// Configured number of workers
    pub count: usize,
    /// Workers currently running a job
    pub active_jobs: usize,
    /// Jobs waiting for a worker
    pub queue_depth: usize,
}

/// Basic health check endpoint
///
/// # Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "timestamp": "2024-03-15T14:25:30Z",
///   "uptime_seconds": 3600,
///   "workers": { "count": 1, "active_jobs": 1, "queue_depth": 2 },
///   "jobs": { "pending": 2, "processing": 1, "completed": 7, "error": 0 }
/// }
/// ```
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let status = if state.queue.is_closed() {
        "shutting_down"
    } else {
        "healthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        uptime_seconds: state.uptime_seconds(),
        workers: WorkerHealth {
            count: state.pool.worker_count(),
            active_jobs: state.pool.active_jobs(),
            queue_depth: state.pool.queue_depth(),
        },
        jobs: state.registry.counts(),
    })
}
