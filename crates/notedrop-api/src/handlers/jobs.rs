//! Job status and artifact download endpoints

use super::attachment;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    response::Response,
};
use notedrop_jobs::{Job, JobStatus};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::sync::Arc;
use tracing::{error, warn};

/// Job status payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    /// Job identifier
    pub job_id: String,
    /// Current status
    pub status: JobStatus,
    /// Submission time, ISO-8601 UTC with a trailing `Z`
    pub created_at: String,
    /// Filename as supplied by the client
    pub original_filename: String,
    /// Failure description, present only for failed jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Server path of the artifact, present only for completed jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
}

impl From<&Job> for StatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
            created_at: job.created_at_iso(),
            original_filename: job.original_filename.clone(),
            error: match job.status {
                JobStatus::Error => job.error.clone(),
                _ => None,
            },
            result_path: match job.status {
                JobStatus::Completed => Some(job.output_path.display().to_string()),
                _ => None,
            },
        }
    }
}

fn lookup(state: &AppState, job_id: &str) -> ApiResult<Job> {
    state
        .registry
        .get(job_id)
        .ok_or_else(ApiError::job_not_found)
}

/// Current state of a job
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<StatusResponse>> {
    let job = lookup(&state, &job_id)?;
    Ok(Json(StatusResponse::from(&job)))
}

/// Download the transcription artifact of a completed job
pub async fn get_result(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job = lookup(&state, &job_id)?;
    if job.status != JobStatus::Completed {
        return Err(ApiError::conflict(format!("Job status is {}.", job.status)));
    }

    let file = match tokio::fs::File::open(&job.output_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            error!(
                job_id = %job.id,
                path = %job.output_path.display(),
                "Completed job has no artifact on disk"
            );
            return Err(ApiError::internal("Transcript not found on disk."));
        }
        Err(e) => return Err(e.into()),
    };

    let filename = job
        .output_path
        .file_name()
        .map_or_else(|| job.metadata.output_name.clone(), |name| name.to_string_lossy().into_owned());
    Ok(attachment(file, "text/markdown; charset=utf-8", &filename).await?)
}

/// Download the command output of a job
pub async fn get_log(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let job = lookup(&state, &job_id)?;

    let file = match tokio::fs::File::open(&job.log_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ApiError::not_found("Log not available yet."));
        }
        Err(e) => {
            warn!(job_id = %job.id, error = %e, "Failed to open job log");
            return Err(e.into());
        }
    };

    Ok(attachment(file, "text/plain; charset=utf-8", &format!("{}.log", job.id)).await?)
}
