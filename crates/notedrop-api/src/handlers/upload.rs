//! Upload endpoint
//!
//! The file part is streamed into a staging file first. Options and the
//! filename are validated before any job directory or registry entry exists,
//! so a rejected upload leaves nothing behind.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    Json,
    extract::{
        State,
        multipart::{Field, Multipart, MultipartError},
    },
    http::{HeaderMap, StatusCode, header},
};
use notedrop_core::ServerConfig;
use notedrop_jobs::{Job, JobMetadata, JobStatus, JobStore, new_job_id, sanitize_filename};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Response for an accepted upload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadResponse {
    /// Job identifier
    pub job_id: String,
    /// Submission time, ISO-8601 UTC with a trailing `Z`
    pub created_at: String,
    /// Always `pending` on acceptance
    pub status: JobStatus,
    /// Absolute URL of the status endpoint
    pub status_url: String,
    /// Absolute URL of the result download
    pub result_url: String,
    /// Absolute URL of the log download
    pub log_url: String,
    /// Filename as supplied by the client
    pub original_filename: String,
}

/// Accept a recording and queue it for transcription
///
/// Multipart fields:
/// * `file` (required) - the recording; its filename must be non-empty
/// * `options` (optional) - JSON array of strings passed to the command
/// * `output_name` (optional) - artifact filename, reduced to its last component
pub async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let mut upload: Option<(NamedTempFile, String)> = None;
    let mut options_raw: Option<String> = None;
    let mut output_name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let staged = stage_field(&state.store, field).await?;
                upload = Some((staged, filename));
            }
            "options" => options_raw = Some(field.text().await.map_err(multipart_error)?),
            "output_name" => output_name = Some(field.text().await.map_err(multipart_error)?),
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let (staged, original_filename) =
        upload.ok_or_else(|| ApiError::bad_request("Missing file field."))?;
    if original_filename.trim().is_empty() || sanitize_filename(&original_filename).is_none() {
        return Err(ApiError::bad_request("Uploaded file must have a filename."));
    }
    let options = parse_options(options_raw.as_deref())?;

    let job_id = new_job_id();
    let requested_output = output_name.as_deref().filter(|name| !name.trim().is_empty());
    let paths = state
        .store
        .allocate(&job_id, &original_filename, requested_output)?;

    if let Err(e) = staged.persist(&paths.audio_path) {
        warn!(job_id = %job_id, error = %e.error, "Failed to move upload into job directory");
        if let Err(cleanup) = std::fs::remove_dir_all(&paths.job_dir) {
            warn!(job_id = %job_id, error = %cleanup, "Failed to remove job directory");
        }
        return Err(ApiError::internal(format!("Failed to store upload: {}", e.error)));
    }

    let metadata = JobMetadata {
        options,
        output_name: paths
            .output_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let job = Job::new(job_id, original_filename, paths, metadata);
    state.registry.put(job.clone())?;
    state.queue.enqueue(job.clone())?;

    info!(
        job_id = %job.id,
        file = %job.original_filename,
        queue_depth = state.queue.len(),
        "Accepted upload"
    );

    let base = base_url(&state.config.server, &headers);
    Ok(Json(UploadResponse {
        status_url: format!("{base}/status/{}", job.id),
        result_url: format!("{base}/result/{}", job.id),
        log_url: format!("{base}/log/{}", job.id),
        created_at: job.created_at_iso(),
        status: job.status,
        original_filename: job.original_filename,
        job_id: job.id,
    }))
}

/// Stream a multipart field to a fresh staging file
async fn stage_field(store: &JobStore, mut field: Field<'_>) -> ApiResult<NamedTempFile> {
    let staged = store.staging_file()?;
    let mut writer = tokio::fs::File::from_std(staged.as_file().try_clone()?);

    let mut written: u64 = 0;
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;

    debug!(bytes = written, path = %staged.path().display(), "Staged upload");
    Ok(staged)
}

/// Parse the `options` field: absent or empty means no options
pub fn parse_options(raw: Option<&str>) -> ApiResult<Vec<String>> {
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return Ok(Vec::new());
    };

    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| ApiError::bad_request(format!("Invalid options payload: {e}")))?;

    let not_strings = || ApiError::bad_request("Options payload must be a JSON array of strings.");
    value
        .as_array()
        .ok_or_else(not_strings)?
        .iter()
        .map(|item| item.as_str().map(ToString::to_string).ok_or_else(not_strings))
        .collect()
}

/// Scheme and authority for absolute links in responses
///
/// A configured public URL wins; otherwise the request's `Host` header is
/// used together with `X-Forwarded-Proto` when a proxy supplies it.
pub fn base_url(server: &ServerConfig, headers: &HeaderMap) -> String {
    if let Some(public) = server.public_url.as_deref().filter(|url| !url.is_empty()) {
        return public.trim_end_matches('/').to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map_or_else(|| format!("{}:{}", server.host, server.port), ToString::to_string);
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map_or("http", str::trim);

    format!("{scheme}://{host}")
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart data: {}", err.body_text()))
    }
}
