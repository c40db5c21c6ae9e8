//! HTTP error responses
//!
//! Every error body has the shape `{"detail": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use notedrop_jobs::JobError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Result type alias for handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Human readable message
    pub detail: String,
}

/// Errors surfaced to HTTP clients
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request is malformed; nothing was created
    #[error("{0}")]
    BadRequest(String),

    /// The job or file does not exist
    #[error("{0}")]
    NotFound(String),

    /// The job is not in a state that allows the request
    #[error("{0}")]
    Conflict(String),

    /// The upload exceeds the configured size limit
    #[error("{0}")]
    PayloadTooLarge(String),

    /// The server is shutting down and no longer takes work
    #[error("{0}")]
    Unavailable(String),

    /// Internal inconsistency or I/O failure
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// The unknown-job error every lookup returns
    pub fn job_not_found() -> Self {
        Self::not_found("Job not found.")
    }

    /// HTTP status for this error
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), detail = %self, "Request failed");
        }

        let body = ErrorResponse {
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound { .. } => Self::job_not_found(),
            JobError::InvalidFilename { .. } => {
                Self::bad_request("Uploaded file must have a filename.")
            }
            JobError::QueueClosed => Self::Unavailable("Server is shutting down.".to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(format!("I/O error: {err}"))
    }
}
