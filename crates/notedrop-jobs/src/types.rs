//! Core types for the job pipeline

use crate::error::{JobError, JobResult};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Job status enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Waiting in the queue
    #[default]
    Pending,
    /// Claimed by a worker, external command running
    Processing,
    /// External command exited successfully
    Completed,
    /// Execution failed or was cancelled
    Error,
}

impl JobStatus {
    /// Whether no further transitions can happen
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// The lifecycle is `pending -> processing -> {completed | error}`
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed | Self::Error)
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Caller supplied execution parameters, passed through untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobMetadata {
    /// Opaque option tokens appended to the command line
    pub options: Vec<String>,
    /// Resolved output filename inside the job directory
    pub output_name: String,
}

/// Server controlled locations for one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    /// Per-job directory
    pub job_dir: PathBuf,
    /// Uploaded media file
    pub audio_path: PathBuf,
    /// Artifact written by the transcription command
    pub output_path: PathBuf,
    /// Combined stdout/stderr of the transcription command
    pub log_path: PathBuf,
}

/// A submitted media file and its lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier
    pub id: String,

    /// Submission timestamp
    pub created_at: DateTime<Utc>,

    /// Filename as supplied by the client
    pub original_filename: String,

    /// Per-job directory
    pub job_dir: PathBuf,

    /// Uploaded media file
    pub audio_path: PathBuf,

    /// Transcription artifact
    pub output_path: PathBuf,

    /// Execution log
    pub log_path: PathBuf,

    /// Current status
    pub status: JobStatus,

    /// Failure description, set only in the `error` state
    pub error: Option<String>,

    /// Options and resolved output name
    pub metadata: JobMetadata,
}

impl Job {
    /// Create a pending job
    pub fn new(
        id: impl Into<String>,
        original_filename: impl Into<String>,
        paths: JobPaths,
        metadata: JobMetadata,
    ) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            original_filename: original_filename.into(),
            job_dir: paths.job_dir,
            audio_path: paths.audio_path,
            output_path: paths.output_path,
            log_path: paths.log_path,
            status: JobStatus::Pending,
            error: None,
            metadata,
        }
    }

    /// Move to `next`, keeping `error` in step with the status
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidTransition`] when the lifecycle forbids the move.
    pub fn transition(&mut self, next: JobStatus, error: Option<String>) -> JobResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(JobError::invalid_transition(&self.id, self.status, next));
        }

        self.status = next;
        self.error = if next == JobStatus::Error {
            Some(error.unwrap_or_else(|| "Unknown error".to_string()))
        } else {
            None
        };
        Ok(())
    }

    /// `created_at` as ISO-8601 UTC with a trailing `Z`
    pub fn created_at_iso(&self) -> String {
        format_timestamp(self.created_at)
    }
}

/// Generate a fresh job identifier (32 lowercase hex characters)
pub fn new_job_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Format a timestamp the way job responses expose it
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Number of jobs in each status
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCounts {
    /// Jobs waiting in the queue
    pub pending: usize,
    /// Jobs currently executing
    pub processing: usize,
    /// Jobs finished successfully
    pub completed: usize,
    /// Jobs that failed
    pub error: usize,
}

impl StatusCounts {
    /// Count one more job with `status`
    pub const fn record(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Error => self.error += 1,
        }
    }

    /// Total number of jobs
    pub const fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.error
    }
}
