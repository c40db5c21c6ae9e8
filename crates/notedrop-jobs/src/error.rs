//! Error types for the job pipeline

use crate::types::JobStatus;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for job operations
pub type JobResult<T> = Result<T, JobError>;

/// Errors that can occur while creating, tracking or executing jobs
#[derive(Error, Debug)]
pub enum JobError {
    /// No job with this identifier exists
    #[error("Job not found: {id}")]
    NotFound {
        /// Job identifier
        id: String,
    },

    /// A job with this identifier is already registered
    #[error("Job already exists: {id}")]
    Duplicate {
        /// Job identifier
        id: String,
    },

    /// The requested status change violates the job lifecycle
    #[error("Invalid status transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        /// Job identifier
        id: String,
        /// Current status
        from: JobStatus,
        /// Requested status
        to: JobStatus,
    },

    /// Client supplied filename has no usable name component
    #[error("Invalid filename: {name:?}")]
    InvalidFilename {
        /// The rejected name
        name: String,
    },

    /// The external command could not be started
    #[error("Failed to start transcription command {command}: {source}")]
    Spawn {
        /// Command that failed to start
        command: PathBuf,
        /// Underlying error
        #[source]
        source: io::Error,
    },

    /// The external command ran and reported failure
    #[error("{message}")]
    ExecutionFailed {
        /// Failure description including exit status and log location
        message: String,
    },

    /// Execution was interrupted by shutdown
    #[error("Worker cancelled.")]
    Cancelled,

    /// The queue no longer accepts jobs
    #[error("Job queue is closed")]
    QueueClosed,

    /// Worker pool error
    #[error("Worker pool error: {message}")]
    WorkerPool {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl JobError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a duplicate job error
    pub fn duplicate(id: impl Into<String>) -> Self {
        Self::Duplicate { id: id.into() }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(id: impl Into<String>, from: JobStatus, to: JobStatus) -> Self {
        Self::InvalidTransition {
            id: id.into(),
            from,
            to,
        }
    }

    /// Create an invalid filename error
    pub fn invalid_filename(name: impl Into<String>) -> Self {
        Self::InvalidFilename { name: name.into() }
    }

    /// Create a spawn error
    pub fn spawn(command: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Spawn {
            command: command.into(),
            source,
        }
    }

    /// Create an execution failure
    pub fn execution_failed(message: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            message: message.into(),
        }
    }

    /// Create a worker pool error
    pub fn worker_pool(message: impl Into<String>) -> Self {
        Self::WorkerPool {
            message: message.into(),
        }
    }

    /// Whether this error came from running the transcription command
    pub const fn is_execution_failure(&self) -> bool {
        matches!(
            self,
            Self::Spawn { .. } | Self::ExecutionFailed { .. } | Self::Cancelled
        )
    }
}

impl From<JobError> for notedrop_core::Error {
    fn from(err: JobError) -> Self {
        match err {
            JobError::Io(io) => Self::Io(io),
            other => Self::Other(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_creation() {
        let err = JobError::not_found("abc");
        assert!(matches!(err, JobError::NotFound { .. }));

        let err = JobError::invalid_transition("abc", JobStatus::Completed, JobStatus::Processing);
        assert!(matches!(err, JobError::InvalidTransition { .. }));

        let err = JobError::spawn(
            "/missing/cmd",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert!(matches!(err, JobError::Spawn { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = JobError::invalid_transition("abc", JobStatus::Completed, JobStatus::Processing);
        assert_eq!(
            err.to_string(),
            "Invalid status transition for job abc: completed -> processing"
        );

        assert_eq!(JobError::Cancelled.to_string(), "Worker cancelled.");

        let err = JobError::execution_failed("Transcription failed (exit code 3).");
        assert_eq!(err.to_string(), "Transcription failed (exit code 3).");
    }

    #[test]
    fn test_execution_failure_classification() {
        assert!(JobError::Cancelled.is_execution_failure());
        assert!(JobError::execution_failed("boom").is_execution_failure());
        assert!(!JobError::not_found("abc").is_execution_failure());
        assert!(!JobError::QueueClosed.is_execution_failure());
    }

    #[test]
    fn test_core_error_conversion() {
        let err: notedrop_core::Error = JobError::not_found("abc").into();
        assert_eq!(err.to_string(), "Job not found: abc");

        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: notedrop_core::Error = JobError::from(io).into();
        assert!(matches!(err, notedrop_core::Error::Io(_)));
    }
}
