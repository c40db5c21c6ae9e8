//! In-memory job registry
//!
//! The registry is the authoritative record of every job's status for the
//! lifetime of the process. Nothing is persisted and nothing is evicted.

use crate::error::{JobError, JobResult};
use crate::types::{Job, JobStatus, StatusCounts};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Thread-safe map from job identifier to job record
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job
    ///
    /// # Errors
    ///
    /// Returns [`JobError::Duplicate`] if the identifier is already taken.
    pub fn put(&self, job: Job) -> JobResult<()> {
        let mut jobs = self.jobs.write();
        if jobs.contains_key(&job.id) {
            return Err(JobError::duplicate(&job.id));
        }
        debug!(job_id = %job.id, "Registered job");
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    /// Snapshot of a job
    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs.read().get(id).cloned()
    }

    /// Change a job's status and error together
    ///
    /// Returns the updated snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::NotFound`] for unknown identifiers and
    /// [`JobError::InvalidTransition`] when the lifecycle forbids the move;
    /// the job is left untouched in both cases.
    pub fn update_status(
        &self,
        id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> JobResult<Job> {
        let mut jobs = self.jobs.write();
        let job = jobs.get_mut(id).ok_or_else(|| JobError::not_found(id))?;
        job.transition(status, error)?;
        Ok(job.clone())
    }

    /// Number of registered jobs
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    /// Whether no job has been registered yet
    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }

    /// Jobs per status
    pub fn counts(&self) -> StatusCounts {
        let jobs = self.jobs.read();
        let mut counts = StatusCounts::default();
        for job in jobs.values() {
            counts.record(job.status);
        }
        counts
    }
}
