//! Application state management

use notedrop_core::{Config, Error, Result};
use notedrop_jobs::{JobQueue, JobRegistry, JobStore, PoolMonitor};
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Filesystem layout for job artifacts
    pub store: JobStore,
    /// Authoritative job status record
    pub registry: Arc<JobRegistry>,
    /// Hand-off to the worker pool
    pub queue: JobQueue,
    /// Worker pool statistics
    pub pool: PoolMonitor,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: Config,
        store: JobStore,
        registry: Arc<JobRegistry>,
        queue: JobQueue,
        pool: PoolMonitor,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            queue,
            pool,
            started_at: Instant::now(),
        }
    }

    /// Seconds since the state was created
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Check that the dropbox directories exist and are writable
    ///
    /// # Errors
    ///
    /// Returns an error if a directory is missing or a probe file cannot be
    /// written to it.
    pub fn validate(&self) -> Result<()> {
        for dir in [
            self.store.jobs_root(),
            self.store.logs_root(),
            self.store.staging_root(),
        ] {
            if !dir.is_dir() {
                return Err(Error::Configuration {
                    message: format!("Dropbox directory does not exist: {}", dir.display()),
                });
            }

            let probe = dir.join(".write_test");
            std::fs::write(&probe, "test")?;
            std::fs::remove_file(&probe)?;
        }

        Ok(())
    }
}
