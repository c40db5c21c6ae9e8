//! Job pipeline for the notedrop transcription drop server
//!
//! Uploaded recordings become [`Job`]s: the [`JobStore`] lays out their files,
//! the [`JobRegistry`] tracks their status, the [`JobQueue`] hands them to a
//! [`WorkerPool`], and an [`Executor`] runs the external transcription command
//! for each one.

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    missing_docs
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::multiple_crate_versions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::significant_drop_tightening,
    clippy::return_self_not_must_use,
    clippy::redundant_pub_crate,
    clippy::uninlined_format_args
)]

pub mod error;
pub mod executor;
pub mod mock;
pub mod queue;
pub mod registry;
pub mod store;
pub mod types;
pub mod worker;

pub use error::{JobError, JobResult};
pub use executor::{CommandExecutor, ExecutionRequest, Executor};
pub use queue::JobQueue;
pub use registry::JobRegistry;
pub use store::{JobStore, resolve_output_name, sanitize_filename};
pub use types::{
    Job, JobMetadata, JobPaths, JobStatus, StatusCounts, format_timestamp, new_job_id,
};
pub use worker::{PoolMonitor, WorkerPool};

// Re-export commonly used items
pub use mock::MockExecutor;
