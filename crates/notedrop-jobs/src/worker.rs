//! Worker pool for processing queued jobs

use crate::error::{JobError, JobResult};
use crate::executor::{ExecutionRequest, Executor};
use crate::queue::JobQueue;
use crate::registry::JobRegistry;
use crate::types::{Job, JobStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Read-only view of a running pool, cheap to clone into request handlers
#[derive(Debug, Clone)]
pub struct PoolMonitor {
    worker_count: usize,
    active: Arc<AtomicUsize>,
    queue: JobQueue,
}

impl PoolMonitor {
    /// Number of workers the pool runs
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Workers currently holding a job
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Jobs waiting in the queue
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }
}

/// Fixed-size pool of workers draining the job queue
pub struct WorkerPool {
    /// Number of workers, at least one
    worker_count: usize,

    /// Source of work
    queue: JobQueue,

    /// Status record
    registry: Arc<JobRegistry>,

    /// Execution adapter shared by all workers
    executor: Arc<dyn Executor>,

    /// Cancelled on shutdown; executions get child tokens
    shutdown: CancellationToken,

    /// Workers currently holding a job
    active: Arc<AtomicUsize>,

    /// Worker handles
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a new worker pool
    ///
    /// `worker_count` is clamped to at least one.
    pub fn new(
        worker_count: usize,
        queue: JobQueue,
        registry: Arc<JobRegistry>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        Self {
            worker_count: worker_count.max(1),
            queue,
            registry,
            executor,
            shutdown: CancellationToken::new(),
            active: Arc::new(AtomicUsize::new(0)),
            workers: Vec::new(),
        }
    }

    /// Start the worker pool
    ///
    /// # Errors
    ///
    /// Returns an error if the pool is already running.
    pub fn start(&mut self) -> JobResult<()> {
        if !self.workers.is_empty() {
            return Err(JobError::worker_pool("Worker pool already started"));
        }

        info!(
            workers = self.worker_count,
            executor = self.executor.name(),
            "Starting worker pool"
        );

        for index in 0..self.worker_count {
            let worker = Worker {
                index,
                queue: self.queue.clone(),
                registry: Arc::clone(&self.registry),
                executor: Arc::clone(&self.executor),
                shutdown: self.shutdown.clone(),
                active: Arc::clone(&self.active),
            };
            self.workers.push(tokio::spawn(worker.run()));
        }

        Ok(())
    }

    /// Number of workers
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Workers currently holding a job
    pub fn active_jobs(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Get queue depth
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Whether workers have been started
    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Shared view for status reporting
    pub fn monitor(&self) -> PoolMonitor {
        PoolMonitor {
            worker_count: self.worker_count,
            active: Arc::clone(&self.active),
            queue: self.queue.clone(),
        }
    }

    /// Shutdown the worker pool
    ///
    /// In-flight executions are cancelled and their jobs end in `error`.
    /// Jobs still queued are left `pending`.
    ///
    /// # Errors
    ///
    /// Returns an error if a worker task did not exit cleanly.
    pub async fn shutdown(mut self) -> JobResult<()> {
        info!(
            pending = self.queue.len(),
            active = self.active_jobs(),
            "Shutting down worker pool"
        );

        self.shutdown.cancel();
        self.queue.close();

        let mut failed = 0;
        for (index, worker) in self.workers.drain(..).enumerate() {
            if let Err(e) = worker.await {
                warn!(worker = index, error = %e, "Worker failed to shutdown cleanly");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(JobError::worker_pool(format!(
                "{failed} worker(s) failed to shutdown cleanly"
            )));
        }

        info!("Worker pool shut down");
        Ok(())
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("executor", &self.executor.name())
            .field("active", &self.active_jobs())
            .field("queued", &self.queue.len())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

struct Worker {
    index: usize,
    queue: JobQueue,
    registry: Arc<JobRegistry>,
    executor: Arc<dyn Executor>,
    shutdown: CancellationToken,
    active: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(self) {
        info!(worker = self.index, "Worker started");

        loop {
            let job = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                job = self.queue.dequeue() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            self.process(job).await;
        }

        info!(worker = self.index, "Worker shutting down");
    }

    async fn process(&self, job: Job) {
        if let Err(e) = self
            .registry
            .update_status(&job.id, JobStatus::Processing, None)
        {
            error!(worker = self.index, job_id = %job.id, error = %e, "Cannot claim job, skipping");
            return;
        }

        self.active.fetch_add(1, Ordering::SeqCst);
        info!(
            worker = self.index,
            job_id = %job.id,
            file = %job.original_filename,
            "Worker picked up job"
        );

        let request = ExecutionRequest::from(&job);
        let executor = Arc::clone(&self.executor);
        let cancel = self.shutdown.child_token();
        let outcome =
            tokio::spawn(async move { executor.execute(&request, &cancel).await }).await;

        let (status, failure) = match outcome {
            Ok(Ok(())) => {
                info!(worker = self.index, job_id = %job.id, "Job completed");
                (JobStatus::Completed, None)
            }
            Ok(Err(e)) => {
                if e.is_execution_failure() {
                    warn!(worker = self.index, job_id = %job.id, error = %e, "Job failed");
                } else {
                    error!(worker = self.index, job_id = %job.id, error = %e, "Job failed");
                }
                (JobStatus::Error, Some(e.to_string()))
            }
            Err(join_error) => {
                let message = describe_join_error(join_error);
                error!(worker = self.index, job_id = %job.id, error = %message, "Execution task aborted");
                (JobStatus::Error, Some(message))
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);

        if let Err(e) = self.registry.update_status(&job.id, status, failure) {
            error!(worker = self.index, job_id = %job.id, error = %e, "Failed to record job outcome");
        }
    }
}

fn describe_join_error(err: JoinError) -> String {
    if !err.is_panic() {
        return "Execution task was cancelled".to_string();
    }

    let payload = err.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    format!("Execution adapter panicked: {detail}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::MockExecutor;
    use crate::types::{JobMetadata, JobPaths, new_job_id};
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tempfile::TempDir;

    fn submit(dir: &TempDir, registry: &JobRegistry, queue: &JobQueue) -> String {
        let id = new_job_id();
        let job = Job::new(
            id.clone(),
            "a.wav",
            JobPaths {
                job_dir: dir.path().to_path_buf(),
                audio_path: dir.path().join(format!("{id}.wav")),
                output_path: dir.path().join(format!("{id}-notes.md")),
                log_path: dir.path().join(format!("{id}.log")),
            },
            JobMetadata::default(),
        );
        registry.put(job.clone()).unwrap();
        queue.enqueue(job).unwrap();
        id
    }

    async fn wait_for_terminal(registry: &JobRegistry, id: &str) -> Job {
        for _ in 0..500 {
            let job = registry.get(id).unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never reached a terminal state");
    }

    #[test]
    fn test_worker_count_is_clamped() {
        let pool = WorkerPool::new(
            0,
            JobQueue::new(),
            Arc::new(JobRegistry::new()),
            Arc::new(MockExecutor::new()),
        );
        assert_eq!(pool.worker_count(), 1);
        assert_eq!(pool.queue_depth(), 0);
        assert!(!pool.is_running());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let mut pool = WorkerPool::new(
            1,
            JobQueue::new(),
            Arc::new(JobRegistry::new()),
            Arc::new(MockExecutor::new()),
        );
        pool.start().unwrap();
        assert!(pool.start().is_err());
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_job_completes() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(JobRegistry::new());
        let queue = JobQueue::new();
        let executor = MockExecutor::new();

        let mut pool = WorkerPool::new(
            1,
            queue.clone(),
            Arc::clone(&registry),
            Arc::new(executor.clone()),
        );
        pool.start().unwrap();

        let id = submit(&dir, &registry, &queue);
        let job = wait_for_terminal(&registry, &id).await;

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
        assert!(job.output_path.exists());
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_worker_continues() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(JobRegistry::new());
        let queue = JobQueue::new();
        let executor = MockExecutor::new().with_failure("Transcription failed (exit code 2).");

        let mut pool = WorkerPool::new(
            1,
            queue.clone(),
            Arc::clone(&registry),
            Arc::new(executor.clone()),
        );
        pool.start().unwrap();

        let first = submit(&dir, &registry, &queue);
        let second = submit(&dir, &registry, &queue);

        for id in [first, second] {
            let job = wait_for_terminal(&registry, &id).await;
            assert_eq!(job.status, JobStatus::Error);
            assert_eq!(
                job.error.as_deref(),
                Some("Transcription failed (exit code 2).")
            );
        }
        assert_eq!(executor.finished_count(), 2);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_panic_is_recorded_and_worker_continues() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(JobRegistry::new());
        let queue = JobQueue::new();
        let executor = MockExecutor::new().with_panic("adapter exploded");

        let mut pool = WorkerPool::new(
            1,
            queue.clone(),
            Arc::clone(&registry),
            Arc::new(executor.clone()),
        );
        pool.start().unwrap();

        let first = submit(&dir, &registry, &queue);
        let second = submit(&dir, &registry, &queue);

        for id in [first, second] {
            let job = wait_for_terminal(&registry, &id).await;
            assert_eq!(job.status, JobStatus::Error);
            assert_eq!(
                job.error.as_deref(),
                Some("Execution adapter panicked: adapter exploded")
            );
        }
        assert_eq!(pool.active_jobs(), 0);
        pool.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_monitor_reflects_pool() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(JobRegistry::new());
        let queue = JobQueue::new();
        let executor = MockExecutor::new().with_delay(Duration::from_secs(30));

        let mut pool = WorkerPool::new(
            1,
            queue.clone(),
            Arc::clone(&registry),
            Arc::new(executor.clone()),
        );
        let monitor = pool.monitor();
        pool.start().unwrap();

        let running = submit(&dir, &registry, &queue);
        let waiting = submit(&dir, &registry, &queue);

        for _ in 0..500 {
            if monitor.active_jobs() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(monitor.worker_count(), 1);
        assert_eq!(monitor.active_jobs(), 1);
        assert_eq!(monitor.queue_depth(), 1);

        pool.shutdown().await.unwrap();

        let running = registry.get(&running).unwrap();
        assert_eq!(running.status, JobStatus::Error);
        assert_eq!(running.error.as_deref(), Some("Worker cancelled."));
        assert_eq!(registry.get(&waiting).unwrap().status, JobStatus::Pending);
        assert_eq!(monitor.active_jobs(), 0);
    }
}
