//! Mock executor for testing

use crate::error::{JobError, JobResult};
use crate::executor::{ExecutionRequest, Executor};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct MockState {
    started: Vec<String>,
    finished: usize,
    running: usize,
    peak: usize,
}

/// Executor that simulates the transcription command
///
/// Clones share their recorded state, so a test can keep one handle while
/// the worker pool owns another.
#[derive(Debug, Clone)]
pub struct MockExecutor {
    /// Simulated processing time
    delay: Duration,

    /// Fail every job with this message
    failure: Option<String>,

    /// Panic with this message instead of returning
    panic_message: Option<String>,

    /// Write this content to the output path on success
    output: Option<String>,

    /// Shared observations
    state: Arc<Mutex<MockState>>,
}

impl MockExecutor {
    /// Create a mock that succeeds after 10ms and writes a small artifact
    pub fn new() -> Self {
        Self {
            delay: Duration::from_millis(10),
            failure: None,
            panic_message: None,
            output: Some("# Meeting notes\n\nMock transcription.\n".to_string()),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Set processing delay for testing
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Configure to fail every job
    pub fn with_failure(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Configure to panic inside `execute`
    pub fn with_panic(mut self, message: impl Into<String>) -> Self {
        self.panic_message = Some(message.into());
        self
    }

    /// Content written to the output path, or `None` to leave it missing
    pub fn with_output(mut self, content: Option<String>) -> Self {
        self.output = content;
        self
    }

    /// Job identifiers in the order execution started
    pub fn started_jobs(&self) -> Vec<String> {
        self.state.lock().started.clone()
    }

    /// Executions that returned, successfully or not
    pub fn finished_count(&self) -> usize {
        self.state.lock().finished
    }

    /// Executions in progress right now
    pub fn running(&self) -> usize {
        self.state.lock().running
    }

    /// Highest number of simultaneous executions observed
    pub fn peak_concurrency(&self) -> usize {
        self.state.lock().peak
    }

    async fn simulate(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> JobResult<()> {
        if let Some(message) = &self.panic_message {
            panic!("{message}");
        }

        if let Some(parent) = request.log_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(
            &request.log_path,
            format!("mock transcription of {}\n", request.audio_path.display()),
        )
        .await?;

        tokio::select! {
            () = sleep(self.delay) => {}
            () = cancel.cancelled() => return Err(JobError::Cancelled),
        }

        if let Some(message) = &self.failure {
            return Err(JobError::execution_failed(message.clone()));
        }

        if let Some(content) = &self.output {
            tokio::fs::write(&request.output_path, content).await?;
        }
        Ok(())
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps `running` accurate when execution panics or is dropped
struct RunningGuard(Arc<Mutex<MockState>>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        state.running -= 1;
        state.finished += 1;
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> JobResult<()> {
        {
            let mut state = self.state.lock();
            state.started.push(request.job_id.clone());
            state.running += 1;
            state.peak = state.peak.max(state.running);
        }
        let _guard = RunningGuard(Arc::clone(&self.state));

        self.simulate(request, cancel).await
    }

    fn name(&self) -> &str {
        "mock"
    }
}
