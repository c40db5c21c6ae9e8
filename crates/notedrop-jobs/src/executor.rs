//! Execution adapter: runs the external transcription command for a job

use crate::error::{JobError, JobResult};
use crate::types::Job;
use async_trait::async_trait;
use notedrop_core::ExecutorConfig;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Everything an executor needs to process one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Job identifier, used for logging
    pub job_id: String,
    /// Input media
    pub audio_path: PathBuf,
    /// Where the command must write its artifact
    pub output_path: PathBuf,
    /// Destination for the command's combined output
    pub log_path: PathBuf,
    /// Opaque option tokens appended after the two paths
    pub options: Vec<String>,
}

impl From<&Job> for ExecutionRequest {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            audio_path: job.audio_path.clone(),
            output_path: job.output_path.clone(),
            log_path: job.log_path.clone(),
            options: job.metadata.options.clone(),
        }
    }
}

/// Boundary to the transcription tool
///
/// Implementations report success with `Ok(())`. Any error is recorded on the
/// job verbatim via its `Display` text. When `cancel` fires, implementations
/// must stop work, release what they hold and return [`JobError::Cancelled`].
#[async_trait]
pub trait Executor: Send + Sync {
    /// Process one job to completion
    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> JobResult<()>;

    /// Executor name, for logs
    fn name(&self) -> &str;
}

/// Runs `<command> <audio_path> <output_path> [options...]` as a subprocess
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    command: PathBuf,
    working_dir: Option<PathBuf>,
    env_defaults: HashMap<String, String>,
}

impl CommandExecutor {
    /// Executor for `command` with no working directory or environment defaults
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            working_dir: None,
            env_defaults: HashMap::new(),
        }
    }

    /// Executor built from the `[executor]` configuration section
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            command: config.command.clone(),
            working_dir: config.working_dir.clone(),
            env_defaults: config.env.clone(),
        }
    }

    /// Run the command from `dir`
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set `key=value` for the child unless the server environment already has `key`
    pub fn with_env_default(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_defaults.insert(key.into(), value.into());
        self
    }

    /// Configured program
    pub fn command(&self) -> &Path {
        &self.command
    }

    fn build_command(&self, request: &ExecutionRequest, log: File) -> JobResult<Command> {
        let stderr = log.try_clone()?;

        let mut command = Command::new(&self.command);
        command
            .arg(&request.audio_path)
            .arg(&request.output_path)
            .args(&request.options)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true);

        // Own process group so cancellation reaches whatever the command spawns
        #[cfg(unix)]
        command.process_group(0);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        for (key, value) in &self.env_defaults {
            if std::env::var_os(key).is_none() {
                command.env(key, value);
            }
        }

        Ok(command)
    }
}

#[async_trait]
impl Executor for CommandExecutor {
    async fn execute(
        &self,
        request: &ExecutionRequest,
        cancel: &CancellationToken,
    ) -> JobResult<()> {
        let log = open_log(&request.log_path).await?;

        let mut command = self.build_command(request, log)?;
        let mut child = command
            .spawn()
            .map_err(|e| JobError::spawn(&self.command, e))?;

        info!(
            job_id = %request.job_id,
            pid = child.id(),
            command = %self.command.display(),
            "Started transcription command"
        );

        tokio::select! {
            status = child.wait() => {
                let status = status?;
                if status.success() {
                    debug!(job_id = %request.job_id, "Transcription command succeeded");
                    Ok(())
                } else {
                    Err(JobError::execution_failed(describe_failure(status, &request.log_path)))
                }
            }
            () = cancel.cancelled() => {
                warn!(job_id = %request.job_id, "Cancelling transcription command");
                kill_process_group(&child, &request.job_id);
                if let Err(e) = child.kill().await {
                    warn!(job_id = %request.job_id, error = %e, "Failed to kill transcription command");
                }
                Err(JobError::Cancelled)
            }
        }
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Create the log file, and its directory if needed, for the child's output
async fn open_log(path: &Path) -> JobResult<File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file = tokio::fs::File::create(path).await?;
    Ok(file.into_std().await)
}

/// SIGKILL the command's process group, taking any processes it started with it
#[cfg(unix)]
fn kill_process_group(child: &Child, job_id: &str) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        warn!(job_id, pgid = pid, error = %e, "Failed to kill transcription process group");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child, _job_id: &str) {}

/// Failure text recorded on the job for a non-successful exit
pub fn describe_failure(status: ExitStatus, log_path: &Path) -> String {
    let reason = status
        .code()
        .map_or_else(|| describe_signal(status), |code| format!("exit code {code}"));
    format!(
        "Transcription failed ({reason}). See {} for details.",
        log_path.display()
    )
}

#[cfg(unix)]
fn describe_signal(status: ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;

    status
        .signal()
        .map_or_else(|| "unknown status".to_string(), |signal| format!("terminated by signal {signal}"))
}

#[cfg(not(unix))]
fn describe_signal(_status: ExitStatus) -> String {
    "unknown status".to_string()
}
