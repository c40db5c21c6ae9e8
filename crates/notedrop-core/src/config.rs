//! Configuration management for the notedrop server

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Name of the staging directory, relative to the dropbox root
pub const STAGING_DIR: &str = ".staging";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Dropbox storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Worker pool configuration
    #[serde(default)]
    pub workers: WorkerConfig,

    /// External transcription command configuration
    #[serde(default)]
    pub executor: ExecutorConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Tunnel exposure configuration
    #[serde(default)]
    pub tunnel: TunnelConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally visible base URL used for the links in upload responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

/// Dropbox storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory holding jobs and logs
    #[serde(default = "default_dropbox_dir")]
    pub dropbox_dir: PathBuf,

    /// Jobs directory (relative to `dropbox_dir`)
    #[serde(default = "default_jobs_dir")]
    pub jobs_dir: String,

    /// Logs directory (relative to `dropbox_dir`)
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,

    /// Maximum upload body size in bytes
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of concurrent transcription workers
    #[serde(default = "default_worker_count")]
    pub count: usize,
}

/// External transcription command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Program invoked as `<command> <audio> <output> [options...]`
    #[serde(default = "default_command")]
    pub command: PathBuf,

    /// Working directory for the command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Environment defaults, applied only when the variable is not already set
    #[serde(default = "default_executor_env")]
    pub env: HashMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or text)
    #[serde(default = "default_log_format")]
    pub format: String,
}

/// Tunnel exposure through the `tailscale` CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelConfig {
    /// Configure serve/funnel before starting
    #[serde(default)]
    pub enabled: bool,

    /// Public HTTPS port
    #[serde(default = "default_https_port")]
    pub https_port: u16,

    /// Host used in the serve target URL
    #[serde(default = "default_serve_host")]
    pub serve_host: String,

    /// Leave the funnel enabled on shutdown
    #[serde(default)]
    pub leave_running: bool,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8000
}

fn default_dropbox_dir() -> PathBuf {
    PathBuf::from("./dropbox")
}

fn default_jobs_dir() -> String {
    "jobs".to_string()
}

fn default_logs_dir() -> String {
    "logs".to_string()
}

const fn default_max_upload_size() -> u64 {
    4 * 1024 * 1024 * 1024 // 4 GiB, meeting recordings get large
}

const fn default_worker_count() -> usize {
    1
}

fn default_command() -> PathBuf {
    PathBuf::from("scripts/meeting-notes.sh")
}

fn default_executor_env() -> HashMap<String, String> {
    HashMap::from([("UV_TORCH_VARIANT".to_string(), "cu124".to_string())])
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

const fn default_https_port() -> u16 {
    443
}

fn default_serve_host() -> String {
    "127.0.0.1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dropbox_dir: default_dropbox_dir(),
            jobs_dir: default_jobs_dir(),
            logs_dir: default_logs_dir(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl StorageConfig {
    /// Directory holding one subdirectory per job
    #[must_use]
    pub fn jobs_root(&self) -> PathBuf {
        self.dropbox_dir.join(&self.jobs_dir)
    }

    /// Directory holding `<job_id>.log` files
    #[must_use]
    pub fn logs_root(&self) -> PathBuf {
        self.dropbox_dir.join(&self.logs_dir)
    }

    /// Directory for uploads that have not become jobs yet
    #[must_use]
    pub fn staging_root(&self) -> PathBuf {
        self.dropbox_dir.join(STAGING_DIR)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            working_dir: None,
            env: default_executor_env(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            https_port: default_https_port(),
            serve_host: default_serve_host(),
            leave_running: false,
        }
    }
}

impl Config {
    /// Load configuration from an optional file and `NOTEDROP_*` environment variables
    ///
    /// Without an explicit path, `notedrop.toml` in the working directory is
    /// read when present. Nested keys use a double underscore, e.g.
    /// `NOTEDROP_SERVER__PORT=9000`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or parsed.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path).required(true),
            None => config::File::with_name("notedrop").required(false),
        };

        let config = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("NOTEDROP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(config.try_deserialize()?)
    }

    /// Check the values that would otherwise fail late at runtime
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the offending field.
    pub fn validate(&self) -> crate::Result<()> {
        if self.workers.count == 0 {
            return Err(crate::Error::Validation {
                field: "workers.count".to_string(),
                message: "at least one worker is required".to_string(),
            });
        }
        if self.server.port == 0 {
            return Err(crate::Error::Validation {
                field: "server.port".to_string(),
                message: "port must be non-zero".to_string(),
            });
        }
        if self.executor.command.as_os_str().is_empty() {
            return Err(crate::Error::Validation {
                field: "executor.command".to_string(),
                message: "transcription command must be set".to_string(),
            });
        }
        if self.storage.max_upload_size == 0 {
            return Err(crate::Error::Validation {
                field: "storage.max_upload_size".to_string(),
                message: "upload size limit must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}
