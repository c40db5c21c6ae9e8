//! Core configuration, errors and logging for notedrop

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{
    Config, ExecutorConfig, LoggingConfig, ServerConfig, StorageConfig, TunnelConfig,
    WorkerConfig,
};
pub use error::{Error, Result};

/// Initialize the logging system
///
/// `RUST_LOG` takes precedence over the configured level. A `format` of
/// `json` emits structured lines, anything else the human-readable layout.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(logging: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if logging.format.eq_ignore_ascii_case("json") {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| Error::Other(format!("Failed to initialize logging: {e}")))
}
