//! Main entry point for the notedrop drop server

#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use notedrop_api::{build_app, tunnel::Tunnel};
use notedrop_core::{Config, Error, Result, init_logging};
use notedrop_jobs::CommandExecutor;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Command line interface for the drop server
#[derive(Parser, Debug)]
#[command(
    name = "notedrop-server",
    version = env!("CARGO_PKG_VERSION"),
    about = "Drop server for meeting recordings",
    long_about = "Accepts meeting recordings over HTTP, queues them and runs the transcription command for each one in the background."
)]
struct Cli {
    /// Configuration file path (defaults to ./notedrop.toml when present)
    #[arg(short, long, value_name = "FILE", env = "NOTEDROP_CONFIG")]
    config: Option<PathBuf>,

    /// Interface to bind
    #[arg(long, env = "DROP_SERVER_HOST")]
    host: Option<String>,

    /// Local port
    #[arg(long, env = "DROP_SERVER_PORT")]
    port: Option<u16>,

    /// Maximum concurrent transcription jobs
    #[arg(long, env = "DROP_MAX_WORKERS")]
    workers: Option<usize>,

    /// Directory holding jobs and logs
    #[arg(long, value_name = "DIR", env = "MEETING_NOTES_DROPBOX")]
    dropbox: Option<PathBuf>,

    /// Transcription command, invoked as `<command> <audio> <output> [options...]`
    #[arg(long, value_name = "PROGRAM")]
    command: Option<PathBuf>,

    /// Externally visible base URL for links in upload responses
    #[arg(long, value_name = "URL")]
    public_url: Option<String>,

    /// Expose the server through tailscale serve/funnel
    #[arg(long)]
    tunnel: bool,

    /// Public HTTPS port for the funnel
    #[arg(long)]
    https_port: Option<u16>,

    /// Host used in the tailscale serve target URL
    #[arg(long)]
    serve_host: Option<String>,

    /// Do not disable the funnel on shutdown
    #[arg(long)]
    leave_tunnel: bool,

    /// Subcommand
    #[command(subcommand)]
    action: Option<Action>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
enum Action {
    /// Run the drop server (default)
    Serve,

    /// Inspect the effective configuration
    Config {
        /// Print the resolved configuration as TOML
        #[arg(short, long)]
        show: bool,
    },
}

impl Cli {
    /// Layer command line and legacy environment overrides onto `config`
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(workers) = self.workers {
            config.workers.count = workers.max(1);
        }
        if let Some(dropbox) = &self.dropbox {
            config.storage.dropbox_dir.clone_from(dropbox);
        }
        if let Some(command) = &self.command {
            config.executor.command.clone_from(command);
        }
        if let Some(url) = &self.public_url {
            config.server.public_url = Some(url.clone());
        }
        if self.tunnel {
            config.tunnel.enabled = true;
        }
        if let Some(port) = self.https_port {
            config.tunnel.https_port = port;
        }
        if let Some(host) = &self.serve_host {
            config.tunnel.serve_host.clone_from(host);
        }
        if self.leave_tunnel {
            config.tunnel.leave_running = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (for development convenience)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Note: .env file not loaded: {e}");
    }

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    match cli.action {
        Some(Action::Config { show }) => show_config(&config, show),
        Some(Action::Serve) | None => serve(config).await,
    }
}

/// Validate and optionally print the effective configuration
fn show_config(config: &Config, show: bool) -> Result<()> {
    config.validate()?;
    if show {
        let rendered = toml::to_string_pretty(config).map_err(|e| Error::Configuration {
            message: format!("Failed to serialize configuration: {e}"),
        })?;
        println!("{rendered}");
    } else {
        println!("Configuration is valid");
    }
    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    init_logging(&config.logging)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        workers = config.workers.count,
        dropbox = %config.storage.dropbox_dir.display(),
        command = %config.executor.command.display(),
        "Starting notedrop server"
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::Configuration {
            message: format!("Invalid server address: {e}"),
        })?;

    let tunnel = config
        .tunnel
        .enabled
        .then(|| Tunnel::from_config(&config.tunnel, config.server.port));

    let executor = Arc::new(CommandExecutor::from_config(&config.executor));
    let (app, pool) = build_app(config, executor)?;

    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "Listening");

    if let Some(tunnel) = &tunnel {
        if let Err(e) = tunnel.enable().await {
            error!(error = %e, "Failed to expose server through tailscale");
            pool.shutdown().await?;
            return Err(e);
        }
    }

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Some(tunnel) = &tunnel {
        tunnel.disable().await;
    }

    if let Err(e) = pool.shutdown().await {
        warn!(error = %e, "Worker pool did not shut down cleanly");
    }

    served.map_err(|e| Error::Other(format!("Server error: {e}")))?;
    info!("Server shutdown complete");
    Ok(())
}

/// Handle graceful shutdown signals
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received terminate signal, shutting down gracefully...");
        },
    }
}
