//! Public exposure through `tailscale serve` and `tailscale funnel`
//!
//! The tailscale CLI is treated as an opaque external tool: the server only
//! checks that it is installed and runs the commands.

use notedrop_core::{Error, Result, TunnelConfig};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

/// Default program name looked up on `PATH`
pub const TAILSCALE: &str = "tailscale";

/// Manages the HTTPS funnel in front of the local server
#[derive(Debug, Clone)]
pub struct Tunnel {
    program: PathBuf,
    https_port: u16,
    target: String,
    leave_running: bool,
}

impl Tunnel {
    /// Tunnel forwarding `https_port` to the local server on `server_port`
    pub fn from_config(config: &TunnelConfig, server_port: u16) -> Self {
        Self {
            program: PathBuf::from(TAILSCALE),
            https_port: config.https_port,
            target: format!("http://{}:{server_port}", config.serve_host),
            leave_running: config.leave_running,
        }
    }

    /// Use a different CLI binary
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Local URL the funnel forwards to
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Arguments for `tailscale serve`
    pub fn serve_args(&self) -> Vec<String> {
        vec![
            "serve".to_string(),
            format!("--https={}", self.https_port),
            "/".to_string(),
            self.target.clone(),
        ]
    }

    /// Arguments for `tailscale funnel ... on|off`
    pub fn funnel_args(&self, enable: bool) -> Vec<String> {
        vec![
            "funnel".to_string(),
            format!("--https={}", self.https_port),
            if enable { "on" } else { "off" }.to_string(),
        ]
    }

    /// Configure serve and turn the funnel on
    ///
    /// # Errors
    ///
    /// Returns an error if the CLI is not installed or either command fails.
    pub async fn enable(&self) -> Result<()> {
        if find_executable(&self.program).is_none() {
            return Err(Error::Other(format!(
                "{} CLI not found. Install tailscale or run without --tunnel.",
                self.program.display()
            )));
        }

        self.run(&self.serve_args()).await?;
        self.run(&self.funnel_args(true)).await?;
        info!(https_port = self.https_port, target = %self.target, "Tailscale funnel enabled");
        Ok(())
    }

    /// Turn the funnel off unless configured to leave it running
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn disable(&self) {
        if self.leave_running {
            info!(https_port = self.https_port, "Leaving tailscale funnel running");
            return;
        }

        match self.run(&self.funnel_args(false)).await {
            Ok(()) => info!(https_port = self.https_port, "Tailscale funnel disabled"),
            Err(e) => warn!(error = %e, "Failed to disable tailscale funnel"),
        }
    }

    async fn run(&self, args: &[String]) -> Result<()> {
        let status = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::Other(format!(
                "`{} {}` failed with {status}",
                self.program.display(),
                args.join(" ")
            )))
        }
    }
}

/// Resolve `program` the way a shell would: paths are checked directly,
/// bare names are searched on `PATH`
pub fn find_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.is_file().then(|| program.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    find_in(program.as_os_str(), &path)
}

fn find_in(program: &OsStr, path: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
