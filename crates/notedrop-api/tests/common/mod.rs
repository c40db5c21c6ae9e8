//! Test helpers for driving the router without a socket

#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use notedrop_core::Config;
use notedrop_jobs::{Executor, WorkerPool};
use std::path::Path;
use std::sync::{Arc, Once};
use tempfile::TempDir;
use tokio::time::{Duration, sleep};
use tower::ServiceExt;

/// Multipart boundary used by [`multipart_body`]
pub const BOUNDARY: &str = "----notedrop-test-boundary";

static INIT_LOGGER: Once = Once::new();

/// Initialize test logging (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// One multipart form part
pub enum Part<'a> {
    /// A file upload
    File {
        /// Field name
        name: &'a str,
        /// Client filename
        filename: &'a str,
        /// File content
        content: &'a [u8],
    },
    /// A plain text field
    Text {
        /// Field name
        name: &'a str,
        /// Field value
        value: &'a str,
    },
}

/// Encode `parts` as a `multipart/form-data` body
pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::File {
                name,
                filename,
                content,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: audio/wav\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(content);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}")
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// A running app on a temporary dropbox
pub struct TestServer {
    /// Dropbox root
    pub dir: TempDir,
    /// Router under test
    pub app: Router,
    /// Worker pool, shut down by [`TestServer::shutdown`]
    pub pool: Option<WorkerPool>,
}

impl TestServer {
    /// Start with default configuration and `executor`
    pub fn start(executor: Arc<dyn Executor>) -> Self {
        Self::start_with(executor, |_| {})
    }

    /// Start after letting `customize` adjust the configuration
    pub fn start_with(executor: Arc<dyn Executor>, customize: impl FnOnce(&mut Config)) -> Self {
        init_test_logging();

        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.dropbox_dir = dir.path().to_path_buf();
        customize(&mut config);

        let (app, pool) = notedrop_api::build_app(config, executor).unwrap();
        Self {
            dir,
            app,
            pool: Some(pool),
        }
    }

    /// Jobs root inside the dropbox
    pub fn jobs_dir(&self) -> std::path::PathBuf {
        self.dir.path().join("jobs")
    }

    /// Staging directory inside the dropbox
    pub fn staging_dir(&self) -> std::path::PathBuf {
        self.dir.path().join(".staging")
    }

    /// Send a request through the router
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(request).await.unwrap()
    }

    /// `GET uri`
    pub async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    /// `POST /upload` with the given parts
    pub async fn upload(&self, parts: &[Part<'_>]) -> Response<Body> {
        let request = Request::post("/upload")
            .header(header::HOST, "drop.test:8000")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(multipart_body(parts)))
            .unwrap();
        self.send(request).await
    }

    /// Upload `content` as `filename` and return the new job id
    pub async fn upload_file(&self, filename: &str, content: &[u8]) -> String {
        let response = self
            .upload(&[Part::File {
                name: "file",
                filename,
                content,
            }])
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        json(response).await["job_id"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Poll `/status/{id}` until the job is completed or failed
    pub async fn wait_for_terminal(&self, job_id: &str) -> serde_json::Value {
        for _ in 0..1000 {
            let status = json(self.get(&format!("/status/{job_id}")).await).await;
            if matches!(status["status"].as_str(), Some("completed" | "error")) {
                return status;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached a terminal state");
    }

    /// Stop the worker pool
    pub async fn shutdown(mut self) {
        if let Some(pool) = self.pool.take() {
            pool.shutdown().await.unwrap();
        }
    }
}

/// Read the whole response body
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

/// Read the response body as JSON
pub async fn json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Header value as a string
pub fn header_str<'a>(response: &'a Response<Body>, name: header::HeaderName) -> &'a str {
    response.headers()[name].to_str().unwrap()
}

/// Number of entries in a directory
pub fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}

/// Write an executable shell script standing in for the transcription command
#[cfg(unix)]
pub fn script(dir: &Path, body: &str) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("meeting-notes.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
