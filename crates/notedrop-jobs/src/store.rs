//! Filesystem layout for job artifacts
//!
//! ```text
//! <dropbox>/jobs/<%Y%m%d-%H%M%S>-<id[..8]>/<audio>       uploaded media
//! <dropbox>/jobs/<%Y%m%d-%H%M%S>-<id[..8]>/<stem>-notes.md transcription output
//! <dropbox>/logs/<id>.log                                 command output
//! <dropbox>/.staging/                                      uploads in flight
//! ```
//!
//! Each job owns its directory and log file exclusively. Other tooling reads
//! this layout, so the naming is stable.

use crate::error::{JobError, JobResult};
use crate::types::JobPaths;
use chrono::Utc;
use notedrop_core::StorageConfig;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Suffix appended to the audio stem when no output name is given
const DEFAULT_OUTPUT_SUFFIX: &str = "-notes.md";

/// Number of identifier characters used in directory names
const ID_PREFIX_LEN: usize = 8;

/// Deterministic path allocation under the dropbox root
#[derive(Debug, Clone)]
pub struct JobStore {
    jobs_root: PathBuf,
    logs_root: PathBuf,
    staging_root: PathBuf,
}

impl JobStore {
    /// Create a store rooted at explicit directories
    pub fn new(
        jobs_root: impl Into<PathBuf>,
        logs_root: impl Into<PathBuf>,
        staging_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            jobs_root: jobs_root.into(),
            logs_root: logs_root.into(),
            staging_root: staging_root.into(),
        }
    }

    /// Create a store from the storage configuration
    pub fn from_config(storage: &StorageConfig) -> Self {
        Self::new(
            storage.jobs_root(),
            storage.logs_root(),
            storage.staging_root(),
        )
    }

    /// Create the jobs, logs and staging roots
    ///
    /// # Errors
    ///
    /// Returns an error if any directory cannot be created.
    pub fn ensure_directories(&self) -> JobResult<()> {
        for directory in [&self.jobs_root, &self.logs_root, &self.staging_root] {
            std::fs::create_dir_all(directory)?;
        }
        Ok(())
    }

    /// Jobs root directory
    pub fn jobs_root(&self) -> &Path {
        &self.jobs_root
    }

    /// Logs root directory
    pub fn logs_root(&self) -> &Path {
        &self.logs_root
    }

    /// Staging directory
    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    /// Create `<jobs_root>/<UTC timestamp>-<id prefix>/`
    ///
    /// Creation is idempotent; an existing directory is reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create_job_directory(&self, id: &str) -> JobResult<PathBuf> {
        let timestamp = Utc::now().format("%Y%m%d-%H%M%S");
        let prefix: String = id.chars().take(ID_PREFIX_LEN).collect();
        let folder = self.jobs_root.join(format!("{timestamp}-{prefix}"));
        std::fs::create_dir_all(&folder)?;
        debug!(job_id = %id, dir = %folder.display(), "Created job directory");
        Ok(folder)
    }

    /// Log location for a job, independent of the job directory
    pub fn log_path(&self, id: &str) -> PathBuf {
        self.logs_root.join(format!("{id}.log"))
    }

    /// Create the job directory and compute every path the job will use
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidFilename`] if `original_filename` has no
    /// usable name, or an I/O error if the directory cannot be created.
    pub fn allocate(
        &self,
        id: &str,
        original_filename: &str,
        output_name: Option<&str>,
    ) -> JobResult<JobPaths> {
        let audio_name = sanitize_filename(original_filename)
            .ok_or_else(|| JobError::invalid_filename(original_filename))?;
        let output_name = resolve_output_name(&audio_name, output_name);

        let job_dir = self.create_job_directory(id)?;
        Ok(JobPaths {
            audio_path: job_dir.join(&audio_name),
            output_path: job_dir.join(output_name),
            log_path: self.log_path(id),
            job_dir,
        })
    }

    /// Temporary file for streaming an upload before its job exists
    ///
    /// The file lives on the same filesystem as the jobs root so it can be
    /// renamed into place, and is deleted if dropped without being persisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn staging_file(&self) -> JobResult<NamedTempFile> {
        let file = tempfile::Builder::new()
            .prefix("upload-")
            .tempfile_in(&self.staging_root)?;
        Ok(file)
    }
}

/// Reduce a client supplied name to its final path component
///
/// Both `/` and `\` count as separators. The component is kept verbatim;
/// `None` is returned when it is blank or `.`/`..`.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.trim().is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.to_string())
}

/// Output filename: the sanitized explicit name, or `<audio stem>-notes.md`
pub fn resolve_output_name(audio_name: &str, requested: Option<&str>) -> String {
    if let Some(name) = requested.and_then(sanitize_filename) {
        return name;
    }

    let stem = Path::new(audio_name)
        .file_stem()
        .map_or_else(|| audio_name.to_string(), |s| s.to_string_lossy().into_owned());
    format!("{stem}{DEFAULT_OUTPUT_SUFFIX}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::TempDir;

    fn test_store(dir: &TempDir) -> JobStore {
        let store = JobStore::new(
            dir.path().join("jobs"),
            dir.path().join("logs"),
            dir.path().join(".staging"),
        );
        store.ensure_directories().unwrap();
        store
    }

    #[rstest]
    #[case("a.wav", Some("a.wav"))]
    #[case("../../etc/passwd", Some("passwd"))]
    #[case("/abs/path/meeting.mp3", Some("meeting.mp3"))]
    #[case("C:\\Users\\me\\call.m4a", Some("call.m4a"))]
    #[case("dir/", None)]
    #[case("..", None)]
    #[case(".", None)]
    #[case("", None)]
    #[case("   ", None)]
    #[case(" board call .wav", Some(" board call .wav"))]
    fn test_sanitize_filename(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(sanitize_filename(input).as_deref(), expected);
    }

    #[rstest]
    #[case("standup.m4a", None, "standup-notes.md")]
    #[case("standup.m4a", Some(""), "standup-notes.md")]
    #[case("standup.m4a", Some("summary.md"), "summary.md")]
    #[case("standup.m4a", Some("../../escape.md"), "escape.md")]
    #[case("archive.tar.gz", None, "archive.tar-notes.md")]
    #[case("noext", None, "noext-notes.md")]
    fn test_resolve_output_name(
        #[case] audio: &str,
        #[case] requested: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(resolve_output_name(audio, requested), expected);
    }

    #[test]
    fn test_ensure_directories() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        assert!(store.jobs_root().is_dir());
        assert!(store.logs_root().is_dir());
        assert!(store.staging_root().is_dir());
    }

    #[test]
    fn test_create_job_directory_layout() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let id = "0123456789abcdef0123456789abcdef";

        let job_dir = store.create_job_directory(id).unwrap();
        let name = job_dir.file_name().unwrap().to_string_lossy().into_owned();

        assert!(job_dir.is_dir());
        assert_eq!(job_dir.parent().unwrap(), store.jobs_root());
        assert!(name.ends_with("-01234567"));
        // %Y%m%d-%H%M%S plus the dash and prefix
        assert_eq!(name.len(), 15 + 1 + 8);
    }

    #[test]
    fn test_create_job_directory_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let first = store.create_job_directory("abcdef0123").unwrap();
        std::fs::create_dir_all(&first).unwrap();
        assert!(store.create_job_directory("abcdef0123").is_ok());
    }

    #[test]
    fn test_allocate_paths() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);
        let id = "feedfacefeedfacefeedfacefeedface";

        let paths = store.allocate(id, "sub/team sync.wav", None).unwrap();

        assert_eq!(paths.audio_path, paths.job_dir.join("team sync.wav"));
        assert_eq!(paths.output_path, paths.job_dir.join("team sync-notes.md"));
        assert_eq!(paths.log_path, store.logs_root().join(format!("{id}.log")));
    }

    #[test]
    fn test_allocate_rejects_unusable_name() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let result = store.allocate("feedface", "..", None);
        assert!(matches!(result, Err(JobError::InvalidFilename { .. })));
        assert_eq!(std::fs::read_dir(store.jobs_root()).unwrap().count(), 0);
    }

    #[test]
    fn test_identical_filenames_get_distinct_directories() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let a = store
            .allocate(&crate::types::new_job_id(), "a.wav", None)
            .unwrap();
        let b = store
            .allocate(&crate::types::new_job_id(), "a.wav", None)
            .unwrap();

        assert_ne!(a.job_dir, b.job_dir);
        assert_ne!(a.output_path, b.output_path);
        assert_ne!(a.log_path, b.log_path);
    }

    #[test]
    fn test_staging_file_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let store = test_store(&dir);

        let staged = store.staging_file().unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.starts_with(store.staging_root()));
        assert!(path.exists());

        drop(staged);
        assert!(!path.exists());
    }
}
