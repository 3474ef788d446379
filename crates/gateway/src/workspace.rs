//! Request-scoped scratch directory.
//!
//! Each request gets its own directory under the upload root; the upload and
//! any detector artifacts are written there and removed when the workspace is
//! closed or dropped, on success and failure alike.

use crate::request::sanitize_filename;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const ARTIFACTS_DIR: &str = "artifacts";

pub struct RequestWorkspace {
    dir: Option<TempDir>,
    path: PathBuf,
    tracked: Vec<PathBuf>,
}

impl RequestWorkspace {
    pub fn create(upload_root: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(upload_root)?;
        let dir = tempfile::Builder::new()
            .prefix("predict-")
            .tempdir_in(upload_root)?;
        let path = dir.path().to_path_buf();

        tracing::trace!(path = %path.display(), "Request workspace created");

        Ok(Self {
            dir: Some(dir),
            path,
            tracked: Vec::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the uploaded bytes under a sanitised copy of `filename`.
    pub fn store_upload(&self, filename: &str, data: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.path.join(sanitize_filename(filename));
        fs::write(&path, data)?;
        Ok(path)
    }

    /// Where the detector may write annotated copies for this request.
    pub fn artifacts_dir(&self) -> PathBuf {
        self.path.join(ARTIFACTS_DIR)
    }

    /// Register files produced on behalf of this request. Paths outside the
    /// workspace are deleted individually on cleanup.
    pub fn track<I>(&mut self, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        self.tracked.extend(paths);
    }

    pub fn close(mut self) {
        self.cleanup();
    }

    fn cleanup(&mut self) {
        for path in self.tracked.drain(..) {
            if path.starts_with(&self.path) || !path.exists() {
                continue;
            }
            if let Err(e) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete request artifact");
            }
        }

        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => tracing::trace!(path = %self.path.display(), "Request workspace removed"),
                Err(e) => tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove request workspace"
                ),
            }
        }
    }
}

impl Drop for RequestWorkspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}
