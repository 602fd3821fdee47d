//! Scoped per-job local workspace.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::MediaResult;

/// Exclusive local working directory for one job's execution.
///
/// The directory lives under the configured work root and is removed when
/// the workspace is dropped, which covers every exit path: success,
/// failure, panic, and timeout cancellation of the owning task.
#[derive(Debug)]
pub struct JobWorkspace {
    dir: TempDir,
}

impl JobWorkspace {
    /// Create a workspace under `work_root`, creating the root if needed.
    pub fn create(work_root: impl AsRef<Path>) -> MediaResult<Self> {
        let work_root = work_root.as_ref();
        std::fs::create_dir_all(work_root)?;
        let dir = TempDir::with_prefix_in("job-", work_root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path for the staged input artifact.
    pub fn input_path(&self, ext: &str) -> PathBuf {
        self.dir.path().join(format!("input.{}", ext))
    }

    /// Path for the produced output artifact.
    pub fn output_path(&self, ext: &str) -> PathBuf {
        self.dir.path().join(format!("output.{}", ext))
    }
}
