//! Download targets: where a ready artifact's bytes are saved.
//!
//! A browser would pop a save dialog; here a [`DownloadSink`] receives the
//! bytes and the resolved filename. [`DirectorySink`] saves into a folder
//! with an atomic write (temp file in the same directory, then rename) so a
//! crash never leaves a truncated PDF behind.

use crate::error::DownloadError;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Receives a user-facing save of the artifact bytes.
///
/// Every call is a fresh save; calling twice writes twice.
pub trait DownloadSink: Send + Sync {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, DownloadError>;
}

/// Saves downloads into a fixed directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectorySink {
    fn save(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf, DownloadError> {
        let target = self.dir.join(filename);
        let fail = |source| DownloadError::WriteFailed {
            path: target.clone(),
            source,
        };

        std::fs::create_dir_all(&self.dir).map_err(fail)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(fail)?;
        tmp.write_all(bytes).map_err(fail)?;
        tmp.persist(&target).map_err(|e| fail(e.error))?;

        info!("Saved {} bytes → {}", bytes.len(), target.display());
        Ok(target)
    }
}
