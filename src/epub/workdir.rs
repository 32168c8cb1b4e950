//! Scoped staging directory for the extracted archive.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

/// A staging directory that is removed when dropped unless explicitly kept.
///
/// Dropping without calling [`WorkDir::finish`] (an early return on error)
/// always removes the directory.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
    keep: bool,
}

impl WorkDir {
    /// Create a unique directory under the system temp location.
    pub fn scratch() -> io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("rtl-epub-").tempdir()?;
        Ok(Self {
            path: dir.keep(),
            keep: false,
        })
    }

    /// Use a fixed directory, first removing whatever a previous run left
    /// there when `clean_before` is set.
    ///
    /// Two runs sharing a fixed directory at the same time will overwrite each
    /// other's staged files.
    pub fn fixed(path: impl Into<PathBuf>, clean_before: bool) -> io::Result<Self> {
        let path = path.into();
        if clean_before && path.exists() {
            debug!(path = %path.display(), "removing stale working directory");
            fs::remove_dir_all(&path)?;
        }
        fs::create_dir_all(&path)?;
        Ok(Self { path, keep: false })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the directory after a successful run, leaving it on disk when
    /// `clean` is false.
    pub fn finish(mut self, clean: bool) {
        if !clean {
            info!(path = %self.path.display(), "keeping working directory");
            self.keep = true;
        }
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = fs::remove_dir_all(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "failed to remove working directory");
        }
    }
}
