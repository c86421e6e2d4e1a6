//! Scratch directory management for one capture run.
//!
//! The intermediate video, palette image, browser profile, and debug
//! snapshots all live in one temporary directory that is removed when
//! the run finishes, unless it is explicitly kept for inspection.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::StarcapError;

/// A per-run scratch directory, removed on drop unless kept.
pub struct WorkDir {
    inner: Option<tempfile::TempDir>,
    path: PathBuf,
}

impl WorkDir {
    /// Create a fresh scratch directory under the system temp dir.
    pub fn create() -> Result<Self, StarcapError> {
        let inner = tempfile::Builder::new().prefix("starcap-").tempdir()?;
        let path = inner.path().to_path_buf();
        debug!("Working directory: {}", path.display());
        Ok(Self {
            inner: Some(inner),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disable cleanup so the directory survives for inspection.
    /// Returns the persisted path.
    pub fn keep(mut self) -> PathBuf {
        if let Some(dir) = self.inner.take() {
            // Leak the TempDir handle instead of deleting its contents.
            let _ = dir.keep();
        }
        self.path.clone()
    }
}

/// Ensure the parent directory of a file path exists.
pub fn ensure_parent_dir(path: &Path) -> Result<(), StarcapError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_cleanup() {
        let work = WorkDir::create().unwrap();
        let path = work.path().to_path_buf();
        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("starcap-"));
        drop(work);
        assert!(!path.exists());
    }

    #[test]
    fn test_keep_survives_drop() {
        let work = WorkDir::create().unwrap();
        let path = work.keep();
        assert!(path.exists());
        std::fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn test_ensure_parent_dir_creates_chain() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("a").join("b").join("out.gif");
        ensure_parent_dir(&file).unwrap();
        assert!(file.parent().unwrap().exists());
    }

    #[test]
    fn test_ensure_parent_dir_tolerates_existing() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("out.gif");
        ensure_parent_dir(&file).unwrap();
        ensure_parent_dir(&file).unwrap();
    }

    #[test]
    fn test_ensure_parent_dir_bare_filename() {
        ensure_parent_dir(Path::new("out.gif")).unwrap();
    }
}
