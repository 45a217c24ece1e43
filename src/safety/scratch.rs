/// Scratch resources for a single harness run
///
/// Every acquisition gets its own path under the scratch root, so concurrent
/// runs never see each other's files. A handle removes its entry exactly once:
/// on `release()` or when dropped, whichever comes first.
use crate::config::types::{Result, RuntimeError};
use crate::gated;
use crate::utils::fs::{ensure_dir, remove_path};
use log::{Level, LevelFilter};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScratchKind {
    File,
    Directory,
}

/// Provisions scratch entries under a fixed root.
#[derive(Clone, Debug)]
pub struct ScratchManager {
    root: PathBuf,
    verbosity: LevelFilter,
}

impl ScratchManager {
    /// Create the manager, creating `root` if needed. An existing root,
    /// including leftovers from earlier runs, is fine.
    pub fn new(root: impl Into<PathBuf>, verbosity: LevelFilter) -> Result<Self> {
        let root = root.into();
        ensure_dir(&root, 0o700).map_err(|e| {
            RuntimeError::Filesystem(format!(
                "Failed to create scratch root {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root, verbosity })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Provision a fresh entry named `<stem>-<uuid>`.
    pub fn acquire(&self, kind: ScratchKind, stem: &str) -> Result<ScratchHandle> {
        let path = self.root.join(format!("{}-{}", stem, Uuid::new_v4()));

        let file = match kind {
            ScratchKind::File => Some(
                OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(&path)
                    .map_err(|e| {
                        RuntimeError::Filesystem(format!(
                            "Failed to create scratch file {}: {}",
                            path.display(),
                            e
                        ))
                    })?,
            ),
            ScratchKind::Directory => {
                ensure_dir(&path, 0o700).map_err(|e| {
                    RuntimeError::Filesystem(format!(
                        "Failed to create scratch directory {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                None
            }
        };

        gated!(self.verbosity, Level::Debug, "Acquired scratch {:?} at {}", kind, path.display());

        Ok(ScratchHandle {
            path,
            kind,
            file,
            released: false,
            verbosity: self.verbosity,
        })
    }
}

/// Exclusively owned scratch entry.
#[derive(Debug)]
pub struct ScratchHandle {
    path: PathBuf,
    kind: ScratchKind,
    file: Option<File>,
    released: bool,
    verbosity: LevelFilter,
}

impl ScratchHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> ScratchKind {
        self.kind
    }

    /// Open file behind a `File` entry.
    pub fn file(&self) -> Option<&File> {
        self.file.as_ref()
    }

    /// Independent handle to the same open file.
    pub fn try_clone_file(&self) -> Result<File> {
        match &self.file {
            Some(file) => Ok(file.try_clone()?),
            None => Err(RuntimeError::Filesystem(format!(
                "{} is not a scratch file",
                self.path.display()
            ))),
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Close and remove the entry. Idempotent; failures are logged and
    /// otherwise ignored.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.file = None;
        if let Err(e) = remove_path(&self.path) {
            gated!(
                self.verbosity,
                Level::Warn,
                "Failed to remove scratch {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

impl Drop for ScratchHandle {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn manager() -> (tempfile::TempDir, ScratchManager) {
        let dir = tempfile::tempdir().unwrap();
        let manager = ScratchManager::new(dir.path().join("scratch"), LevelFilter::Off).unwrap();
        (dir, manager)
    }

    #[test]
    fn test_file_acquire_and_release() {
        let (_dir, manager) = manager();
        let mut handle = manager.acquire(ScratchKind::File, "pipe").unwrap();
        let path = handle.path().to_path_buf();
        assert!(path.is_file());
        handle.try_clone_file().unwrap().write_all(b"data").unwrap();

        handle.release();
        assert!(!path.exists());
        assert!(handle.is_released());
        // double release is a no-op
        handle.release();
    }

    #[test]
    fn test_directory_removed_on_drop() {
        let (_dir, manager) = manager();
        let path = {
            let handle = manager.acquire(ScratchKind::Directory, "work").unwrap();
            std::fs::write(handle.path().join("inner"), b"x").unwrap();
            handle.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_paths_are_unique() {
        let (_dir, manager) = manager();
        let a = manager.acquire(ScratchKind::File, "pipe").unwrap();
        let b = manager.acquire(ScratchKind::File, "pipe").unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_root_creation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        ScratchManager::new(dir.path(), LevelFilter::Off).unwrap();
        ScratchManager::new(dir.path(), LevelFilter::Off).unwrap();
    }

    #[test]
    fn test_directory_handle_has_no_file() {
        let (_dir, manager) = manager();
        let handle = manager.acquire(ScratchKind::Directory, "d").unwrap();
        assert!(handle.file().is_none());
        assert!(handle.try_clone_file().is_err());
        assert_eq!(handle.kind(), ScratchKind::Directory);
    }
}
