/// Advisory file locking around shared fixed paths
use crate::config::types::{Result, RuntimeError};
use nix::fcntl::{Flock, FlockArg};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Lock file guarding `dir`.
pub fn lock_path_for(dir: &Path) -> PathBuf {
    dir.join(".lock")
}

/// Run `operation` while holding an exclusive `flock` on `dir/.lock`.
///
/// The lock covers both threads and processes; it is released when the
/// lock file handle is dropped. The lock file itself is never removed so
/// that every contender locks the same inode.
pub fn with_dir_lock<T, F>(dir: &Path, operation: F) -> Result<T>
where
    F: FnOnce() -> T,
{
    let lock_path = lock_path_for(dir);
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_path)?;

    let _guard = Flock::lock(lock_file, FlockArg::LockExclusive).map_err(|(_, errno)| {
        RuntimeError::Filesystem(format!(
            "Failed to lock {}: {}",
            lock_path.display(),
            errno
        ))
    })?;

    Ok(operation())
}
