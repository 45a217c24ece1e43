/// Filesystem helpers shared by the scratch manager, the factory and the harnesses
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::Write;
use std::os::unix::fs::{DirBuilderExt, OpenOptionsExt};
use std::path::Path;

/// Create `path` and its parents. Succeeds when it already exists.
pub fn ensure_dir(path: &Path, mode: u32) -> std::io::Result<()> {
    DirBuilder::new().recursive(true).mode(mode).create(path)
}

/// Create or truncate `path` and write `content` to it.
pub fn write_file(path: &Path, content: &[u8], mode: u32) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    file.write_all(content)
}

/// Atomically replace `target`: write a sibling temp file, fsync, rename,
/// fsync the parent directory.
pub fn atomic_write(target: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = target
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent dir"))?;

    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        target.file_name().unwrap_or_default().to_string_lossy(),
        uuid::Uuid::new_v4()
    ));

    {
        let mut f = fs::File::create(&temp_path)?;
        f.write_all(content)?;
        f.sync_all()?;
    }

    if let Err(e) = fs::rename(&temp_path, target) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    if let Ok(dir) = fs::File::open(parent) {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Remove a file or directory tree. A missing path is not an error.
pub fn remove_path(path: &Path) -> std::io::Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) => Err(e),
    };
    match result {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dir_is_idempotent() {
        let base = tempfile::tempdir().unwrap();
        let nested = base.path().join("a/b/c");
        ensure_dir(&nested, 0o700).unwrap();
        ensure_dir(&nested, 0o700).unwrap();
        assert!(nested.is_dir());
    }

    #[test]
    fn test_write_file_truncates() {
        let base = tempfile::tempdir().unwrap();
        let path = base.path().join("f");
        write_file(&path, b"longer content", 0o644).unwrap();
        write_file(&path, b"short", 0o644).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"short");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_file() {
        let base = tempfile::tempdir().unwrap();
        let path = base.path().join("state.json");
        atomic_write(&path, b"{}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{}");
        assert_eq!(fs::read_dir(base.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_remove_path_handles_all_kinds() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("d");
        ensure_dir(&dir.join("inner"), 0o700).unwrap();
        write_file(&dir.join("inner/f"), b"x", 0o600).unwrap();
        remove_path(&dir).unwrap();
        assert!(!dir.exists());
        // second removal is a no-op
        remove_path(&dir).unwrap();
    }
}
