/// Traversal-safe path joining
///
/// Joins an untrusted relative path onto a trusted base directory, resolving
/// `..` and symlinks lexically against the base. Anything that would land
/// outside the base is rejected rather than clamped.
use crate::config::types::{Result, RuntimeError};
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

const MAX_SYMLINK_HOPS: usize = 255;

#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("path traversal outside {0}")]
    Traversal(PathBuf),

    #[error("absolute path not allowed: {0}")]
    Absolute(PathBuf),

    #[error("too many symlinks resolving {0}")]
    SymlinkLoop(PathBuf),
}

impl From<PathError> for RuntimeError {
    fn from(err: PathError) -> Self {
        RuntimeError::Filesystem(err.to_string())
    }
}

/// Join `unsafe_path` onto `base`, refusing to escape `base`.
pub fn secure_join(base: &Path, unsafe_path: impl AsRef<Path>) -> Result<PathBuf> {
    let unsafe_path = unsafe_path.as_ref();
    let mut pending: VecDeque<OsString> = VecDeque::new();
    push_components(&mut pending, unsafe_path, unsafe_path, 0)?;

    let mut resolved: Vec<OsString> = Vec::new();
    let mut hops = 0;

    while let Some(part) = pending.pop_front() {
        if part == ".." {
            if resolved.pop().is_none() {
                return Err(PathError::Traversal(base.to_path_buf()).into());
            }
            continue;
        }

        let candidate = resolved
            .iter()
            .fold(base.to_path_buf(), |acc, p| acc.join(p))
            .join(&part);

        match std::fs::symlink_metadata(&candidate) {
            Ok(meta) if meta.file_type().is_symlink() => {
                hops += 1;
                if hops > MAX_SYMLINK_HOPS {
                    return Err(PathError::SymlinkLoop(unsafe_path.to_path_buf()).into());
                }
                let target = std::fs::read_link(&candidate)?;
                push_components(&mut pending, &target, unsafe_path, hops)?;
            }
            // Missing entries are fine: the caller may be about to create them.
            _ => resolved.push(part),
        }
    }

    Ok(resolved.iter().fold(base.to_path_buf(), |acc, p| acc.join(p)))
}

/// Queue the components of `path` at the front of `pending`.
fn push_components(
    pending: &mut VecDeque<OsString>,
    path: &Path,
    original: &Path,
    hops: usize,
) -> Result<()> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => parts.push(name.to_os_string()),
            Component::ParentDir => parts.push(OsString::from("..")),
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(if hops == 0 {
                    PathError::Absolute(original.to_path_buf())
                } else {
                    PathError::Traversal(original.to_path_buf())
                }
                .into());
            }
        }
    }
    for part in parts.into_iter().rev() {
        pending.push_front(part);
    }
    Ok(())
}
