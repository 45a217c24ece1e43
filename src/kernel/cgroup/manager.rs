//! Cgroup manager abstraction over the cgroupfs and systemd drivers.

use crate::config::runtime::{CgroupConfig, SYSTEMD_PARENT_SLICE};
use crate::config::types::{Result, RuntimeError};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::fs;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

/// Resource usage read from a unified (v2) cgroup directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgroupStats {
    pub memory_usage: u64,
    /// `None` when `memory.max` is "max"
    pub memory_limit: Option<u64>,
    pub pids_current: u64,
    pub pids_limit: Option<u64>,
    pub cpu_usage_usec: u64,
}

pub trait CgroupManager: Send + Sync + Debug {
    fn driver(&self) -> CgroupDriver;
    /// Cgroup directory this manager controls.
    fn path(&self) -> &Path;
    fn get_pids(&self) -> Result<Vec<i32>>;
    fn get_stats(&self) -> Result<CgroupStats>;
    /// Create the cgroup directory and any missing parents, remembering
    /// which ones this manager made.
    fn create(&mut self) -> Result<()>;
    /// Remove the cgroup directory if it exists, then the parents `create`
    /// made, deepest first. The kernel refuses while processes remain,
    /// which surfaces as an error.
    fn destroy(&mut self) -> Result<()>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CgroupDriver {
    Fs,
    Systemd,
}

impl CgroupDriver {
    /// The systemd driver is used when the configured parent is the systemd
    /// system slice, cgroupfs otherwise.
    pub fn for_config(config: Option<&CgroupConfig>) -> Self {
        match config {
            Some(cg) if cg.parent == SYSTEMD_PARENT_SLICE => CgroupDriver::Systemd,
            _ => CgroupDriver::Fs,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CgroupDriver::Fs => "cgroupfs",
            CgroupDriver::Systemd => "systemd",
        }
    }
}

/// Build the manager for `driver`. Paths are resolved under `cgroup_root`
/// and never escape it.
pub fn new_manager(
    driver: CgroupDriver,
    cgroup_root: &Path,
    config: Option<&CgroupConfig>,
    container_id: &str,
) -> Result<Box<dyn CgroupManager>> {
    match driver {
        CgroupDriver::Fs => Ok(Box::new(super::fs::FsManager::new(
            cgroup_root,
            config,
            container_id,
        )?)),
        CgroupDriver::Systemd => Ok(Box::new(super::systemd::SystemdManager::new(
            cgroup_root,
            config,
            container_id,
        )?)),
    }
}

fn read_trimmed(dir: &Path, file: &str) -> Result<String> {
    let path = dir.join(file);
    fs::read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| RuntimeError::Cgroup(format!("Failed to read {}: {}", path.display(), e)))
}

fn parse_u64(dir: &Path, file: &str, value: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|e| {
        RuntimeError::Cgroup(format!("Failed to parse {}/{}: {}", dir.display(), file, e))
    })
}

fn read_limit(dir: &Path, file: &str) -> Result<Option<u64>> {
    let value = read_trimmed(dir, file)?;
    if value == "max" {
        return Ok(None);
    }
    parse_u64(dir, file, &value).map(Some)
}

pub(crate) fn read_pids(dir: &Path) -> Result<Vec<i32>> {
    let content = read_trimmed(dir, "cgroup.procs")?;
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.trim().parse::<i32>().map_err(|e| {
                RuntimeError::Cgroup(format!("Invalid pid {:?} in cgroup.procs: {}", line, e))
            })
        })
        .collect()
}

pub(crate) fn read_stats(dir: &Path) -> Result<CgroupStats> {
    let memory_usage = parse_u64(dir, "memory.current", &read_trimmed(dir, "memory.current")?)?;
    let memory_limit = read_limit(dir, "memory.max")?;
    let pids_current = parse_u64(dir, "pids.current", &read_trimmed(dir, "pids.current")?)?;
    let pids_limit = read_limit(dir, "pids.max")?;

    let mut cpu_usage_usec = 0;
    for line in read_trimmed(dir, "cpu.stat")?.lines() {
        if let Some(("usage_usec", value)) = line.split_once(' ') {
            cpu_usage_usec = parse_u64(dir, "cpu.stat", value.trim())?;
        }
    }

    Ok(CgroupStats {
        memory_usage,
        memory_limit,
        pids_current,
        pids_limit,
        cpu_usage_usec,
    })
}

/// Create `dir` and its missing ancestors below `root`. Returns the
/// directories actually created, shallowest first.
pub(crate) fn create_cgroup_dirs(root: &Path, dir: &Path) -> Result<Vec<PathBuf>> {
    let cgroup_err = |path: &Path, e: std::io::Error| {
        RuntimeError::Cgroup(format!("Failed to create cgroup {}: {}", path.display(), e))
    };
    crate::utils::fs::ensure_dir(root, 0o755).map_err(|e| cgroup_err(root, e))?;

    let mut missing: Vec<&Path> = dir
        .ancestors()
        .take_while(|p| *p != root && p.starts_with(root))
        .collect();
    missing.reverse();

    let mut created = Vec::new();
    for path in missing {
        match fs::DirBuilder::new().mode(0o755).create(path) {
            Ok(()) => created.push(path.to_path_buf()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && path.is_dir() => {}
            Err(e) => {
                remove_created_parents(&created);
                return Err(cgroup_err(path, e));
            }
        }
    }
    Ok(created)
}

/// Remove the leaf cgroup, then the parents listed in `created` that are
/// now empty. Parents still holding other cgroups stay.
pub(crate) fn remove_cgroup_dirs(dir: &Path, created: &mut Vec<PathBuf>) -> Result<()> {
    remove_cgroup_dir(dir)?;
    created.retain(|p| p != dir);
    remove_created_parents(created.as_slice());
    created.clear();
    Ok(())
}

fn remove_created_parents(created: &[PathBuf]) {
    // ENOTEMPTY and ENOENT both mean the directory is not ours to remove
    for path in created.iter().rev() {
        let _ = fs::remove_dir(path);
    }
}

pub(crate) fn remove_cgroup_dir(dir: &Path) -> Result<()> {
    match fs::remove_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(RuntimeError::Cgroup(format!(
            "Failed to remove cgroup {}: {}",
            dir.display(),
            e
        ))),
    }
}

pub(crate) fn join_under(root: &Path, relative: &str) -> Result<PathBuf> {
    crate::safety::secure_join::secure_join(root, relative.trim_start_matches('/'))
        .map_err(|e| RuntimeError::Cgroup(format!("Invalid cgroup path {:?}: {}", relative, e)))
}
