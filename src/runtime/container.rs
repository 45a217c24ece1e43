/// A container known to the factory
///
/// Only the query surface and `destroy` are modelled. Starting, exec'ing
/// and pausing processes is out of scope; a container's init pid comes from
/// its state file.
use super::state::{annotation_map, OciState, Status, OCI_VERSION};
use crate::config::runtime::{NamespaceType, RuntimeConfig};
use crate::config::types::{Result, RuntimeError};
use crate::gated;
use crate::kernel::cgroup::{CgroupDriver, CgroupManager, CgroupStats};
use crate::utils::fs::remove_path;
use chrono::{DateTime, Utc};
use log::{Level, LevelFilter};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Snapshot returned by [`Container::state`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ContainerState {
    pub id: String,
    pub status: Status,
    pub init_pid: i32,
    pub bundle: String,
    pub created: DateTime<Utc>,
    pub driver: CgroupDriver,
    pub cgroup_path: PathBuf,
    /// `/proc/<pid>/ns/<name>` for each configured namespace; empty without
    /// a live init process.
    pub namespace_paths: BTreeMap<NamespaceType, String>,
    pub config: RuntimeConfig,
}

#[derive(Debug)]
pub struct Container {
    pub(crate) id: String,
    pub(crate) state_dir: PathBuf,
    pub(crate) config: RuntimeConfig,
    pub(crate) status: Status,
    pub(crate) init_pid: i32,
    pub(crate) bundle: String,
    pub(crate) annotations: Vec<String>,
    pub(crate) created: DateTime<Utc>,
    pub(crate) cgroup: Box<dyn CgroupManager>,
    pub(crate) verbosity: LevelFilter,
    pub(crate) destroyed: bool,
}

/// `kill(pid, 0)`: EPERM still means the process exists.
pub(crate) fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

impl Container {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// Status refreshed against the init process.
    pub fn status(&self) -> Status {
        if self.destroyed {
            return Status::Stopped;
        }
        if self.status.expects_process() && !pid_alive(self.init_pid) {
            return Status::Stopped;
        }
        self.status
    }

    pub fn state(&self) -> Result<ContainerState> {
        self.ensure_exists()?;
        let status = self.status();
        let namespace_paths = if status == Status::Stopped {
            BTreeMap::new()
        } else {
            self.config
                .namespaces
                .iter()
                .map(|ns| {
                    let path = if ns.path.is_empty() {
                        format!("/proc/{}/ns/{}", self.init_pid, ns.kind.proc_name())
                    } else {
                        ns.path.clone()
                    };
                    (ns.kind, path)
                })
                .collect()
        };

        Ok(ContainerState {
            id: self.id.clone(),
            status,
            init_pid: self.init_pid,
            bundle: self.bundle.clone(),
            created: self.created,
            driver: self.cgroup.driver(),
            cgroup_path: self.cgroup.path().to_path_buf(),
            namespace_paths,
            config: self.config.clone(),
        })
    }

    pub fn stats(&self) -> Result<CgroupStats> {
        self.ensure_exists()?;
        self.cgroup.get_stats()
    }

    pub fn oci_state(&self) -> Result<OciState> {
        self.ensure_exists()?;
        let status = self.status();
        Ok(OciState {
            oci_version: OCI_VERSION.to_string(),
            id: self.id.clone(),
            status,
            pid: if status == Status::Stopped { 0 } else { self.init_pid },
            bundle: self.bundle.clone(),
            annotations: annotation_map(&self.annotations),
        })
    }

    /// Pids in the container's cgroup.
    pub fn processes(&self) -> Result<Vec<i32>> {
        self.ensure_exists()?;
        self.cgroup.get_pids()
    }

    /// Remove the cgroup and the state directory. Refused while the init
    /// process is alive; repeated calls are no-ops.
    pub fn destroy(&mut self) -> Result<()> {
        if self.destroyed {
            return Ok(());
        }
        if self.status() != Status::Stopped {
            return Err(RuntimeError::State(format!(
                "cannot destroy container {} in status {}",
                self.id,
                self.status()
            )));
        }

        let cgroup_result = self.cgroup.destroy();
        let state_result = remove_path(&self.state_dir).map_err(|e| {
            RuntimeError::Filesystem(format!(
                "Failed to remove state dir {}: {}",
                self.state_dir.display(),
                e
            ))
        });
        self.destroyed = true;
        self.status = Status::Stopped;
        gated!(self.verbosity, Level::Info, "Destroyed container {}", self.id);

        cgroup_result.and(state_result)
    }

    fn ensure_exists(&self) -> Result<()> {
        if self.destroyed {
            return Err(RuntimeError::NotExist(self.id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_alive() {
        assert!(pid_alive(std::process::id() as i32));
        assert!(!pid_alive(0));
        assert!(!pid_alive(-5));
        // above the default pid_max
        assert!(!pid_alive(i32::MAX));
    }
}
