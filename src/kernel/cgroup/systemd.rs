/// systemd driver: cgroups live under an expanded slice hierarchy with the
/// container in a transient scope unit. Unit management over D-Bus is not
/// modelled; only naming and the resulting cgroup paths are.
use super::manager::{
    create_cgroup_dirs, join_under, read_pids, read_stats, remove_cgroup_dirs, CgroupDriver,
    CgroupManager, CgroupStats,
};
use crate::config::runtime::{CgroupConfig, SYSTEMD_PARENT_SLICE};
use crate::config::types::{Result, RuntimeError};
use std::path::{Path, PathBuf};

const SLICE_SUFFIX: &str = ".slice";

/// Expand a slice name into its cgroup path: `a-b-c.slice` becomes
/// `/a.slice/a-b.slice/a-b-c.slice`, and `-.slice` is the root.
pub fn expand_slice(slice: &str) -> Result<String> {
    let name = slice
        .strip_suffix(SLICE_SUFFIX)
        .ok_or_else(|| RuntimeError::Cgroup(format!("invalid slice name {slice:?}")))?;
    if slice.contains('/') {
        return Err(RuntimeError::Cgroup(format!(
            "slice name {slice:?} contains a path separator"
        )));
    }
    if name == "-" {
        return Ok("/".to_string());
    }

    let mut path = String::new();
    let mut prefix = String::new();
    for component in name.split('-') {
        if component.is_empty() {
            return Err(RuntimeError::Cgroup(format!(
                "slice name {slice:?} has an empty component"
            )));
        }
        path.push('/');
        path.push_str(&prefix);
        path.push_str(component);
        path.push_str(SLICE_SUFFIX);
        prefix.push_str(component);
        prefix.push('-');
    }
    Ok(path)
}

/// Unit holding the container: the slice itself when the name is a slice,
/// otherwise `<prefix>-<name>.scope`.
pub fn unit_name(scope_prefix: &str, name: &str) -> String {
    if name.ends_with(SLICE_SUFFIX) {
        name.to_string()
    } else if scope_prefix.is_empty() {
        format!("{name}.scope")
    } else {
        format!("{scope_prefix}-{name}.scope")
    }
}

#[derive(Debug)]
pub struct SystemdManager {
    unit: String,
    root: PathBuf,
    path: PathBuf,
    created: Vec<PathBuf>,
}

impl SystemdManager {
    pub fn new(cgroup_root: &Path, config: Option<&CgroupConfig>, container_id: &str) -> Result<Self> {
        let (parent, name, prefix) = match config {
            Some(cg) => (
                if cg.parent.is_empty() {
                    SYSTEMD_PARENT_SLICE
                } else {
                    cg.parent.as_str()
                },
                if cg.name.is_empty() {
                    container_id
                } else {
                    cg.name.as_str()
                },
                cg.scope_prefix.as_str(),
            ),
            None => (SYSTEMD_PARENT_SLICE, container_id, ""),
        };

        if name.contains('/') || name.contains('\0') {
            return Err(RuntimeError::Cgroup(format!("invalid unit name {name:?}")));
        }
        if prefix.contains('/') {
            return Err(RuntimeError::Cgroup(format!("invalid scope prefix {prefix:?}")));
        }

        let unit = unit_name(prefix, name);
        let slice_path = expand_slice(parent)?;
        let path = join_under(cgroup_root, &format!("{slice_path}/{unit}"))?;

        Ok(Self {
            unit,
            root: cgroup_root.to_path_buf(),
            path,
            created: Vec::new(),
        })
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }
}

impl CgroupManager for SystemdManager {
    fn driver(&self) -> CgroupDriver {
        CgroupDriver::Systemd
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn get_pids(&self) -> Result<Vec<i32>> {
        read_pids(&self.path)
    }

    fn get_stats(&self) -> Result<CgroupStats> {
        read_stats(&self.path)
    }

    fn create(&mut self) -> Result<()> {
        let created = create_cgroup_dirs(&self.root, &self.path)?;
        self.created.extend(created);
        Ok(())
    }

    fn destroy(&mut self) -> Result<()> {
        remove_cgroup_dirs(&self.path, &mut self.created)
    }
}
