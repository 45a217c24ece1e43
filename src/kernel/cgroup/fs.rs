/// cgroupfs driver: the cgroup directory is `<root>/<path>` or
/// `<root>/<parent>/<name>`, defaulting to `<root>/<container id>`.
use super::manager::{
    create_cgroup_dirs, join_under, read_pids, read_stats, remove_cgroup_dirs, CgroupDriver,
    CgroupManager, CgroupStats,
};
use crate::config::runtime::CgroupConfig;
use crate::config::types::{Result, RuntimeError};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct FsManager {
    root: PathBuf,
    path: PathBuf,
    created: Vec<PathBuf>,
}

impl FsManager {
    pub fn new(cgroup_root: &Path, config: Option<&CgroupConfig>, container_id: &str) -> Result<Self> {
        let relative = match config {
            Some(cg) if !cg.path.is_empty() => cg.path.clone(),
            Some(cg) if !cg.name.is_empty() => format!("{}/{}", cg.parent, cg.name),
            Some(cg) => format!("{}/{}", cg.parent, container_id),
            None => container_id.to_string(),
        };
        if relative.contains('\0') {
            return Err(RuntimeError::Cgroup("cgroup path contains NUL".to_string()));
        }

        let path = join_under(cgroup_root, &relative)?;
        if path == cgroup_root {
            return Err(RuntimeError::Cgroup(format!(
                "cgroup path {:?} resolves to the cgroup root",
                relative
            )));
        }
        Ok(Self {
            root: cgroup_root.to_path_buf(),
            path,
            created: Vec::new(),
        })
    }
}

impl CgroupManager for FsManager {
    fn driver(&self) -> CgroupDriver {
        CgroupDriver::Fs
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_path_uses_container_id() {
        let root = tempfile::tempdir().unwrap();
        let manager = FsManager::new(root.path(), None, "ctr").unwrap();
        assert_eq!(manager.path(), root.path().join("ctr"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let root = tempfile::tempdir().unwrap();
        let cg = CgroupConfig {
            name: "ignored".to_string(),
            parent: "parent".to_string(),
            path: "/custom/leaf".to_string(),
            ..CgroupConfig::default()
        };
        let manager = FsManager::new(root.path(), Some(&cg), "ctr").unwrap();
        assert_eq!(manager.path(), root.path().join("custom/leaf"));
    }

    #[test]
    fn test_parent_and_name() {
        let root = tempfile::tempdir().unwrap();
        let cg = CgroupConfig {
            name: "leaf".to_string(),
            parent: "mid".to_string(),
            ..CgroupConfig::default()
        };
        let manager = FsManager::new(root.path(), Some(&cg), "ctr").unwrap();
        assert_eq!(manager.path(), root.path().join("mid/leaf"));
    }

    #[test]
    fn test_escaping_path_rejected() {
        let root = tempfile::tempdir().unwrap();
        let cg = CgroupConfig {
            path: "../../outside".to_string(),
            ..CgroupConfig::default()
        };
        assert!(FsManager::new(root.path(), Some(&cg), "ctr").is_err());
        let cg = CgroupConfig {
            path: "a/..".to_string(),
            ..CgroupConfig::default()
        };
        assert!(FsManager::new(root.path(), Some(&cg), "ctr").is_err());
    }

    #[test]
    fn test_destroy_removes_created_parents() {
        let root = tempfile::tempdir().unwrap();
        let cg = CgroupConfig {
            name: "leaf".to_string(),
            parent: "p/q".to_string(),
            ..CgroupConfig::default()
        };
        let mut manager = FsManager::new(root.path(), Some(&cg), "ctr").unwrap();
        manager.create().unwrap();
        assert!(root.path().join("p/q/leaf").is_dir());

        manager.destroy().unwrap();
        assert!(!root.path().join("p").exists());
        // repeated destroy is a no-op
        manager.destroy().unwrap();
    }

    #[test]
    fn test_destroy_missing_is_ok_and_queries_fail() {
        let root = tempfile::tempdir().unwrap();
        let mut manager = FsManager::new(root.path(), None, "ctr").unwrap();
        assert!(manager.get_stats().is_err());
        assert!(manager.get_pids().is_err());
        manager.destroy().unwrap();
        assert_eq!(manager.driver(), CgroupDriver::Fs);
    }
}
