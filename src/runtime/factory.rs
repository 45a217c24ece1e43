/// Container factory
///
/// Owns a state root with one directory per container id. `create` writes
/// a fresh container and its cgroup; `load` rebuilds a container from the
/// `state.json` another process left behind.
use super::container::{pid_alive, Container};
use super::state::{StateRecord, Status, OCI_VERSION, STATE_FILENAME};
use crate::config::runtime::RuntimeConfig;
use crate::config::types::{Result, RuntimeError};
use crate::config::validator;
use crate::gated;
use crate::kernel::cgroup::{new_manager, CgroupDriver};
use crate::safety::secure_join::secure_join;
use crate::utils::fs::{atomic_write, ensure_dir, remove_path};
use chrono::Utc;
use log::{Level, LevelFilter};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct FactoryOptions {
    /// Directory standing in for `/sys/fs/cgroup`
    pub cgroup_root: PathBuf,
    pub verbosity: LevelFilter,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            cgroup_root: PathBuf::from("/tmp/fuzz-cgroup"),
            verbosity: LevelFilter::Error,
        }
    }
}

#[derive(Debug)]
pub struct Factory {
    root: PathBuf,
    driver: CgroupDriver,
    options: FactoryOptions,
}

/// Container ids: `[A-Za-z0-9_+.-]+`, excluding `.` and `..`.
pub fn validate_id(id: &str) -> Result<()> {
    let valid_chars = id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '-' | '.'));
    if id.is_empty() || !valid_chars || id == "." || id == ".." {
        return Err(RuntimeError::Config(format!("invalid container id {:?}", id)));
    }
    Ok(())
}

impl Factory {
    /// Open a factory rooted at `root`, creating the root if needed.
    pub fn new(root: impl Into<PathBuf>, driver: CgroupDriver, options: FactoryOptions) -> Result<Self> {
        let root = root.into();
        ensure_dir(&root, 0o711).map_err(|e| {
            RuntimeError::Filesystem(format!(
                "Failed to create state root {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            root,
            driver,
            options,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn driver(&self) -> CgroupDriver {
        self.driver
    }

    pub fn create(&self, id: &str, config: &RuntimeConfig) -> Result<Container> {
        validate_id(id)?;
        validator::validate(config)?;

        let state_dir = secure_join(&self.root, id)?;
        if fs::symlink_metadata(&state_dir).is_ok() {
            return Err(RuntimeError::Exists(id.to_string()));
        }

        let mut cgroup = new_manager(
            self.driver,
            &self.options.cgroup_root,
            config.cgroups.as_ref(),
            id,
        )?;
        cgroup.create()?;

        if let Err(e) = fs::create_dir(&state_dir) {
            let _ = cgroup.destroy();
            return Err(match e.kind() {
                std::io::ErrorKind::AlreadyExists => RuntimeError::Exists(id.to_string()),
                _ => RuntimeError::Filesystem(format!(
                    "Failed to create state dir {}: {}",
                    state_dir.display(),
                    e
                )),
            });
        }

        let bundle = config
            .label("bundle")
            .map(str::to_string)
            .unwrap_or_else(|| config.rootfs.clone());
        let created = Utc::now();
        let record = StateRecord {
            oci_version: OCI_VERSION.to_string(),
            id: id.to_string(),
            status: Status::Stopped.as_str().to_string(),
            pid: 0,
            bundle: bundle.clone(),
            annotations: config.labels.clone(),
            created: Some(created),
            driver: Some(self.driver),
            config: Some(config.clone()),
        };

        let persisted = record.to_json().and_then(|json| {
            atomic_write(&state_dir.join(STATE_FILENAME), &json).map_err(RuntimeError::from)
        });
        if let Err(e) = persisted {
            let _ = cgroup.destroy();
            let _ = remove_path(&state_dir);
            return Err(e);
        }

        gated!(
            self.options.verbosity,
            Level::Info,
            "Created container {} ({} driver) at {}",
            id,
            self.driver.name(),
            state_dir.display()
        );

        Ok(Container {
            id: id.to_string(),
            state_dir,
            config: config.clone(),
            status: Status::Stopped,
            init_pid: 0,
            bundle,
            annotations: config.labels.clone(),
            created,
            cgroup,
            verbosity: self.options.verbosity,
            destroyed: false,
        })
    }

    pub fn load(&self, id: &str) -> Result<Container> {
        validate_id(id)?;
        let state_dir = secure_join(&self.root, id)?;
        let state_path = secure_join(&state_dir, STATE_FILENAME)?;

        let content = match fs::read(&state_path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RuntimeError::NotExist(id.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let record = StateRecord::from_json(&content)?;
        let (mut status, init_pid) = record.validate()?;
        if record.id != id {
            gated!(
                self.options.verbosity,
                Level::Debug,
                "State in {} records id {:?}",
                id,
                record.id
            );
        }

        if status.expects_process() && !pid_alive(init_pid) {
            gated!(
                self.options.verbosity,
                Level::Debug,
                "Container {} init {} is gone, marking stopped",
                id,
                init_pid
            );
            status = Status::Stopped;
        }

        let config = record.config.unwrap_or_default();
        let driver = record.driver.unwrap_or(self.driver);
        let cgroup = new_manager(driver, &self.options.cgroup_root, config.cgroups.as_ref(), id)?;

        Ok(Container {
            id: id.to_string(),
            state_dir,
            config,
            status,
            init_pid,
            bundle: record.bundle,
            annotations: record.annotations,
            created: record.created.unwrap_or_else(Utc::now),
            cgroup,
            verbosity: self.options.verbosity,
            destroyed: false,
        })
    }
}
