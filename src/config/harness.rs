/// Harness configuration
///
/// Every knob a harness reads comes from here; nothing is taken from
/// process-wide state. Missing JSON fields fall back to the defaults.
use crate::config::types::{Result, RuntimeError};
use crate::consumer::ConsumerLimits;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Verbosity for the subsystems under test. Fuzzing runs stay quiet.
    pub log_level: LevelFilter,
    pub limits: ConsumerLimits,
    /// Per-run scratch files for the init harness.
    pub scratch_root: PathBuf,
    /// State root for containers created by the lifecycle harness.
    pub lifecycle_root: PathBuf,
    /// Root holding the `fuzz` container directory for the factory harness.
    pub factory_root: PathBuf,
    /// Stand-in for `/sys/fs/cgroup`.
    pub cgroup_root: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            log_level: LevelFilter::Error,
            limits: ConsumerLimits::default(),
            scratch_root: PathBuf::from("/tmp/fuzz-scratch"),
            lifecycle_root: PathBuf::from("/tmp/fuzzing"),
            factory_root: PathBuf::from("/tmp/fuzz-root"),
            cgroup_root: PathBuf::from("/tmp/fuzz-cgroup"),
        }
    }
}

impl HarnessConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RuntimeError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Move every root under `base`, for tests and parallel campaigns.
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            scratch_root: base.join("scratch"),
            lifecycle_root: base.join("fuzzing"),
            factory_root: base.join("fuzz-root"),
            cgroup_root: base.join("cgroup"),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::default();
        assert_eq!(config.log_level, LevelFilter::Error);
        assert_eq!(config.lifecycle_root, PathBuf::from("/tmp/fuzzing"));
        assert_eq!(config.factory_root, PathBuf::from("/tmp/fuzz-root"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            HarnessConfig::from_json(r#"{"log_level":"DEBUG","limits":{"max_depth":3}}"#).unwrap();
        assert_eq!(config.log_level, LevelFilter::Debug);
        assert_eq!(config.limits.max_depth, 3);
        assert_eq!(
            config.limits.max_sequence_len,
            ConsumerLimits::default().max_sequence_len
        );
        assert_eq!(config.scratch_root, HarnessConfig::default().scratch_root);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("harness.json");
        fs::write(&path, r#"{"factory_root":"/srv/f"}"#).unwrap();
        let config = HarnessConfig::from_file(&path).unwrap();
        assert_eq!(config.factory_root, PathBuf::from("/srv/f"));
        assert!(HarnessConfig::from_file(&dir.path().join("missing.json")).is_err());
        fs::write(&path, "{not json").unwrap();
        assert!(HarnessConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_rooted_at() {
        let config = HarnessConfig::rooted_at(Path::new("/x"));
        assert_eq!(config.cgroup_root, PathBuf::from("/x/cgroup"));
        assert_eq!(config.limits, ConsumerLimits::default());
    }
}
