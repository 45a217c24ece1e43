/// Persisted container state
///
/// `state.json` is the only thing that survives between a `create` and a
/// later `load`. Fields written by other tools are accepted as long as the
/// core OCI fields are present.
use crate::config::runtime::RuntimeConfig;
use crate::config::types::{Result, RuntimeError};
use crate::kernel::cgroup::CgroupDriver;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

pub const OCI_VERSION: &str = "1.0.2";
pub const STATE_FILENAME: &str = "state.json";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Creating,
    Created,
    Running,
    Paused,
    Stopped,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Creating => "creating",
            Status::Created => "created",
            Status::Running => "running",
            Status::Paused => "paused",
            Status::Stopped => "stopped",
        }
    }

    /// Whether this status implies a live init process.
    pub fn expects_process(self) -> bool {
        matches!(self, Status::Created | Status::Running | Status::Paused)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = RuntimeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "creating" => Ok(Status::Creating),
            "created" => Ok(Status::Created),
            "running" => Ok(Status::Running),
            "paused" => Ok(Status::Paused),
            "stopped" => Ok(Status::Stopped),
            other => Err(RuntimeError::State(format!("unknown status {:?}", other))),
        }
    }
}

/// On-disk record. `status` and `pid` stay loosely typed so that foreign or
/// corrupted files still parse and fail validation with a useful message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    #[serde(rename = "ociVersion")]
    pub oci_version: String,
    pub id: String,
    pub status: String,
    pub pid: i64,
    pub bundle: String,
    #[serde(default)]
    pub annotations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<CgroupDriver>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RuntimeConfig>,
}

impl StateRecord {
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    pub fn from_json(content: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(content)?)
    }

    /// Check the record is usable. Returns the parsed status and pid.
    ///
    /// The recorded `id` is informational: containers are addressed by
    /// their state directory, so a differing id is not an error.
    pub fn validate(&self) -> Result<(Status, i32)> {
        if self.oci_version.is_empty() {
            return Err(RuntimeError::State("missing ociVersion".to_string()));
        }
        let status: Status = self.status.parse()?;

        let pid = i32::try_from(self.pid)
            .map_err(|_| RuntimeError::State(format!("pid {} out of range", self.pid)))?;
        if pid < 0 {
            return Err(RuntimeError::State(format!("negative pid {}", pid)));
        }
        if pid == 0 && !matches!(status, Status::Stopped | Status::Creating) {
            return Err(RuntimeError::State(format!(
                "status {} requires an init pid",
                status
            )));
        }

        if !Path::new(&self.bundle).is_absolute() {
            return Err(RuntimeError::State(format!(
                "bundle {:?} must be an absolute path",
                self.bundle
            )));
        }
        for annotation in &self.annotations {
            if annotation.is_empty() || annotation.starts_with('=') {
                return Err(RuntimeError::State(format!(
                    "malformed annotation {:?}",
                    annotation
                )));
            }
        }

        Ok((status, pid))
    }
}

/// Split `key=value` annotations into a map; bare keys map to "".
pub fn annotation_map(annotations: &[String]) -> BTreeMap<String, String> {
    annotations
        .iter()
        .map(|a| match a.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (a.clone(), String::new()),
        })
        .collect()
}

/// The OCI runtime-spec `state` document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciState {
    #[serde(rename = "ociVersion")]
    pub oci_version: String,
    pub id: String,
    pub status: Status,
    pub pid: i32,
    pub bundle: String,
    pub annotations: BTreeMap<String, String>,
}
