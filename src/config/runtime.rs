/// Container runtime configuration records
///
/// These are the structured values the harnesses synthesise from fuzz bytes.
/// Maps are `BTreeMap` so that generation and serialisation order never
/// depends on hashing.
use crate::consumer::{ConsumeError, FuzzInput, Generate};
use crate::kernel::cgroup::devices::Rule;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Cgroup parent that selects the systemd driver.
pub const SYSTEMD_PARENT_SLICE: &str = "system.slice";

/// Resource limit names accepted in `Rlimit::kind`.
pub const RLIMIT_TYPES: &[&str] = &[
    "RLIMIT_AS",
    "RLIMIT_CORE",
    "RLIMIT_CPU",
    "RLIMIT_DATA",
    "RLIMIT_FSIZE",
    "RLIMIT_LOCKS",
    "RLIMIT_MEMLOCK",
    "RLIMIT_MSGQUEUE",
    "RLIMIT_NICE",
    "RLIMIT_NOFILE",
    "RLIMIT_NPROC",
    "RLIMIT_RSS",
    "RLIMIT_RTPRIO",
    "RLIMIT_RTTIME",
    "RLIMIT_SIGPENDING",
    "RLIMIT_STACK",
];

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceType {
    #[default]
    Mount,
    Uts,
    Ipc,
    Pid,
    Network,
    User,
    Cgroup,
}

impl NamespaceType {
    /// Name of the entry under `/proc/<pid>/ns/`.
    pub fn proc_name(self) -> &'static str {
        match self {
            NamespaceType::Mount => "mnt",
            NamespaceType::Uts => "uts",
            NamespaceType::Ipc => "ipc",
            NamespaceType::Pid => "pid",
            NamespaceType::Network => "net",
            NamespaceType::User => "user",
            NamespaceType::Cgroup => "cgroup",
        }
    }
}

impl fmt::Display for NamespaceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.proc_name())
    }
}

crate::generate_choice!(NamespaceType {
    NamespaceType::Mount,
    NamespaceType::Uts,
    NamespaceType::Ipc,
    NamespaceType::Pid,
    NamespaceType::Network,
    NamespaceType::User,
    NamespaceType::Cgroup,
});

/// A namespace to create, or join when `path` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    #[serde(rename = "type")]
    pub kind: NamespaceType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
}

crate::generate_record!(Namespace { kind, path });

impl Namespace {
    pub fn new(kind: NamespaceType) -> Self {
        Self {
            kind,
            path: String::new(),
        }
    }
}

/// Map a fuzzed selector onto one of three namespace sets.
///
/// First match wins: multiples of 3 get UTS only, remaining multiples of 4
/// get mount only, everything else gets none.
pub fn select_namespaces(selector: i64) -> Vec<Namespace> {
    if selector % 3 == 0 {
        vec![Namespace::new(NamespaceType::Uts)]
    } else if selector % 4 == 0 {
        vec![Namespace::new(NamespaceType::Mount)]
    } else {
        Vec::new()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub source: String,
    pub destination: String,
    pub device: String,
    pub flags: u32,
    pub data: String,
}

crate::generate_record!(Mount {
    source,
    destination,
    device,
    flags,
    data,
});

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rlimit {
    #[serde(rename = "type")]
    pub kind: String,
    pub hard: u64,
    pub soft: u64,
}

crate::generate_record!(Rlimit { kind, hard, soft });

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resources {
    /// Bytes; 0 is unlimited, -1 is explicitly unlimited.
    pub memory: i64,
    pub memory_swap: i64,
    pub pids_limit: i64,
    pub cpu_shares: u64,
    pub cpu_quota: i64,
    pub cpu_period: u64,
    pub cpuset_cpus: String,
    pub devices: Vec<Rule>,
}

crate::generate_record!(Resources {
    memory,
    memory_swap,
    pids_limit,
    cpu_shares,
    cpu_quota,
    cpu_period,
    cpuset_cpus,
    devices,
});

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CgroupConfig {
    pub name: String,
    pub parent: String,
    /// Explicit path relative to the cgroup root; overrides parent/name.
    pub path: String,
    pub scope_prefix: String,
    pub resources: Resources,
}

crate::generate_record!(CgroupConfig {
    name,
    parent,
    path,
    scope_prefix,
    resources,
});

/// Container configuration accepted by `Factory::create`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub rootfs: String,
    pub readonly_fs: bool,
    pub hostname: String,
    pub namespaces: Vec<Namespace>,
    pub cgroups: Option<CgroupConfig>,
    pub mounts: Vec<Mount>,
    pub rlimits: Vec<Rlimit>,
    pub sysctl: BTreeMap<String, String>,
    pub masked_paths: Vec<String>,
    pub readonly_paths: Vec<String>,
    pub no_new_privileges: bool,
    pub oom_score_adj: Option<i32>,
    /// `key=value` labels; `bundle=<path>` feeds the OCI state projection.
    pub labels: Vec<String>,
}

crate::generate_record!(RuntimeConfig {
    rootfs,
    readonly_fs,
    hostname,
    namespaces,
    cgroups,
    mounts,
    rlimits,
    sysctl,
    masked_paths,
    readonly_paths,
    no_new_privileges,
    oom_score_adj,
    labels,
});

impl RuntimeConfig {
    pub fn has_namespace(&self, kind: NamespaceType) -> bool {
        self.namespaces.iter().any(|ns| ns.kind == kind)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.iter().find_map(|label| {
            label
                .split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }
}

/// Parse a generated value from a standalone buffer, for callers that do not
/// already hold a `FuzzInput`.
pub fn generate_from<T: Generate>(
    data: &[u8],
    limits: crate::consumer::ConsumerLimits,
) -> Result<T, ConsumeError> {
    FuzzInput::new(data, limits).populate()
}
