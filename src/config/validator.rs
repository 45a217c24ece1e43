// Container config validation
// Runs before anything touches the filesystem; every problem is collected
// so a rejected config reports all of its faults at once.

use crate::config::runtime::{NamespaceType, RuntimeConfig, RLIMIT_TYPES};
use crate::config::types::{Result, RuntimeError};
use crate::kernel::cgroup::devices::Emulator;
use std::collections::BTreeSet;
use std::path::Path;

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Sysctls that belong to the IPC namespace.
const IPC_SYSCTLS: &[&str] = &[
    "kernel.msgmax",
    "kernel.msgmnb",
    "kernel.msgmni",
    "kernel.sem",
    "kernel.shmall",
    "kernel.shmmax",
    "kernel.shmmni",
    "kernel.shm_rmid_forced",
];

/// Collect every problem with `config`.
pub fn validate_config(config: &RuntimeConfig) -> ValidationResult {
    let mut result = ValidationResult::new();

    validate_rootfs(config, &mut result);
    validate_namespaces(config, &mut result);
    validate_mounts(config, &mut result);
    validate_rlimits(config, &mut result);
    validate_sysctl(config, &mut result);
    validate_resources(config, &mut result);

    if let Some(adj) = config.oom_score_adj {
        if !(-1000..=1000).contains(&adj) {
            result.add_error(format!("oom_score_adj {} outside [-1000, 1000]", adj));
        }
    }

    result
}

/// Fail with every collected error when `config` is not valid.
pub fn validate(config: &RuntimeConfig) -> Result<()> {
    let result = validate_config(config);
    if result.is_valid() {
        return Ok(());
    }
    Err(RuntimeError::Config(format!(
        "invalid container config:\n{}",
        result.errors.join("\n")
    )))
}

fn validate_rootfs(config: &RuntimeConfig, result: &mut ValidationResult) {
    let rootfs = Path::new(&config.rootfs);
    if !rootfs.is_absolute() {
        result.add_error(format!("rootfs must be an absolute path: {:?}", config.rootfs));
        return;
    }
    if !rootfs.is_dir() {
        result.add_error(format!("rootfs {:?} is not a directory", config.rootfs));
    }
}

fn validate_namespaces(config: &RuntimeConfig, result: &mut ValidationResult) {
    let mut seen = BTreeSet::new();
    for ns in &config.namespaces {
        if !seen.insert(ns.kind) {
            result.add_error(format!("duplicate namespace {}", ns.kind));
        }
        if !ns.path.is_empty() && !Path::new(&ns.path).is_absolute() {
            result.add_error(format!("namespace {} path {:?} must be absolute", ns.kind, ns.path));
        }
    }

    if !config.hostname.is_empty() && !config.has_namespace(NamespaceType::Uts) {
        result.add_error("unable to set hostname without a private UTS namespace".to_string());
    }

    let needs_mount_ns = !config.masked_paths.is_empty() || !config.readonly_paths.is_empty();
    if needs_mount_ns && !config.has_namespace(NamespaceType::Mount) {
        result.add_error(
            "masked and readonly paths require a private mount namespace".to_string(),
        );
    }
}

fn validate_mounts(config: &RuntimeConfig, result: &mut ValidationResult) {
    for mount in &config.mounts {
        if !Path::new(&mount.destination).is_absolute() {
            result.add_error(format!(
                "mount destination {:?} must be absolute",
                mount.destination
            ));
        }
    }
    for path in config.masked_paths.iter().chain(&config.readonly_paths) {
        if !Path::new(path).is_absolute() {
            result.add_error(format!("path {:?} must be absolute", path));
        }
    }
}

fn validate_rlimits(config: &RuntimeConfig, result: &mut ValidationResult) {
    let mut seen = BTreeSet::new();
    for rlimit in &config.rlimits {
        if !RLIMIT_TYPES.contains(&rlimit.kind.as_str()) {
            result.add_error(format!("unknown rlimit type {:?}", rlimit.kind));
        }
        if !seen.insert(rlimit.kind.as_str()) {
            result.add_error(format!("duplicate rlimit {:?}", rlimit.kind));
        }
        if rlimit.soft > rlimit.hard {
            result.add_error(format!(
                "rlimit {} soft limit {} exceeds hard limit {}",
                rlimit.kind, rlimit.soft, rlimit.hard
            ));
        }
    }
}

fn validate_sysctl(config: &RuntimeConfig, result: &mut ValidationResult) {
    for key in config.sysctl.keys() {
        let namespace = if IPC_SYSCTLS.contains(&key.as_str()) || key.starts_with("fs.mqueue.") {
            NamespaceType::Ipc
        } else if key.starts_with("net.") {
            NamespaceType::Network
        } else if key == "kernel.hostname" || key == "kernel.domainname" {
            NamespaceType::Uts
        } else {
            result.add_error(format!("sysctl {:?} is not namespaced", key));
            continue;
        };
        if !config.has_namespace(namespace) {
            result.add_error(format!(
                "sysctl {:?} requires a private {} namespace",
                key, namespace
            ));
        }
    }
}

fn validate_resources(config: &RuntimeConfig, result: &mut ValidationResult) {
    let Some(cgroups) = &config.cgroups else {
        return;
    };
    let resources = &cgroups.resources;

    if resources.memory < -1 {
        result.add_error(format!("memory limit {} is invalid", resources.memory));
    } else if resources.memory > 0 && resources.memory < 1024 * 1024 {
        result.add_warning(format!(
            "memory limit {} is very low (< 1MB), may cause OOM",
            resources.memory
        ));
    }
    if resources.memory_swap < -1 {
        result.add_error(format!("memory+swap limit {} is invalid", resources.memory_swap));
    }
    if resources.memory > 0 && resources.memory_swap > 0 && resources.memory_swap < resources.memory {
        result.add_error(format!(
            "memory+swap limit {} is below the memory limit {}",
            resources.memory_swap, resources.memory
        ));
    }
    if resources.cpu_quota > 0 && resources.cpu_period == 0 {
        result.add_error("cpu_quota requires a non-zero cpu_period".to_string());
    }

    let mut emulator = Emulator::new();
    for rule in &resources.devices {
        if let Err(e) = emulator.apply(rule) {
            result.add_error(format!("device rule [{}]: {}", rule, e));
        }
    }
}
