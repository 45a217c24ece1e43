/// Container factory load path
///
/// Writes a fuzzed `state.json` for the container `fuzz` and asks the
/// factory to load it. The work directory is shared by every run, so the
/// write-load-remove sequence happens under a directory lock.
use super::{Harness, Signal};
use crate::config::harness::HarnessConfig;
use crate::consumer::FuzzInput;
use crate::gated;
use crate::kernel::cgroup::CgroupDriver;
use crate::runtime::state::{StateRecord, STATE_FILENAME};
use crate::runtime::{Factory, FactoryOptions};
use crate::safety::lock::with_dir_lock;
use crate::safety::secure_join::secure_join;
use crate::utils::fs::{ensure_dir, remove_path, write_file};
use log::Level;
use std::fs::File;
use std::path::PathBuf;

const MIN_LEN: usize = 20;
const MIN_FIELD_CHARS: usize = 5;
const CONTAINER_ID: &str = "fuzz";
const ANNOTATION: &str = "fuzz";

#[derive(Clone, Debug)]
pub struct FactoryHarness {
    config: HarnessConfig,
}

impl FactoryHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Decode the state record a run would write. `None` when a field runs
    /// out of bytes or a string field is too short to be worth loading.
    pub fn decode_record(&self, data: &[u8]) -> Option<StateRecord> {
        let mut input = FuzzInput::new(data, self.config.limits);
        let oci_version = input.get_string().ok()?;
        let id = input.get_string().ok()?;
        let status = input.get_string().ok()?;
        let pid = input.get_int().ok()?;
        let bundle = input.get_string().ok()?;

        let too_short = |s: &str| s.chars().count() < MIN_FIELD_CHARS;
        if too_short(&oci_version) || too_short(&id) || too_short(&bundle) {
            return None;
        }

        Some(StateRecord {
            oci_version,
            id,
            status,
            pid,
            bundle,
            annotations: vec![ANNOTATION.to_string()],
            created: None,
            driver: None,
            config: None,
        })
    }

    /// Write, check and load the record. Runs with the work directory locked.
    fn load_record(&self, work_dir: PathBuf, json: &[u8]) -> Signal {
        let state_path = work_dir.join(STATE_FILENAME);
        if write_file(&state_path, json, 0o600).is_err() {
            return Signal::Invalid;
        }
        let _cleanup = RemoveOnDrop(state_path);

        let Ok(joined) = secure_join(&work_dir, STATE_FILENAME) else {
            return Signal::Invalid;
        };
        if File::open(&joined).is_err() {
            return Signal::Invalid;
        }

        let options = FactoryOptions {
            cgroup_root: self.config.cgroup_root.clone(),
            verbosity: self.config.log_level,
        };
        let Ok(factory) = Factory::new(&self.config.factory_root, CgroupDriver::Fs, options) else {
            return Signal::Invalid;
        };
        // parse and validation errors are the expected outcome
        if let Err(e) = factory.load(CONTAINER_ID) {
            gated!(self.config.log_level, Level::Debug, "load failed: {}", e);
        }

        Signal::Completed
    }
}

struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        let _ = remove_path(&self.0);
    }
}

impl Harness for FactoryHarness {
    fn name(&self) -> &'static str {
        "factory"
    }

    fn min_len(&self) -> usize {
        MIN_LEN
    }

    fn run(&self, data: &[u8]) -> Signal {
        if data.len() < MIN_LEN {
            return Signal::Invalid;
        }

        let root = &self.config.factory_root;
        let work_dir = root.join(CONTAINER_ID);
        if ensure_dir(root, 0o711).is_err() || ensure_dir(&work_dir, 0o711).is_err() {
            return Signal::Invalid;
        }

        let Some(record) = self.decode_record(data) else {
            return Signal::Uninteresting;
        };
        let Ok(json) = record.to_json() else {
            return Signal::Invalid;
        };

        with_dir_lock(&work_dir, || self.load_record(work_dir.clone(), &json))
            .unwrap_or(Signal::Invalid)
    }
}
