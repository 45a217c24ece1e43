/// Container lifecycle: create, query, destroy
///
/// A config cut short by the input keeps the fields it got; only a missing
/// namespace selector or name abandons the run.
use super::{Harness, Signal};
use crate::config::harness::HarnessConfig;
use crate::config::runtime::{select_namespaces, RuntimeConfig};
use crate::consumer::FuzzInput;
use crate::gated;
use crate::kernel::cgroup::CgroupDriver;
use crate::runtime::{Container, Factory, FactoryOptions};
use crate::utils::fs::ensure_dir;
use log::Level;

const MIN_LEN: usize = 4;

#[derive(Clone, Debug)]
pub struct LifecycleHarness {
    config: HarnessConfig,
}

impl LifecycleHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }
}

/// Destroys the container on every exit path, unwinding included.
struct DestroyGuard(Container);

impl Drop for DestroyGuard {
    fn drop(&mut self) {
        // a failed destroy leaves sandbox litter, nothing more
        let _ = self.0.destroy();
    }
}

impl Harness for LifecycleHarness {
    fn name(&self) -> &'static str {
        "lifecycle"
    }

    fn min_len(&self) -> usize {
        MIN_LEN
    }

    fn run(&self, data: &[u8]) -> Signal {
        if data.len() < MIN_LEN {
            return Signal::Invalid;
        }

        let root = &self.config.lifecycle_root;
        if ensure_dir(root, 0o711).is_err() {
            return Signal::Invalid;
        }

        let mut input = FuzzInput::new(data, self.config.limits);
        let mut config = RuntimeConfig::default();
        if let Err(e) = input.populate_into(&mut config) {
            gated!(self.config.log_level, Level::Trace, "partial runtime config: {}", e);
        }
        config.rootfs = root.to_string_lossy().into_owned();

        let Ok(selector) = input.get_int() else {
            return Signal::Uninteresting;
        };
        config.namespaces = select_namespaces(selector);

        let Ok(name) = input.get_string() else {
            return Signal::Uninteresting;
        };

        let driver = CgroupDriver::for_config(config.cgroups.as_ref());
        let options = FactoryOptions {
            cgroup_root: self.config.cgroup_root.clone(),
            verbosity: self.config.log_level,
        };
        let Ok(factory) = Factory::new(root, driver, options) else {
            return Signal::Uninteresting;
        };
        let container = match factory.create(&name, &config) {
            Ok(container) => DestroyGuard(container),
            Err(e) => {
                gated!(self.config.log_level, Level::Debug, "create {:?} failed: {}", name, e);
                return Signal::Uninteresting;
            }
        };

        // results are irrelevant; the calls themselves are the test
        let _ = container.0.state();
        let _ = container.0.stats();
        let _ = container.0.oci_state();
        let _ = container.0.processes();

        Signal::Completed
    }
}
