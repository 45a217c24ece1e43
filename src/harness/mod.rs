//! Fuzz harnesses
//!
//! Each harness turns one fuzz input into calls against a single subsystem
//! and reports how far it got. Errors returned by the subsystem are expected
//! outcomes and are swallowed; only a crash, hang or leak is a finding.

pub mod devices;
pub mod factory;
pub mod init;
pub mod lifecycle;

pub use devices::DeviceRuleHarness;
pub use factory::FactoryHarness;
pub use init::InitHarness;
pub use lifecycle::LifecycleHarness;

use crate::config::harness::HarnessConfig;
use std::fmt;

/// Outcome of one harness run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum Signal {
    /// Input rejected before any subsystem was touched; keep it out of the corpus.
    Invalid = -1,
    /// Input parsed but a precondition failed before the interesting calls.
    Uninteresting = 0,
    /// The subsystem was exercised.
    Completed = 1,
}

impl Signal {
    /// The conventional `-1 / 0 / 1` value.
    pub fn raw(self) -> i32 {
        self as i8 as i32
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::Invalid => "invalid",
            Signal::Uninteresting => "uninteresting",
            Signal::Completed => "completed",
        };
        write!(f, "{} ({})", name, self.raw())
    }
}

pub trait Harness: Send + Sync {
    fn name(&self) -> &'static str;

    /// Inputs shorter than this are `Invalid` without further work.
    fn min_len(&self) -> usize;

    fn run(&self, data: &[u8]) -> Signal;
}

pub const TARGETS: &[&str] = &["init", "lifecycle", "factory", "devices"];

/// Build the harness registered under `name`.
pub fn by_name(name: &str, config: &HarnessConfig) -> Option<Box<dyn Harness>> {
    let harness: Box<dyn Harness> = match name {
        "init" => Box::new(InitHarness::new(config.clone())),
        "lifecycle" => Box::new(LifecycleHarness::new(config.clone())),
        "factory" => Box::new(FactoryHarness::new(config.clone())),
        "devices" => Box::new(DeviceRuleHarness::new(config.clone())),
        _ => return None,
    };
    Some(harness)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_values() {
        assert_eq!(Signal::Invalid.raw(), -1);
        assert_eq!(Signal::Uninteresting.raw(), 0);
        assert_eq!(Signal::Completed.raw(), 1);
        assert_eq!(Signal::Invalid.to_string(), "invalid (-1)");
    }

    #[test]
    fn test_registry() {
        let config = HarnessConfig::default();
        for name in TARGETS {
            let harness = by_name(name, &config).unwrap();
            assert_eq!(harness.name(), *name);
        }
        assert!(by_name("bogus", &config).is_none());
    }
}
