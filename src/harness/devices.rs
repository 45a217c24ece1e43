/// Device cgroup rule transitions
///
/// Two rule lists become two emulators; the harness asks for the rules
/// that move a cgroup from the first policy to the second.
use super::{Harness, Signal};
use crate::config::harness::HarnessConfig;
use crate::consumer::FuzzInput;
use crate::gated;
use crate::kernel::cgroup::devices::Emulator;
use log::Level;

#[derive(Clone, Debug)]
pub struct DeviceRuleHarness {
    config: HarnessConfig,
}

impl DeviceRuleHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }
}

impl Harness for DeviceRuleHarness {
    fn name(&self) -> &'static str {
        "devices"
    }

    fn min_len(&self) -> usize {
        0
    }

    fn run(&self, data: &[u8]) -> Signal {
        let mut input = FuzzInput::new(data, self.config.limits);

        let (Ok(source), Ok(target)) = (input.get_string(), input.get_string()) else {
            return Signal::Uninteresting;
        };
        let (Ok(source), Ok(target)) = (Emulator::from_list(&source), Emulator::from_list(&target))
        else {
            return Signal::Uninteresting;
        };

        let rules = source.transition(&target);
        gated!(
            self.config.log_level,
            Level::Trace,
            "transition emitted {} rules",
            rules.len()
        );
        Signal::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(strings: &[&str]) -> Vec<u8> {
        let mut data = Vec::new();
        for s in strings {
            data.extend_from_slice(&(s.len() as u32).to_be_bytes());
            data.extend_from_slice(s.as_bytes());
        }
        data
    }

    #[test]
    fn test_two_valid_lists_complete() {
        let harness = DeviceRuleHarness::new(HarnessConfig::default());
        let data = encode(&["a *:* rwm", "deny a *:* rwm\nc 1:3 rw"]);
        assert_eq!(harness.run(&data), Signal::Completed);
    }

    #[test]
    fn test_empty_lists_complete() {
        let harness = DeviceRuleHarness::new(HarnessConfig::default());
        assert_eq!(harness.run(&encode(&["", ""])), Signal::Completed);
    }

    #[test]
    fn test_short_or_bad_input_is_uninteresting() {
        let harness = DeviceRuleHarness::new(HarnessConfig::default());
        assert_eq!(harness.run(&[]), Signal::Uninteresting);
        assert_eq!(harness.run(&encode(&["a *:* rwm"])), Signal::Uninteresting);
        assert_eq!(harness.run(&encode(&["q 1:1 r", ""])), Signal::Uninteresting);
    }
}
