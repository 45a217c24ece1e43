/// Container init bootstrap
///
/// The first byte is the fifo descriptor number, the rest feeds an
/// `InitConfig`. A config cut short by the input is still handed to init:
/// half-built configs are exactly what the bootstrap path should survive.
use super::{Harness, Signal};
use crate::config::harness::HarnessConfig;
use crate::consumer::FuzzInput;
use crate::exec::init::{InitConfig, StandardInit};
use crate::gated;
use crate::safety::scratch::{ScratchKind, ScratchManager};
use log::Level;
use nix::unistd::getppid;

const MIN_LEN: usize = 5;

#[derive(Clone, Debug)]
pub struct InitHarness {
    config: HarnessConfig,
}

impl InitHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }
}

impl Harness for InitHarness {
    fn name(&self) -> &'static str {
        "init"
    }

    fn min_len(&self) -> usize {
        MIN_LEN
    }

    fn run(&self, data: &[u8]) -> Signal {
        if data.len() < MIN_LEN {
            return Signal::Invalid;
        }

        let Ok(scratch) = ScratchManager::new(&self.config.scratch_root, self.config.log_level)
        else {
            return Signal::Invalid;
        };
        let Ok(pipe) = scratch.acquire(ScratchKind::File, "pipe") else {
            return Signal::Invalid;
        };
        let Ok(console) = scratch.acquire(ScratchKind::File, "console-socket") else {
            return Signal::Invalid;
        };
        let (Ok(pipe_file), Ok(console_file)) = (pipe.try_clone_file(), console.try_clone_file())
        else {
            return Signal::Invalid;
        };

        let fifo_fd = i32::from(data[0]);
        let mut init_config = InitConfig::default();
        let mut input = FuzzInput::new(&data[1..], self.config.limits);
        if let Err(e) = input.populate_into(&mut init_config) {
            gated!(self.config.log_level, Level::Trace, "partial init config: {}", e);
        }

        let init = StandardInit {
            pipe: pipe_file,
            console_socket: console_file,
            parent_pid: getppid().as_raw(),
            config: init_config,
            fifo_fd,
        };
        // only a crash or hang matters here
        let _ = init.init();

        Signal::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn test_short_input_is_invalid_and_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::rooted_at(dir.path());
        let harness = InitHarness::new(config.clone());
        assert_eq!(harness.run(&[0, 0, 0, 0]), Signal::Invalid);
        assert!(!config.scratch_root.exists());
    }

    #[test]
    fn test_zero_bytes_complete_and_clean_up() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::rooted_at(dir.path());
        let harness = InitHarness::new(config.clone());
        assert_eq!(harness.run(&[0, 0, 0, 0, 0]), Signal::Completed);
        assert_eq!(entries(&config.scratch_root), 0);
    }

    #[test]
    fn test_unopened_fifo_fd_still_completes() {
        let dir = tempfile::tempdir().unwrap();
        let config = HarnessConfig::rooted_at(dir.path());
        let harness = InitHarness::new(config.clone());
        let data: Vec<u8> = std::iter::once(250).chain((0..64).map(|i| i as u8)).collect();
        assert_eq!(harness.run(&data), Signal::Completed);
        assert_eq!(entries(&config.scratch_root), 0);
    }
}
