#![no_main]

use libfuzzer_sys::{fuzz_target, Corpus};
use rustbox_fuzz::harness::{Harness, InitHarness, Signal};
use rustbox_fuzz::HarnessConfig;
use std::sync::OnceLock;

static HARNESS: OnceLock<InitHarness> = OnceLock::new();

fuzz_target!(|data: &[u8]| -> Corpus {
    let harness = HARNESS.get_or_init(|| InitHarness::new(HarnessConfig::default()));
    match harness.run(data) {
        Signal::Invalid => Corpus::Reject,
        Signal::Uninteresting | Signal::Completed => Corpus::Keep,
    }
});
