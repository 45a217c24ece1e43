//! Devices controller emulation
//!
//! Parses device rule lists and computes the rule sequence needed to move a
//! devices cgroup from one effective policy to another.

pub mod emulator;
pub mod rule;

pub use emulator::Emulator;
pub use rule::{DeviceSelector, DeviceType, Permissions, Rule};
