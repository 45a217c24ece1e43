//! Cgroup management
//!
//! A [`CgroupManager`] per driver: plain cgroupfs directories or systemd
//! slices and scopes. Device access policy lives in [`devices`].

pub mod devices;
pub mod fs;
pub mod manager;
pub mod systemd;

pub use fs::FsManager;
pub use manager::{new_manager, CgroupDriver, CgroupManager, CgroupStats};
pub use systemd::{expand_slice, SystemdManager};
