//! Thin renditions of the kernel-facing subsystems the harnesses drive.

pub mod cgroup;
