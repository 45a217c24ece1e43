//! Utilities
//!
//! Filesystem helpers shared across subsystems.

pub mod fs;
