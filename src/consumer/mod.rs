//! Byte stream consumer
//!
//! Deterministic mapping from raw fuzz bytes to primitives and nested records.

pub mod generate;
pub mod input;

pub use generate::Generate;
pub use input::{ConsumeError, ConsumerLimits, FuzzInput};
