//! Execution control
//!
//! The container init entry point and the exec plan it produces.

pub mod init;

pub use init::{Capabilities, ExecPlan, InitConfig, StandardInit};
