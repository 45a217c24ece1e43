//! Configuration
//!
//! Container configuration records, their validation, the harness settings,
//! and the shared error type.

pub mod harness;
pub mod runtime;
pub mod types;
pub mod validator;
