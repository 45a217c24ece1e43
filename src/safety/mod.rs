//! Safety and cleanup
//!
//! Scratch resources with guaranteed release, traversal-safe path joins and
//! advisory locks around shared fixed paths.

pub mod lock;
pub mod scratch;
pub mod secure_join;
