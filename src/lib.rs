//! rustbox-fuzz: structured fuzz harnesses for container runtime subsystems
//!
//! Raw bytes from a coverage-guided fuzzer become well-typed, adversarial
//! configs, state files and device rule lists, which are then driven through
//! the runtime's stateful APIs until something crashes, hangs or leaks.
//!
//! # Architecture
//!
//! ## Input Generation ([`consumer`])
//! - [`consumer::FuzzInput`]: bounded, deterministic extraction of primitives
//! - [`consumer::Generate`]: field-by-field population of nested records
//!
//! ## Harnesses ([`harness`])
//! - [`harness::InitHarness`]: container init bootstrap
//! - [`harness::LifecycleHarness`]: create, query and destroy a container
//! - [`harness::FactoryHarness`]: load a container from a fuzzed state file
//! - [`harness::DeviceRuleHarness`]: device cgroup rule transitions
//!
//! ## Subsystems Under Test
//! - [`exec::init`]: dry-run init bootstrap and sync protocol
//! - [`runtime`]: container factory, containers and persisted state
//! - [`kernel::cgroup`]: cgroupfs and systemd managers, device rule emulator
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::scratch`]: per-run scratch files and directories
//! - [`safety::secure_join`]: path joins that cannot leave their base
//! - [`safety::lock`]: directory locks for shared fixed paths
//!
//! ## Configuration ([`config`])
//! - [`config::harness`]: harness settings loadable from JSON
//! - [`config::runtime`]: container configuration records
//! - [`config::validator`]: container config validation
//! - [`config::types`]: shared error type
//!
//! # Outcomes
//!
//! Every harness returns a [`harness::Signal`]: `Invalid` (-1) for inputs
//! rejected before any resource was touched, `Uninteresting` (0) when a
//! precondition failed, `Completed` (1) when the subsystem was exercised.
//! Errors returned by a subsystem are never findings.

// Input Generation
pub mod consumer;

// Harnesses
pub mod harness;

// Subsystems Under Test
pub mod exec;
pub mod kernel;
pub mod runtime;

// Safety & Cleanup
pub mod safety;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the replay binary.
pub mod cli;

pub use config::harness::HarnessConfig;
pub use config::types::{Result, RuntimeError};
pub use harness::{Harness, Signal};
