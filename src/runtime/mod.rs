//! Container runtime
//!
//! Factory, containers and their persisted state.

pub mod container;
pub mod factory;
pub mod state;

pub use container::{Container, ContainerState};
pub use factory::{validate_id, Factory, FactoryOptions};
pub use state::{OciState, StateRecord, Status};
