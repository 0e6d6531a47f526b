//! Domain layer: models, ports, and errors for the nudge engine.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
