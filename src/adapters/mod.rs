//! Adapters implementing the domain ports.

pub mod sink;
pub mod sqlite;
