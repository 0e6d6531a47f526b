//! Infrastructure: configuration loading and logging setup.

pub mod config;
pub mod logging;
