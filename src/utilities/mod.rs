//! Ambient utilities: error taxonomy and runtime configuration.

pub mod config;
pub mod errors;
