//! Configuration module for the execution engine
//!
//! Supports YAML configuration files and programmatic construction. Every
//! section has defaults, so an empty document is a valid configuration.

pub mod loader;
pub mod types;

pub use loader::*;
pub use types::*;
