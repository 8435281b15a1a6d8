//! Command implementations.

pub mod config;
pub mod metadata;

pub use config::run_config;
pub use metadata::run_metadata;
