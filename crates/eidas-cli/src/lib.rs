//! # eidas-cli
//!
//! Command-line tools for an eIDAS node.
//!
//! This crate provides:
//! - Static metadata repository management (list, show, add, remove)
//! - Configuration checks that build every configured engine instance

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::Cli;
pub use error::{CliError, CliResult};
