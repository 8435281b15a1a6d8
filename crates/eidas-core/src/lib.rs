//! # eidas-core
//!
//! Configuration, error handling and time source shared by the eIDAS
//! protocol engine crates.
//!
//! Engine instances are described by a single TOML document with one
//! `[instances.<NAME>]` table per named instance (for example `CPEPS` or
//! `SP-SPEPS`). Production mode is applied after loading and always wins
//! over the stored values.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    AntiReplayCacheConfig, CipherConfig, CoreProperties, InstanceConfig, KeyReference,
    KeyStoreEntry, MetadataConfig, NodeConfig, SignerConfig,
};
pub use error::{Error, Result};
