//! # eidas-cache
//!
//! Distributed map abstraction used by the eIDAS node for anti-replay
//! protection.
//!
//! The protocol engine only needs a key to boolean map with an atomic
//! put-if-absent. In a clustered deployment the map is backed by the
//! cluster's distributed map; [`InMemoryMapProvider`] covers a single
//! process.
//!
//! ## Example
//!
//! ```ignore
//! use eidas_cache::{DistributedMapFactory, ConcurrentMapProvider};
//!
//! let factory = DistributedMapFactory::new(None)?;
//! let map = factory.get_map(Some("antiReplayCache"))?;
//! let first = map.put_if_absent("BE/_abc", true).await?;
//! assert!(first.is_none());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod factory;
pub mod memory;
pub mod provider;

pub use error::{CacheError, CacheResult};
pub use factory::DistributedMapFactory;
pub use memory::InMemoryMapProvider;
pub use provider::ConcurrentMapProvider;
