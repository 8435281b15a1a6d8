//! Engine construction and lifecycle.
//!
//! A [`ProtocolEngine`] bundles the extension processor, signature,
//! encryption and metadata components of one configuration instance.
//! [`EngineFactory`] builds engines on demand, shares them between callers
//! and counts how many are in use. Both read configuration through a
//! [`ConfigurationAccessor`], so a [`ReloadableConfiguration::reload`]
//! reaches engines that were built before it.

mod configuration;
mod factory;
mod protocol;

pub use configuration::{ConfigurationAccessor, ReloadableConfiguration};
pub use factory::EngineFactory;
pub use protocol::{EngineComponents, ProtocolEngine, CLOCK_SKEW_SECONDS};
