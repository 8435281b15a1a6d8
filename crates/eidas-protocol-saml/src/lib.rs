//! eIDAS and STORK SAML 2.0 protocol engine.
//!
//! This crate builds, signs, encrypts, validates and parses the SAML
//! messages exchanged between eIDAS nodes:
//!
//! - **Dialects** - STORK 1.0 and eIDAS request extensions behind one
//!   [`ExtensionProcessor`](extensions::ExtensionProcessor) trait
//! - **XML signature** - enveloped signatures gated by an algorithm whitelist
//! - **Response encryption** - per-country or mandatory assertion encryption
//! - **Metadata** - partner metadata retrieval, caching and static repositories
//! - **Validation** - LoA, binding and SPType checks plus replay detection
//! - **Bindings** - HTTP-POST and HTTP-Redirect encoding
//!
//! # Architecture
//!
//! - [`engine`] - engine factory, reloadable configuration and the engine facade
//! - [`extensions`] - dialect-specific extension processing
//! - [`signature`] - XML signature signing and validation
//! - [`encryption`] - XML encryption of assertions
//! - [`metadata`] - metadata processing and generation
//! - [`validation`] - request validation and anti-replay
//! - [`message`] - request and response documents
//! - [`bindings`] - POST and Redirect binding implementations
//! - [`error`] - error types and eIDAS error codes
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use eidas_core::SystemClock;
//! use eidas_protocol_saml::engine::{EngineFactory, ReloadableConfiguration};
//!
//! let configuration = Arc::new(ReloadableConfiguration::from_env()?);
//! let factory = EngineFactory::new(configuration, Arc::new(SystemClock))?;
//! let engine = factory.get_engine("CPEPS", &Default::default())?;
//! let request = engine.process_request(&xml).await?;
//! factory.release_engine(&engine);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attribute;
pub mod bindings;
pub mod encryption;
pub mod engine;
pub mod error;
pub mod extensions;
pub mod message;
pub mod metadata;
pub mod session;
pub mod signature;
pub mod types;
pub mod validation;
pub mod xml;

pub use engine::{EngineFactory, ProtocolEngine, ReloadableConfiguration};
pub use error::{EidasErrorKey, SamlError, SamlResult};
pub use session::{RequestSession, SessionAttribute};
pub use types::*;
