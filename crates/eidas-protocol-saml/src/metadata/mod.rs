//! Partner metadata.
//!
//! Remote entity descriptors are fetched over HTTP or provisioned as files,
//! parsed into [`EntityDescriptor`] and cached by URL in a
//! [`MetadataProcessor`]. The node's own metadata is written by
//! [`MetadataGenerator`].

mod fetcher;
mod generator;
mod model;
mod processor;
mod repository;

pub use fetcher::{HttpMetadataFetcher, MetadataFetcher};
pub use generator::MetadataGenerator;
pub use model::{
    Endpoint, EntityDescriptor, IdpSsoDescriptor, KeyDescriptor, KeyUse, RoleDescriptor,
    SpSsoDescriptor,
};
pub use processor::{MetadataOrigin, MetadataProcessor};
pub use repository::FileMetadataRepository;
