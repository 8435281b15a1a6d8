//! End-to-end integration tests.
//!
//! Two engines built from one node configuration talk to each other: a
//! service provider instance and a node instance, each publishing signed
//! metadata the other fetches through an in-memory fetcher.

mod common;
mod loopback;
mod metadata_trust;
mod replay;
mod static_metadata;
