//! Nodes that only trust metadata provisioned on disk.

use std::collections::BTreeMap;
use std::sync::Arc;

use eidas_core::SystemClock;
use eidas_protocol_saml::metadata::{FileMetadataRepository, MetadataOrigin};
use eidas_protocol_saml::{EngineFactory, ReloadableConfiguration, RequestSession};

use crate::common::{authn_request, node_config, Loopback, SP_ACS, SP_URL};

/// Tests validation against a static repository with HTTP retrieval disabled.
#[tokio::test]
async fn test_static_repository_serves_metadata() -> anyhow::Result<()> {
    // Publish the SP's signed metadata first.
    let env = Loopback::new()?;
    let sp_metadata = env
        .fetcher
        .document(SP_URL)
        .ok_or_else(|| anyhow::anyhow!("SP metadata not published"))?;

    let dir = tempfile::tempdir()?;
    let repository = FileMetadataRepository::new(dir.path())?;
    repository.add_document("sp.xml", &sp_metadata)?;

    let mut config = node_config();
    let node = config
        .instances
        .get_mut("CPEPS")
        .ok_or_else(|| anyhow::anyhow!("CPEPS instance missing"))?;
    node.metadata.http_retrieval = false;
    node.metadata.static_repository = Some(dir.path().to_path_buf());

    let factory = EngineFactory::new(
        Arc::new(ReloadableConfiguration::new(config)),
        Arc::new(SystemClock),
    )?;
    let sp = factory.get_engine("SP", &BTreeMap::new())?;
    let node = factory.get_engine("CPEPS", &BTreeMap::new())?;

    let components = node.components()?;
    let metadata = components
        .metadata()
        .ok_or_else(|| anyhow::anyhow!("metadata disabled"))?;
    assert_eq!(metadata.origin(SP_URL), Some(MetadataOrigin::Static));

    let xml = sp.generate_request(&authn_request("_static-1"))?;
    let mut request = node.process_request(&xml).await?;
    node.validate_request(Some(&mut request), &RequestSession::new())
        .await?;
    assert_eq!(request.assertion_consumer_service_url.as_deref(), Some(SP_ACS));

    // Flushing keeps provisioned entries.
    metadata.flush();
    assert_eq!(metadata.origin(SP_URL), Some(MetadataOrigin::Static));

    Ok(())
}

/// Tests that an unknown issuer is rejected when nothing may be fetched.
#[tokio::test]
async fn test_unprovisioned_issuer_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut config = node_config();
    if let Some(node) = config.instances.get_mut("CPEPS") {
        node.metadata.http_retrieval = false;
        node.metadata.static_repository = Some(dir.path().to_path_buf());
    }
    let factory = EngineFactory::new(
        Arc::new(ReloadableConfiguration::new(config)),
        Arc::new(SystemClock),
    )?;
    let sp = factory.get_engine("SP", &BTreeMap::new())?;
    let node = factory.get_engine("CPEPS", &BTreeMap::new())?;

    let xml = sp.generate_request(&authn_request("_static-2"))?;
    let err = node
        .process_request(&xml)
        .await
        .expect_err("no metadata for the SP");
    assert!(err.is_invalid_saml());

    Ok(())
}
