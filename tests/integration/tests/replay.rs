//! Replay protection shared by every engine of a factory.

use std::collections::BTreeMap;

use crate::common::{authn_request, Loopback};

/// Tests that a message ID is accepted once per country.
#[tokio::test]
async fn test_replayed_request_is_detected() -> anyhow::Result<()> {
    let env = Loopback::new()?;

    let xml = env.sp.generate_request(&authn_request("ABC123"))?;
    let request = env.node.process_request(&xml).await?;

    assert!(env.node.check_not_present_in_cache(Some(&request.id), "BE").await?);
    assert!(!env.node.check_not_present_in_cache(Some(&request.id), "BE").await?);
    // The same ID from another country is a different message.
    assert!(env.node.check_not_present_in_cache(Some(&request.id), "ES").await?);
    // Without an ID there is nothing to remember.
    assert!(env.node.check_not_present_in_cache(None, "BE").await?);
    assert!(env.node.check_not_present_in_cache(None, "BE").await?);

    Ok(())
}

/// Tests that engines of one factory share the replay cache.
#[tokio::test]
async fn test_replay_cache_is_shared_across_engines() -> anyhow::Result<()> {
    let env = Loopback::new()?;
    let strict = env.factory.get_engine(
        "CPEPS",
        &BTreeMap::from([(
            "response_encryption_mandatory".to_string(),
            "true".to_string(),
        )]),
    )?;
    assert!(!std::sync::Arc::ptr_eq(&strict, &env.node));

    assert!(env.node.check_not_present_in_cache(Some("_shared-1"), "BE").await?);
    assert!(!strict.check_not_present_in_cache(Some("_shared-1"), "BE").await?);
    assert!(!env.factory.anti_replay().check_not_present_in_cache(Some("_shared-1"), "BE").await?);

    env.factory.release_engine(&strict);
    Ok(())
}
