//! Signer keys taken from metadata are only trusted once the metadata
//! signature itself has been checked.

use std::collections::BTreeMap;

use eidas_core::{Clock, InstanceConfig, KeyReference, SystemClock};
use eidas_protocol_saml::{AuthnResponse, EidasErrorKey, SamlBinding};

use crate::common::{authn_request, entry, node_config, Loopback, SP_ACS};

const EVIL_URL: &str = "https://evil.example/metadata";
const SELF_SIGNED_DN: &str = "C=EU, O=eIDAS Test, CN=self-signed-node";

/// An engine signing with a self-signed key nobody trusts.
fn evil_instance() -> InstanceConfig {
    let mut instance = InstanceConfig::default();
    instance.core.issuer = Some(EVIL_URL.to_string());
    instance.signer.signing = Some(KeyReference {
        serial_number: "2001".to_string(),
        issuer: SELF_SIGNED_DN.to_string(),
    });
    instance.signer.keystore = vec![entry("selfsigned")];
    instance.metadata.enabled = false;
    instance
}

struct Forged {
    env: Loopback,
    request: String,
    response: String,
}

/// Builds the loopback pair plus a forging engine whose metadata is
/// published unsigned but lists its own signing certificate.
async fn forge(check_signature: bool) -> anyhow::Result<Forged> {
    let mut config = node_config();
    config.instances.insert("EVIL".to_string(), evil_instance());
    for instance in config.instances.values_mut() {
        instance.metadata.check_signature = check_signature;
    }
    let env = Loopback::with_config(config)?;

    let evil = env.factory.get_engine("EVIL", &BTreeMap::new())?;
    let metadata = evil
        .metadata_generator()?
        .with_single_sign_on_service(SamlBinding::HttpPost, "https://evil.example/sso")
        .generate(SystemClock.now());
    assert!(!metadata.contains("ds:Signature"));
    env.fetcher.publish(EVIL_URL, metadata);

    let mut request = authn_request("_forged-req");
    request.issuer = EVIL_URL.to_string();
    let request = evil.generate_request(&request)?;
    let response = evil
        .generate_response(
            &AuthnResponse::success("_forged-1", EVIL_URL, "BE/BE/victim")
                .with_destination(SP_ACS),
            &authn_request("_forged-1"),
            "BE",
        )
        .await?;

    Ok(Forged {
        env,
        request,
        response,
    })
}

/// Tests that a response signed with a key from unsigned metadata is rejected.
#[tokio::test]
async fn test_unsigned_metadata_does_not_vouch_for_response() -> anyhow::Result<()> {
    let forged = forge(true).await?;

    let err = forged
        .env
        .sp
        .process_response(&forged.response)
        .await
        .expect_err("signer key comes from unsigned metadata");
    assert!(err.is_invalid_saml());
    assert_eq!(err.key(), EidasErrorKey::ColleagueRespInvalidSaml);
    assert_eq!(err.root_key(), EidasErrorKey::SamlEngineInvalidMetadata);

    Ok(())
}

/// Tests that a request signed with a key from unsigned metadata is rejected.
#[tokio::test]
async fn test_unsigned_metadata_does_not_vouch_for_request() -> anyhow::Result<()> {
    let forged = forge(true).await?;

    let err = forged
        .env
        .node
        .process_request(&forged.request)
        .await
        .expect_err("signer key comes from unsigned metadata");
    assert_eq!(err.key(), EidasErrorKey::ColleagueReqInvalidSaml);
    assert_eq!(err.root_key(), EidasErrorKey::SamlEngineInvalidMetadata);

    Ok(())
}

/// Tests that the check follows the metadata signature toggle.
#[tokio::test]
async fn test_disabled_signature_check_trusts_metadata_keys() -> anyhow::Result<()> {
    let forged = forge(false).await?;

    let received = forged.env.sp.process_response(&forged.response).await?;
    assert_eq!(received.issuer, EVIL_URL);
    assert_eq!(received.subject.as_deref(), Some("BE/BE/victim"));

    Ok(())
}
