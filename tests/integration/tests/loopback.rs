//! Request and response exchange between the service provider and the node.

use eidas_protocol_saml::bindings::{HttpPostBinding, HttpRedirectBinding, SamlMessageType};
use eidas_protocol_saml::{
    status_codes, sub_status_codes, AuthnResponse, EidasErrorKey, LevelOfAssurance,
    RequestSession, ResponseAttribute, SamlError, SpType,
};

use crate::common::{authn_request, Loopback, NODE_SSO, NODE_URL, PERSON_ID, SP_ACS, SP_URL};

/// Tests the full exchange: signed request, metadata checks, encrypted response.
#[tokio::test]
async fn test_request_response_exchange() -> anyhow::Result<()> {
    let env = Loopback::new()?;

    let xml = env.sp.generate_request(&authn_request("_exchange-1"))?;
    let mut request = env.node.process_request(&xml).await?;
    assert_eq!(request.issuer, SP_URL);
    assert_eq!(request.sp_type, None);

    let session = RequestSession::with_http_method("POST");
    env.node.validate_request(Some(&mut request), &session).await?;
    assert_eq!(request.assertion_consumer_service_url.as_deref(), Some(SP_ACS));

    let response = AuthnResponse::success(&request.id, NODE_URL, "BE/ES/0123456")
        .with_destination(SP_ACS)
        .with_loa(LevelOfAssurance::Substantial)
        .with_attribute(ResponseAttribute::new(PERSON_ID, "BE/ES/0123456"));
    let out = env.node.generate_response(&response, &request, "ES").await?;
    assert!(out.contains("EncryptedAssertion"), "response for ES should be encrypted");
    assert!(!out.contains("BE/ES/0123456"));

    let received = env.sp.process_response(&out).await?;
    assert!(received.is_success());
    assert!(received.encrypted);
    assert_eq!(received.in_response_to, "_exchange-1");
    assert_eq!(received.issuer, NODE_URL);
    assert_eq!(
        received.attribute(PERSON_ID).and_then(|a| a.first_value()),
        Some("BE/ES/0123456")
    );

    Ok(())
}

/// Tests that a request travels intact through the redirect binding.
#[tokio::test]
async fn test_redirect_binding_transport() -> anyhow::Result<()> {
    let env = Loopback::new()?;

    let xml = env.sp.generate_request(&authn_request("_redirect-1"))?;
    let url =
        HttpRedirectBinding::encode(&xml, NODE_SSO, Some("state-7"), SamlMessageType::Request)?;
    let decoded = HttpRedirectBinding::decode_url(&url)?;
    assert_eq!(decoded.message_type, SamlMessageType::Request);
    assert_eq!(decoded.relay_state.as_deref(), Some("state-7"));

    let request = env.node.process_request(&decoded.xml).await?;
    assert_eq!(request.id, "_redirect-1");

    Ok(())
}

/// Tests that the SP type may not be declared in both request and metadata.
#[tokio::test]
async fn test_inconsistent_sp_type_is_rejected() -> anyhow::Result<()> {
    let env = Loopback::new()?;

    let xml = env
        .sp
        .generate_request(&authn_request("_sptype-1").with_sp_type(SpType::Public))?;
    let mut request = env.node.process_request(&xml).await?;
    assert_eq!(request.sp_type, Some(SpType::Public));

    let err = env
        .node
        .validate_request(Some(&mut request), &RequestSession::new())
        .await
        .expect_err("SP type declared twice");
    assert!(err.is_invalid_saml());
    assert_eq!(err.root_key(), EidasErrorKey::ColleagueReqInconsistentSpType);

    Ok(())
}

/// Tests that an assertion consumer service missing from metadata is rejected.
#[tokio::test]
async fn test_unpublished_acs_is_rejected() -> anyhow::Result<()> {
    let env = Loopback::new()?;

    let xml = env.sp.generate_request(
        &authn_request("_acs-1").with_acs_url("https://attacker.example/acs"),
    )?;
    let mut request = env.node.process_request(&xml).await?;
    let err = env
        .node
        .validate_request(Some(&mut request), &RequestSession::new())
        .await
        .expect_err("ACS not in metadata");
    assert_eq!(err.key(), EidasErrorKey::ColleagueReqInvalidSaml);

    Ok(())
}

/// Tests that a failure status reaches the service provider signed and intact.
#[tokio::test]
async fn test_error_response_exchange() -> anyhow::Result<()> {
    let env = Loopback::new()?;

    let xml = env.sp.generate_request(&authn_request("_error-1"))?;
    let request = env.node.process_request(&xml).await?;
    let cause = SamlError::invalid_saml(EidasErrorKey::ColleagueReqInvalidLoa, "LoA too high");
    let out = env
        .node
        .generate_error_response(&request.id, Some(SP_ACS), &cause)?;

    let received = env.sp.process_response(&out).await?;
    assert!(!received.is_success());
    assert_eq!(received.in_response_to, "_error-1");
    assert_eq!(received.status.status_code, status_codes::REQUESTER);
    assert_eq!(
        received.status.sub_status_code.as_deref(),
        Some(sub_status_codes::NO_AUTHN_CONTEXT)
    );
    assert_eq!(
        received.status.status_message.as_deref(),
        Some(EidasErrorKey::ColleagueReqInvalidLoa.code())
    );

    Ok(())
}

/// Tests that a POST-encoded response decodes back to the signed document.
#[tokio::test]
async fn test_post_binding_transport() -> anyhow::Result<()> {
    let env = Loopback::new()?;

    let xml = env.sp.generate_request(&authn_request("_post-1"))?;
    let request = env.node.process_request(&xml).await?;
    let response = AuthnResponse::success(&request.id, NODE_URL, "BE/ES/42")
        .with_destination(SP_ACS)
        .with_loa(LevelOfAssurance::High);
    let out = env.node.generate_response(&response, &request, "ES").await?;

    let form = HttpPostBinding::encode_form(&out, SP_ACS, None, SamlMessageType::Response);
    assert!(form.contains(r#"name="SAMLResponse""#));
    let value = HttpPostBinding::encode_value(&out);
    let decoded = HttpPostBinding::decode(None, Some(&value), None)?;
    assert_eq!(decoded.message_type, SamlMessageType::Response);

    let received = env.sp.process_response(&decoded.xml).await?;
    assert_eq!(received.subject.as_deref(), Some("BE/ES/42"));
    assert_eq!(received.level_of_assurance, Some(LevelOfAssurance::High));

    Ok(())
}
