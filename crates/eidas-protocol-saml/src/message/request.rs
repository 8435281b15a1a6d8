//! `samlp:AuthnRequest` documents.

use super::{format_instant, CONSENT_UNSPECIFIED, ENTITY_FORMAT};
use crate::error::{SamlError, SamlResult};
use crate::extensions::ExtensionProcessor;
use crate::types::{AuthnRequest, SAMLP_NS, SAML_NS, SAML_VERSION};
use crate::xml;

/// Builds an unsigned `AuthnRequest` document.
pub fn build_authn_request(
    processor: &dyn ExtensionProcessor,
    request: &AuthnRequest,
) -> SamlResult<String> {
    if request.issuer.trim().is_empty() {
        return Err(SamlError::Message("request issuer is empty".to_string()));
    }

    let mut header = format!(
        r#"ID="{}" Version="{SAML_VERSION}" IssueInstant="{}" Consent="{CONSENT_UNSPECIFIED}" ForceAuthn="true" IsPassive="false""#,
        xml::escape(&request.id),
        format_instant(request.issue_instant)
    );
    for (name, value) in [
        ("Destination", request.destination.as_deref()),
        ("ProviderName", request.provider_name.as_deref()),
        (
            "AssertionConsumerServiceURL",
            request.assertion_consumer_service_url.as_deref(),
        ),
        ("ProtocolBinding", request.protocol_binding.map(|b| b.uri())),
    ] {
        if let Some(value) = value {
            header.push_str(&format!(r#" {name}="{}""#, xml::escape(value)));
        }
    }

    let extensions = processor.generate_extensions(request)?;
    let authn_context = processor.generate_authn_context(request)?;

    Ok(format!(
        r#"<samlp:AuthnRequest xmlns:samlp="{SAMLP_NS}" xmlns:saml2="{SAML_NS}" {header}><saml2:Issuer Format="{ENTITY_FORMAT}">{}</saml2:Issuer>{extensions}{authn_context}</samlp:AuthnRequest>"#,
        xml::escape(&request.issuer)
    ))
}

/// Parses an `AuthnRequest` document with the dialect's processor.
pub fn parse_authn_request(
    processor: &dyn ExtensionProcessor,
    xml: &str,
) -> SamlResult<AuthnRequest> {
    let request = processor.process_extensions(xml)?;
    if request.id.is_empty() {
        return Err(SamlError::Message(
            "document is not an AuthnRequest".to_string(),
        ));
    }
    tracing::debug!(
        id = %request.id,
        issuer = %request.issuer,
        format = %processor.format(),
        "Parsed AuthnRequest"
    );
    Ok(request)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use eidas_core::CoreProperties;

    use super::*;
    use crate::extensions::{EidasExtensionProcessor, StorkExtensionProcessor};
    use crate::types::{
        LevelOfAssurance, LoaComparison, RequestedAttribute, SamlBinding, SpType,
    };

    #[test]
    fn eidas_request_round_trip() {
        let processor = EidasExtensionProcessor::new(&CoreProperties::default());
        let mut request = AuthnRequest::with_id("_req-1", "https://sp.example.eu/metadata")
            .with_destination("https://node.example.be/ColleagueRequest")
            .with_acs_url("https://sp.example.eu/acs")
            .with_sp_type(SpType::Private)
            .with_loa(LevelOfAssurance::High, LoaComparison::Exact)
            .with_attribute(RequestedAttribute::new("PersonIdentifier", true));
        request.protocol_binding = Some(SamlBinding::HttpPost);
        request.provider_name = Some("Demo & Co".to_string());

        let xml = build_authn_request(&processor, &request).unwrap();
        let parsed = parse_authn_request(&processor, &xml).unwrap();

        assert_eq!(parsed.id, "_req-1");
        assert_eq!(parsed.destination, request.destination);
        assert_eq!(parsed.assertion_consumer_service_url, request.assertion_consumer_service_url);
        assert_eq!(parsed.protocol_binding, Some(SamlBinding::HttpPost));
        assert_eq!(parsed.provider_name.as_deref(), Some("Demo & Co"));
        assert_eq!(parsed.sp_type, Some(SpType::Private));
        assert_eq!(parsed.level_of_assurance, Some(LevelOfAssurance::High));
        assert_eq!(parsed.loa_comparison, Some(LoaComparison::Exact));
        assert_eq!(
            parsed.requested_attributes[0].name,
            "http://eidas.europa.eu/attributes/naturalperson/PersonIdentifier"
        );
        assert_eq!(
            parsed.issue_instant.timestamp_millis(),
            request.issue_instant.timestamp_millis()
        );
        assert!(processor.is_valid_request(&xml));
    }

    #[test]
    fn stork_request_is_not_eidas() {
        let core = CoreProperties {
            format: "stork1".to_string(),
            attributes: BTreeMap::from([(
                "eIdentifier".to_string(),
                "http://www.stork.gov.eu/1.0/eIdentifier".to_string(),
            )]),
            ..CoreProperties::default()
        };
        let stork = StorkExtensionProcessor::new(&core);
        let mut request = AuthnRequest::with_id("_s", "https://sp.example.eu/metadata")
            .with_attribute(RequestedAttribute::new("eIdentifier", true));
        request.stork.qaa = Some(2);

        let xml = build_authn_request(&stork, &request).unwrap();
        assert!(stork.is_valid_request(&xml));
        assert!(!EidasExtensionProcessor::new(&core).is_valid_request(&xml));
        assert_eq!(parse_authn_request(&stork, &xml).unwrap().stork.qaa, Some(2));
    }

    #[test]
    fn bare_extensions_are_not_a_request() {
        let processor = EidasExtensionProcessor::new(&CoreProperties::default());
        let extensions = processor
            .generate_extensions(&AuthnRequest::with_id("_x", "sp"))
            .unwrap();
        assert!(parse_authn_request(&processor, &extensions).is_err());

        let empty_issuer = AuthnRequest::with_id("_x", " ");
        assert!(build_authn_request(&processor, &empty_issuer).is_err());
    }
}
