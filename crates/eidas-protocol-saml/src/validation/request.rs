//! Cross-checks of inbound requests against the issuer's metadata.

use crate::error::{EidasErrorKey, SamlError, SamlResult};
use crate::metadata::MetadataProcessor;
use crate::session::RequestSession;
use crate::types::{AuthnRequest, LevelOfAssurance};

/// Validates inbound `AuthnRequest`s for one engine.
#[derive(Debug, Clone, Copy)]
pub struct RequestValidator<'a> {
    metadata: Option<&'a MetadataProcessor>,
    validate_binding: bool,
    max_loa: LevelOfAssurance,
}

impl<'a> RequestValidator<'a> {
    /// Creates a validator.
    #[must_use]
    pub const fn new(
        metadata: Option<&'a MetadataProcessor>,
        validate_binding: bool,
        max_loa: LevelOfAssurance,
    ) -> Self {
        Self {
            metadata,
            validate_binding,
            max_loa,
        }
    }

    /// Validates `request`, stopping at the first failure.
    ///
    /// Checks, in order, the level of assurance, the issuer's metadata
    /// signature, the assertion consumer service URL, the binding and the
    /// SP type. On success the request's assertion consumer service URL is
    /// the one published in metadata. Every failure is an invalid SAML
    /// error and means the request must be rejected.
    pub async fn validate_request(
        &self,
        request: Option<&mut AuthnRequest>,
        session: &RequestSession,
    ) -> SamlResult<()> {
        let request = request.ok_or_else(|| {
            SamlError::invalid_saml(EidasErrorKey::ColleagueReqInvalidLoa, "no request")
        })?;
        self.check_loa(request)?;
        let metadata = self.metadata.ok_or_else(|| {
            SamlError::invalid_saml(
                EidasErrorKey::ColleagueReqInvalidSaml,
                "no metadata processor configured",
            )
        })?;

        let issuer = request.issuer.clone();
        let wrap = |e| SamlError::wrap_invalid_saml(EidasErrorKey::ColleagueReqInvalidSaml, e);

        metadata.check_metadata_signature(&issuer).await.map_err(wrap)?;
        self.check_assertion_consumer_service(metadata, request)
            .await
            .map_err(wrap)?;
        if self.validate_binding {
            check_binding(metadata, &issuer, session).await.map_err(wrap)?;
        }
        check_sp_type(metadata, request).await.map_err(wrap)?;

        tracing::debug!(id = %request.id, issuer = %issuer, "Request passed validation");
        Ok(())
    }

    fn check_loa(&self, request: &AuthnRequest) -> SamlResult<()> {
        let invalid =
            |message: String| SamlError::invalid_saml(EidasErrorKey::ColleagueReqInvalidLoa, message);
        let loa = request
            .level_of_assurance
            .ok_or_else(|| invalid("request has no level of assurance".to_string()))?;
        let comparison = request
            .loa_comparison
            .ok_or_else(|| invalid("request has no LoA comparison".to_string()))?;
        if !comparison.accepts(loa, self.max_loa) {
            return Err(invalid(format!(
                "requested {loa} ({}) cannot be met with {}",
                comparison.as_str(),
                self.max_loa
            )));
        }
        Ok(())
    }

    async fn check_assertion_consumer_service(
        &self,
        metadata: &MetadataProcessor,
        request: &mut AuthnRequest,
    ) -> SamlResult<()> {
        let published = metadata
            .assertion_consumer_service(&request.issuer)
            .await?
            .ok_or_else(|| {
                SamlError::invalid_saml(
                    EidasErrorKey::ColleagueReqInvalidSaml,
                    format!("metadata of {} has no assertion consumer service", request.issuer),
                )
            })?;
        if let Some(requested) = request.assertion_consumer_service_url.as_deref() {
            if requested != published.location {
                return Err(SamlError::invalid_saml(
                    EidasErrorKey::ColleagueReqInvalidSaml,
                    format!(
                        "assertion consumer service {requested} does not match metadata {}",
                        published.location
                    ),
                ));
            }
        }
        request.assertion_consumer_service_url = Some(published.location);
        Ok(())
    }
}

async fn check_binding(
    metadata: &MetadataProcessor,
    issuer: &str,
    session: &RequestSession,
) -> SamlResult<()> {
    let method = session
        .http_method()
        .ok_or_else(|| SamlError::UnsupportedBinding("HTTP method unknown".to_string()))?;
    let sp = metadata.sp_descriptor(issuer).await?;
    if sp
        .assertion_consumer_services
        .iter()
        .any(|acs| acs.http_method().eq_ignore_ascii_case(&method))
    {
        return Ok(());
    }
    Err(SamlError::wrap_invalid_saml(
        EidasErrorKey::ColleagueReqInvalidSaml,
        SamlError::UnsupportedBinding(format!("{method} matches no binding published by {issuer}")),
    ))
}

async fn check_sp_type(metadata: &MetadataProcessor, request: &AuthnRequest) -> SamlResult<()> {
    let published = metadata
        .sp_type(&request.issuer)
        .await?
        .filter(|t| !t.trim().is_empty());
    match (request.sp_type, published) {
        (None, None) => Err(SamlError::invalid_saml(
            EidasErrorKey::ColleagueReqMissingSpType,
            "neither request nor metadata declare an SP type",
        )),
        (Some(requested), Some(published)) => Err(SamlError::invalid_saml(
            EidasErrorKey::ColleagueReqInconsistentSpType,
            format!("request declares SP type {requested}, metadata declares {published}"),
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use async_trait::async_trait;
    use eidas_core::{MetadataConfig, SystemClock};

    use super::*;
    use crate::metadata::testing::sp_metadata;
    use crate::metadata::MetadataFetcher;
    use crate::types::{LoaComparison, SpType};

    const SP: &str = "https://sp.example.eu/metadata";
    const NO_SP_TYPE: &str = "https://nosptype.example.eu/metadata";

    #[derive(Debug)]
    struct StaticFetcher(HashMap<String, String>);

    #[async_trait]
    impl MetadataFetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> SamlResult<String> {
            self.0.get(url).cloned().ok_or_else(|| {
                SamlError::metadata(EidasErrorKey::SamlEngineNoMetadata, url.to_string())
            })
        }
    }

    fn processor() -> MetadataProcessor {
        let config = MetadataConfig {
            check_signature: false,
            ..MetadataConfig::default()
        };
        let without_sp_type = sp_metadata()
            .replace("https://sp.example.eu/metadata", NO_SP_TYPE)
            .replace("<eidas:SPType>public</eidas:SPType>", "");
        let fetcher = StaticFetcher(HashMap::from([
            (SP.to_string(), sp_metadata()),
            (NO_SP_TYPE.to_string(), without_sp_type),
        ]));
        MetadataProcessor::new(&config, Arc::new(fetcher), None, Arc::new(SystemClock)).unwrap()
    }

    fn request(issuer: &str) -> AuthnRequest {
        AuthnRequest::with_id("_req", issuer)
            .with_loa(LevelOfAssurance::Substantial, LoaComparison::Minimum)
    }

    async fn validate(
        processor: &MetadataProcessor,
        request: &mut AuthnRequest,
        session: &RequestSession,
    ) -> SamlResult<()> {
        RequestValidator::new(Some(processor), true, LevelOfAssurance::High)
            .validate_request(Some(request), session)
            .await
    }

    #[test]
    fn loa_comparison_table() {
        use LevelOfAssurance::{High, Low, Substantial};
        let all = [Low, Substantial, High];
        for requested in all {
            for max in all {
                for comparison in [LoaComparison::Minimum, LoaComparison::Exact] {
                    let validator = RequestValidator::new(None, false, max);
                    let request = AuthnRequest::with_id("_r", SP).with_loa(requested, comparison);
                    let expected = match comparison {
                        LoaComparison::Minimum => requested <= max,
                        LoaComparison::Exact => requested == max,
                    };
                    assert_eq!(validator.check_loa(&request).is_ok(), expected);
                }
            }
        }
    }

    #[tokio::test]
    async fn missing_inputs_are_invalid() {
        let processor = processor();
        let session = RequestSession::with_http_method("POST");
        let validator = RequestValidator::new(Some(&processor), false, LevelOfAssurance::High);

        let err = validator.validate_request(None, &session).await.unwrap_err();
        assert_eq!(err.key(), EidasErrorKey::ColleagueReqInvalidLoa);

        let mut no_loa = AuthnRequest::with_id("_r", SP);
        let err = validator
            .validate_request(Some(&mut no_loa), &session)
            .await
            .unwrap_err();
        assert_eq!(err.key(), EidasErrorKey::ColleagueReqInvalidLoa);

        let mut no_comparison = request(SP);
        no_comparison.loa_comparison = None;
        assert!(validator
            .validate_request(Some(&mut no_comparison), &session)
            .await
            .is_err());

        let err = RequestValidator::new(None, false, LevelOfAssurance::High)
            .validate_request(Some(&mut request(SP)), &session)
            .await
            .unwrap_err();
        assert!(err.is_invalid_saml());
    }

    #[tokio::test]
    async fn metadata_sp_type_alone_passes_and_acs_is_taken_from_metadata() {
        let processor = processor();
        let mut request = request(SP);
        validate(&processor, &mut request, &RequestSession::with_http_method("GET"))
            .await
            .unwrap();
        assert_eq!(
            request.assertion_consumer_service_url.as_deref(),
            Some("https://sp.example.eu/acs-redirect")
        );
    }

    #[tokio::test]
    async fn sp_type_consistency() {
        let processor = processor();
        let session = RequestSession::with_http_method("POST");

        let mut both = request(SP).with_sp_type(SpType::Private);
        let err = validate(&processor, &mut both, &session).await.unwrap_err();
        assert_eq!(err.key(), EidasErrorKey::ColleagueReqInconsistentSpType);
        assert!(err.is_invalid_saml());

        let mut neither = request(NO_SP_TYPE);
        let err = validate(&processor, &mut neither, &session).await.unwrap_err();
        assert_eq!(err.key(), EidasErrorKey::ColleagueReqMissingSpType);

        let mut request_only = request(NO_SP_TYPE).with_sp_type(SpType::Public);
        validate(&processor, &mut request_only, &session).await.unwrap();
    }

    #[tokio::test]
    async fn mismatching_acs_is_rejected() {
        let processor = processor();
        let mut request = request(SP).with_acs_url("https://evil.example.com/acs");
        let err = validate(&processor, &mut request, &RequestSession::with_http_method("POST"))
            .await
            .unwrap_err();
        assert_eq!(err.key(), EidasErrorKey::ColleagueReqInvalidSaml);
    }

    #[tokio::test]
    async fn binding_must_match_a_published_method() {
        let processor = processor();
        let only_post = sp_metadata().replace(
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
        );
        let fetcher = StaticFetcher(HashMap::from([(SP.to_string(), only_post)]));
        let config = MetadataConfig {
            check_signature: false,
            ..MetadataConfig::default()
        };
        let post_only =
            MetadataProcessor::new(&config, Arc::new(fetcher), None, Arc::new(SystemClock))
                .unwrap();

        let err = validate(&post_only, &mut request(SP), &RequestSession::with_http_method("get"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_saml());
        assert_eq!(err.root_key(), EidasErrorKey::InvalidProtocolBinding);

        let err = validate(&post_only, &mut request(SP), &RequestSession::new())
            .await
            .unwrap_err();
        assert_eq!(err.root_key(), EidasErrorKey::InvalidProtocolBinding);

        validate(&post_only, &mut request(SP), &RequestSession::with_http_method("post"))
            .await
            .unwrap();

        // Binding validation disabled.
        RequestValidator::new(Some(&processor), false, LevelOfAssurance::High)
            .validate_request(Some(&mut request(SP)), &RequestSession::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn metadata_failures_are_wrapped() {
        let processor = processor();
        let mut request = request("https://unknown.example.eu/metadata");
        let err = validate(&processor, &mut request, &RequestSession::with_http_method("POST"))
            .await
            .unwrap_err();
        assert!(err.is_invalid_saml());
        assert_eq!(err.key(), EidasErrorKey::ColleagueReqInvalidSaml);
        assert_eq!(err.root_key(), EidasErrorKey::SamlEngineNoMetadata);
    }
}
