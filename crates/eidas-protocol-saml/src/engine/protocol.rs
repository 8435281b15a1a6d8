//! A configured protocol engine instance.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Duration;
use eidas_core::{Clock, InstanceConfig};
use eidas_crypto::Certificate;

use super::ConfigurationAccessor;
use crate::encryption::EncryptionModule;
use crate::error::{EidasErrorKey, SamlError, SamlResult};
use crate::extensions::{processor_for, ExtensionProcessor, ProtocolDialect, SamlExtensionFormat};
use crate::message::{self, ResponseParams};
use crate::metadata::{MetadataFetcher, MetadataGenerator, MetadataProcessor};
use crate::session::RequestSession;
use crate::signature::{MetadataSignatureVerifier, SignatureModule, XmlSignature};
use crate::types::{AuthnRequest, AuthnResponse, LevelOfAssurance, Status, SAML_NS};
use crate::validation::{AntiReplayGuard, RequestValidator};
use crate::xml;

/// Clock skew tolerated on assertion conditions.
pub const CLOCK_SKEW_SECONDS: i64 = 60;

const ASSERTION: &str = "saml2:Assertion";

/// Components built from one configuration snapshot.
#[derive(Debug)]
pub struct EngineComponents {
    generation: u64,
    instance: InstanceConfig,
    max_loa: LevelOfAssurance,
    processor: Arc<dyn ExtensionProcessor>,
    signature: Arc<SignatureModule>,
    encryption: EncryptionModule,
    metadata: Option<MetadataProcessor>,
}

impl EngineComponents {
    fn build(
        generation: u64,
        instance: InstanceConfig,
        clock: &Arc<dyn Clock>,
        fetcher: Option<&Arc<dyn MetadataFetcher>>,
    ) -> SamlResult<Self> {
        let max_loa = LevelOfAssurance::from_uri(&instance.core.max_loa).ok_or_else(|| {
            SamlError::configuration(format!("invalid maximum LoA {}", instance.core.max_loa))
        })?;
        let processor = processor_for(&instance.core);
        let signature = Arc::new(SignatureModule::new(
            &instance.signer,
            &instance.core,
            Arc::clone(clock),
        )?);
        let encryption = EncryptionModule::new(&instance.cipher, &instance.core, Arc::clone(clock))?;

        let metadata = if instance.metadata.enabled {
            let verifier: Arc<dyn MetadataSignatureVerifier> = signature.clone();
            Some(match fetcher {
                Some(fetcher) => MetadataProcessor::new(
                    &instance.metadata,
                    Arc::clone(fetcher),
                    Some(verifier),
                    Arc::clone(clock),
                )?,
                None => {
                    MetadataProcessor::from_config(&instance.metadata, Some(verifier), Arc::clone(clock))?
                }
            })
        } else {
            None
        };

        Ok(Self {
            generation,
            instance,
            max_loa,
            processor,
            signature,
            encryption,
            metadata,
        })
    }

    /// Configuration generation these components were built from.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Effective instance configuration, after overrides and production mode.
    #[must_use]
    pub const fn instance(&self) -> &InstanceConfig {
        &self.instance
    }

    /// Highest level of assurance the instance accepts.
    #[must_use]
    pub const fn max_loa(&self) -> LevelOfAssurance {
        self.max_loa
    }

    /// Extension processor of the configured dialect.
    #[must_use]
    pub fn processor(&self) -> &dyn ExtensionProcessor {
        self.processor.as_ref()
    }

    /// Extension format of the configured dialect.
    #[must_use]
    pub fn format(&self) -> &'static SamlExtensionFormat {
        self.processor.format()
    }

    /// Signature module.
    #[must_use]
    pub fn signature(&self) -> &SignatureModule {
        &self.signature
    }

    /// Encryption module.
    #[must_use]
    pub const fn encryption(&self) -> &EncryptionModule {
        &self.encryption
    }

    /// Metadata processor, when metadata is enabled.
    #[must_use]
    pub const fn metadata(&self) -> Option<&MetadataProcessor> {
        self.metadata.as_ref()
    }

    /// Signing certificates the issuer publishes in its metadata.
    ///
    /// The metadata signature is checked first, so an issuer cannot vouch
    /// for its own keys with unsigned metadata.
    async fn signing_certificates(&self, issuer: &str) -> SamlResult<Option<Vec<Certificate>>> {
        match &self.metadata {
            Some(metadata) if self.format().dialect == ProtocolDialect::Eidas => {
                metadata.check_metadata_signature(issuer).await?;
                Ok(Some(metadata.signing_certificates(issuer).await?))
            }
            _ => Ok(None),
        }
    }
}

/// Everything needed to build a [`ProtocolEngine`].
pub(crate) struct EngineParts {
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) overrides: BTreeMap<String, String>,
    pub(crate) configuration: Arc<dyn ConfigurationAccessor>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) fetcher: Option<Arc<dyn MetadataFetcher>>,
    pub(crate) anti_replay: AntiReplayGuard,
}

/// Generates, signs, encrypts, validates and parses protocol messages for
/// one named configuration instance.
///
/// The engine reads its configuration through a [`ConfigurationAccessor`].
/// When the accessor's generation changes, the signature, encryption and
/// metadata components are rebuilt before the next operation.
pub struct ProtocolEngine {
    id: u64,
    name: String,
    overrides: BTreeMap<String, String>,
    configuration: Arc<dyn ConfigurationAccessor>,
    clock: Arc<dyn Clock>,
    fetcher: Option<Arc<dyn MetadataFetcher>>,
    anti_replay: AntiReplayGuard,
    components: ArcSwap<EngineComponents>,
}

impl fmt::Debug for ProtocolEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolEngine")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("overrides", &self.overrides)
            .field("generation", &self.components.load().generation)
            .finish_non_exhaustive()
    }
}

impl ProtocolEngine {
    /// Builds an engine for `name` with no overrides.
    ///
    /// The anti-replay guard is built from the node's `anti_replay` table.
    pub fn new(
        name: impl Into<String>,
        configuration: Arc<dyn ConfigurationAccessor>,
        clock: Arc<dyn Clock>,
    ) -> SamlResult<Self> {
        let anti_replay = AntiReplayGuard::from_config(&configuration.current().anti_replay)?;
        Self::build(EngineParts {
            id: 0,
            name: name.into(),
            overrides: BTreeMap::new(),
            configuration,
            clock,
            fetcher: None,
            anti_replay,
        })
    }

    pub(crate) fn build(parts: EngineParts) -> SamlResult<Self> {
        let generation = parts.configuration.generation();
        let components = build_components(
            &parts.name,
            &parts.overrides,
            parts.configuration.as_ref(),
            &parts.clock,
            parts.fetcher.as_ref(),
            generation,
        )?;
        tracing::info!(
            engine = %parts.name,
            id = parts.id,
            format = %components.format(),
            metadata = components.metadata.is_some(),
            "Protocol engine created"
        );
        Ok(Self {
            id: parts.id,
            name: parts.name,
            overrides: parts.overrides,
            configuration: parts.configuration,
            clock: parts.clock,
            fetcher: parts.fetcher,
            anti_replay: parts.anti_replay,
            components: ArcSwap::from_pointee(components),
        })
    }

    /// Registry-assigned identifier.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Configuration instance name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Override properties applied on top of the instance configuration.
    #[must_use]
    pub const fn overrides(&self) -> &BTreeMap<String, String> {
        &self.overrides
    }

    /// Returns the components for the current configuration, rebuilding
    /// them first if the configuration was reloaded.
    pub fn components(&self) -> SamlResult<Arc<EngineComponents>> {
        let current = self.components.load_full();
        let generation = self.configuration.generation();
        if current.generation == generation {
            return Ok(current);
        }
        let rebuilt = Arc::new(build_components(
            &self.name,
            &self.overrides,
            self.configuration.as_ref(),
            &self.clock,
            self.fetcher.as_ref(),
            generation,
        )?);
        self.components.store(Arc::clone(&rebuilt));
        tracing::info!(engine = %self.name, generation, "Engine components rebuilt");
        Ok(rebuilt)
    }

    /// Builds and signs an `AuthnRequest`.
    pub fn generate_request(&self, request: &AuthnRequest) -> SamlResult<String> {
        let components = self.components()?;
        let xml = message::build_authn_request(components.processor(), request)?;
        let signed = components.signature().sign(&xml)?;
        tracing::debug!(engine = %self.name, id = %request.id, "Generated AuthnRequest");
        Ok(signed)
    }

    /// Validates the signature of an inbound `AuthnRequest` and parses it.
    ///
    /// For the eIDAS dialect with metadata enabled, the signer must be
    /// published in the issuer's metadata.
    pub async fn process_request(&self, xml: &str) -> SamlResult<AuthnRequest> {
        let components = self.components()?;
        read_request(&components, xml)
            .await
            .map_err(|e| reject(EidasErrorKey::ColleagueReqInvalidSaml, e))
    }

    /// Checks a parsed request against the issuer's metadata and the session.
    ///
    /// See [`RequestValidator::validate_request`].
    pub async fn validate_request(
        &self,
        request: Option<&mut AuthnRequest>,
        session: &RequestSession,
    ) -> SamlResult<()> {
        let components = self.components()?;
        RequestValidator::new(
            components.metadata(),
            components.instance.core.validate_binding,
            components.max_loa,
        )
        .validate_request(request, session)
        .await
    }

    /// Returns true when `message_id` was not processed before for `country`.
    pub async fn check_not_present_in_cache(
        &self,
        message_id: Option<&str>,
        country: &str,
    ) -> SamlResult<bool> {
        self.anti_replay
            .check_not_present_in_cache(message_id, country)
            .await
    }

    /// Builds a response to `request`, signing the assertion, encrypting it
    /// when enabled for `country`, then signing the response.
    pub async fn generate_response(
        &self,
        response: &AuthnResponse,
        request: &AuthnRequest,
        country: &str,
    ) -> SamlResult<String> {
        let components = self.components()?;
        let xml = message::build_response(
            components.processor(),
            response,
            &ResponseParams::new(&request.issuer),
        )?;
        if !response.is_success() {
            return components.signature().sign(&xml);
        }

        let assertion_id = assertion_id(&xml)?;
        let signed = components.signature().sign_element(&xml, &assertion_id)?;

        let metadata_certificate = match components.metadata() {
            Some(metadata) if components.encryption().is_encryption_enabled(country) => {
                metadata.encryption_certificate(&request.issuer).await?
            }
            _ => None,
        };
        let encrypted = components.encryption().encrypt_response(
            &signed,
            country,
            metadata_certificate.as_ref(),
        )?;
        let out = components.signature().sign(&encrypted)?;
        tracing::debug!(
            engine = %self.name,
            id = %response.id,
            in_response_to = %response.in_response_to,
            country = %country,
            "Generated Response"
        );
        Ok(out)
    }

    /// Builds a signed failure response carrying the status of `error`.
    pub fn generate_error_response(
        &self,
        in_response_to: &str,
        destination: Option<&str>,
        error: &SamlError,
    ) -> SamlResult<String> {
        let components = self.components()?;
        let issuer = components.instance.core.issuer.as_deref().ok_or_else(|| {
            SamlError::configuration(format!("instance {} has no issuer", self.name))
        })?;

        let mut response = AuthnResponse::success(in_response_to, issuer, "");
        response.subject = None;
        response.destination = destination.map(str::to_string);
        response.status = Status::failure(
            error.status_code(),
            error.sub_status_code(),
            error.key().code(),
        );
        tracing::debug!(
            engine = %self.name,
            in_response_to = %in_response_to,
            error = %error,
            "Generating error response"
        );
        components
            .signature()
            .sign(&message::build_error_response(&response))
    }

    /// Validates, decrypts and parses an inbound response.
    pub async fn process_response(&self, xml: &str) -> SamlResult<AuthnResponse> {
        let components = self.components()?;
        read_response(&components, xml, &*self.clock)
            .await
            .map_err(|e| reject(EidasErrorKey::ColleagueRespInvalidSaml, e))
    }

    /// Starts the node's metadata from the current configuration.
    ///
    /// The caller adds the service endpoints.
    pub fn metadata_generator(&self) -> SamlResult<MetadataGenerator> {
        let components = self.components()?;
        let core = &components.instance.core;
        let entity_id = core.issuer.as_deref().ok_or_else(|| {
            SamlError::configuration(format!("instance {} has no issuer", self.name))
        })?;

        let mut generator =
            MetadataGenerator::new(entity_id).with_level_of_assurance(components.max_loa);
        if let Some(sp_type) = &core.sp_type {
            generator = generator.with_sp_type(sp_type.clone());
        }
        if let Some(certificate) = components.signature().signing_certificate() {
            generator = generator.with_signing_certificate(certificate.clone());
        }
        if let Some(certificate) = components.encryption().decryption_certificate() {
            generator = generator.with_encryption_certificate(certificate.clone());
        }
        Ok(generator)
    }

    /// Renders and signs metadata with the metadata credential.
    pub fn generate_metadata(&self, generator: &MetadataGenerator) -> SamlResult<String> {
        let components = self.components()?;
        generator.generate_signed(components.signature(), self.clock.now())
    }
}

fn build_components(
    name: &str,
    overrides: &BTreeMap<String, String>,
    configuration: &dyn ConfigurationAccessor,
    clock: &Arc<dyn Clock>,
    fetcher: Option<&Arc<dyn MetadataFetcher>>,
    generation: u64,
) -> SamlResult<EngineComponents> {
    let node = configuration.current();
    let mut instance = node.instance(name)?.clone();
    instance.apply_overrides(overrides)?;
    // Overrides cannot relax production mode.
    if node.production {
        instance.apply_production_overrides();
    }
    EngineComponents::build(generation, instance, clock, fetcher).map_err(|e| {
        if e.is_configuration() {
            e
        } else {
            SamlError::configuration(format!("cannot build engine {name}: {e}"))
        }
    })
}

fn reject(key: EidasErrorKey, error: SamlError) -> SamlError {
    if error.is_configuration() {
        error
    } else {
        SamlError::wrap_invalid_saml(key, error)
    }
}

fn issuer_of(root: &xml::XmlElement) -> SamlResult<String> {
    root.child_text(SAML_NS, "Issuer")
        .map(|issuer| issuer.trim().to_string())
        .filter(|issuer| !issuer.is_empty())
        .ok_or_else(|| SamlError::Message(format!("{} has no Issuer", root.qname)))
}

fn assertion_id(xml: &str) -> SamlResult<String> {
    xml::parse(xml)?
        .child(SAML_NS, "Assertion")
        .and_then(|assertion| assertion.attr("ID"))
        .map(str::to_string)
        .ok_or_else(|| SamlError::Message("response has no assertion ID".to_string()))
}

async fn read_request(components: &EngineComponents, xml: &str) -> SamlResult<AuthnRequest> {
    let issuer = issuer_of(&xml::parse(xml)?)?;
    let certificates = components.signing_certificates(&issuer).await?;
    components
        .signature()
        .validate_signature(xml, components.format(), certificates.as_deref())?;

    if !components.processor().is_valid_request(xml) {
        return Err(SamlError::Message(format!(
            "not a {} request",
            components.format()
        )));
    }
    message::parse_authn_request(components.processor(), xml)
}

async fn read_response(
    components: &EngineComponents,
    xml: &str,
    clock: &dyn Clock,
) -> SamlResult<AuthnResponse> {
    let root = xml::parse(xml)?;
    let issuer = issuer_of(&root)?;
    let certificates = components.signing_certificates(&issuer).await?;
    components
        .signature()
        .validate_signature(xml, components.format(), certificates.as_deref())?;

    let encrypted = root.child(SAML_NS, "EncryptedAssertion").is_some();
    let plaintext = if encrypted {
        components.encryption().decrypt_response(xml)?
    } else {
        xml.to_string()
    };
    validate_assertion_signatures(components, &plaintext, certificates.as_deref())?;
    let mut response = message::parse_response(&plaintext)?;
    response.encrypted = encrypted;

    if response.is_success() && !encrypted && components.encryption().is_mandatory() {
        return Err(SamlError::UnencryptedResponse(format!(
            "response {} carries a plaintext assertion",
            response.id
        )));
    }

    if let Some(conditions) = message::read_conditions(&plaintext)? {
        if !conditions.is_valid_at(clock.now(), Duration::seconds(CLOCK_SKEW_SECONDS)) {
            return Err(SamlError::Message(
                "assertion is outside its validity window".to_string(),
            ));
        }
        if let Some(audience) = &components.instance.core.issuer {
            if !conditions.audiences.is_empty() && !conditions.audiences.contains(audience) {
                return Err(SamlError::Message(format!(
                    "assertion is not addressed to {audience}"
                )));
            }
        }
    }
    Ok(response)
}

/// Validates every signed assertion of a (decrypted) response.
fn validate_assertion_signatures(
    components: &EngineComponents,
    xml: &str,
    certificates: Option<&[Certificate]>,
) -> SamlResult<()> {
    for range in xml::element_ranges(xml, &[ASSERTION]) {
        let assertion = xml::detach(xml, range)?;
        if XmlSignature::extract(&assertion)?.is_none() {
            continue;
        }
        components
            .signature()
            .validate_signature(&assertion, components.format(), certificates)
            .map_err(|e| SamlError::wrap_invalid_saml(EidasErrorKey::InvalidAssertionSignature, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use chrono::Utc;
    use eidas_core::{FixedClock, KeyReference, KeyStoreEntry, NodeConfig, SystemClock};

    use super::*;
    use crate::engine::ReloadableConfiguration;
    use crate::types::{
        signature_algorithms, status_codes, sub_status_codes, LoaComparison, RequestedAttribute,
        ResponseAttribute, SamlBinding, SpType,
    };

    const ISSUER: &str = "https://node.example.es/metadata";
    const CA_DN: &str = "C=EU, O=eIDAS Test, CN=eIDAS Test CA";
    const PERSON_ID: &str = "http://eidas.europa.eu/attributes/naturalperson/PersonIdentifier";

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../testdata")
            .join(name)
    }

    fn entry(alias: &str) -> KeyStoreEntry {
        KeyStoreEntry {
            alias: alias.to_string(),
            certificate: testdata(&format!("{alias}.pem")),
            private_key: Some(testdata(&format!("{alias}.key"))),
        }
    }

    fn reference(serial: &str) -> KeyReference {
        KeyReference {
            serial_number: serial.to_string(),
            issuer: CA_DN.to_string(),
        }
    }

    fn instance() -> InstanceConfig {
        let mut instance = InstanceConfig::default();
        instance.core.issuer = Some(ISSUER.to_string());
        instance.signer.signing = Some(reference("1001"));
        instance.signer.keystore = vec![entry("node")];
        instance.signer.trust_store = vec![testdata("ca.pem")];
        instance.cipher.keystore = vec![entry("partner")];
        instance.cipher.decryption = Some(reference("1002"));
        instance.cipher.encrypt_to.insert("ES".to_string(), true);
        instance
            .cipher
            .response_to_point
            .insert("ES".to_string(), reference("1002"));
        instance.metadata.enabled = false;
        instance
    }

    fn engine_for(instance: InstanceConfig) -> ProtocolEngine {
        let config = NodeConfig {
            instances: BTreeMap::from([("CPEPS".to_string(), instance)]),
            ..NodeConfig::default()
        };
        ProtocolEngine::new(
            "CPEPS",
            Arc::new(ReloadableConfiguration::new(config)),
            Arc::new(SystemClock),
        )
        .unwrap()
    }

    fn request() -> AuthnRequest {
        AuthnRequest::with_id("_req-42", ISSUER)
            .with_destination("https://node.example.be/ColleagueRequest")
            .with_acs_url("https://node.example.es/acs")
            .with_citizen_country("BE")
            .with_sp_type(SpType::Public)
            .with_loa(LevelOfAssurance::Substantial, LoaComparison::Minimum)
            .with_attribute(RequestedAttribute::new("PersonIdentifier", true))
    }

    fn response() -> AuthnResponse {
        AuthnResponse::success("_req-42", ISSUER, "BE/ES/0123456")
            .with_destination("https://node.example.es/acs")
            .with_loa(LevelOfAssurance::Substantial)
            .with_attribute(ResponseAttribute::new(PERSON_ID, "BE/ES/0123456"))
    }

    #[tokio::test]
    async fn request_round_trip() {
        let engine = engine_for(instance());
        let xml = engine.generate_request(&request()).unwrap();
        assert!(xml.contains("ds:Signature"));

        let parsed = engine.process_request(&xml).await.unwrap();
        assert_eq!(parsed.id, "_req-42");
        assert_eq!(parsed.issuer, ISSUER);
        assert_eq!(parsed.sp_type, Some(SpType::Public));
        assert_eq!(parsed.level_of_assurance, Some(LevelOfAssurance::Substantial));
        assert_eq!(parsed.requested_attributes[0].name, PERSON_ID);
    }

    #[tokio::test]
    async fn tampered_request_is_invalid_saml() {
        let engine = engine_for(instance());
        let xml = engine
            .generate_request(&request())
            .unwrap()
            .replace("https://node.example.es/acs", "https://attacker.example/acs");

        let err = engine.process_request(&xml).await.unwrap_err();
        assert!(err.is_invalid_saml());
        assert_eq!(err.key(), EidasErrorKey::ColleagueReqInvalidSaml);
        assert_eq!(err.root_key(), EidasErrorKey::InvalidCertificateSign);
    }

    #[tokio::test]
    async fn unsigned_request_is_rejected() {
        let engine = engine_for(instance());
        let components = engine.components().unwrap();
        let xml = message::build_authn_request(components.processor(), &request()).unwrap();

        let err = engine.process_request(&xml).await.unwrap_err();
        assert_eq!(err.key(), EidasErrorKey::ColleagueReqInvalidSaml);
        assert!(matches!(
            err,
            SamlError::InvalidSaml { cause: Some(ref cause), .. } if matches!(**cause, SamlError::SignatureMissing)
        ));
    }

    #[tokio::test]
    async fn encrypted_response_round_trip() {
        let engine = engine_for(instance());
        let xml = engine
            .generate_response(&response(), &request(), "ES")
            .await
            .unwrap();
        assert!(xml.contains("EncryptedAssertion"));
        assert!(!xml.contains("BE/ES/0123456"));

        let parsed = engine.process_response(&xml).await.unwrap();
        assert!(parsed.encrypted);
        assert!(parsed.is_success());
        assert_eq!(parsed.in_response_to, "_req-42");
        assert_eq!(parsed.subject.as_deref(), Some("BE/ES/0123456"));
        assert_eq!(parsed.level_of_assurance, Some(LevelOfAssurance::Substantial));
        assert_eq!(
            parsed.attribute(PERSON_ID).and_then(|a| a.first_value()),
            Some("BE/ES/0123456")
        );
    }

    #[tokio::test]
    async fn plaintext_response_when_country_not_enabled() {
        let engine = engine_for(instance());
        let xml = engine
            .generate_response(&response(), &request(), "BE")
            .await
            .unwrap();
        assert!(!xml.contains("EncryptedAssertion"));
        assert!(!engine.process_response(&xml).await.unwrap().encrypted);

        let mut strict = instance();
        strict.cipher.response_encryption_mandatory = true;
        let err = engine_for(strict).process_response(&xml).await.unwrap_err();
        assert_eq!(err.key(), EidasErrorKey::ColleagueRespInvalidSaml);
        assert_eq!(err.root_key(), EidasErrorKey::SamlEngineUnencryptedResponse);
    }

    #[tokio::test]
    async fn tampered_assertion_under_resigned_response_is_rejected() {
        let engine = engine_for(instance());
        let components = engine.components().unwrap();
        let xml = engine
            .generate_response(&response(), &request(), "BE")
            .await
            .unwrap();

        let outer = XmlSignature::extract(&xml).unwrap().unwrap();
        let tampered = outer.strip(&xml).replace("BE/ES/0123456", "BE/ES/6543210");
        let resigned = components.signature().sign(&tampered).unwrap();
        components
            .signature()
            .validate_signature(&resigned, components.format(), None)
            .unwrap();

        let err = engine.process_response(&resigned).await.unwrap_err();
        assert!(err.is_invalid_saml());
        assert_eq!(err.key(), EidasErrorKey::InvalidAssertionSignature);
        assert_eq!(err.root_key(), EidasErrorKey::InvalidCertificateSign);
    }

    #[tokio::test]
    async fn response_for_another_audience_is_rejected() {
        let xml = engine_for(instance())
            .generate_response(&response(), &request(), "BE")
            .await
            .unwrap();

        let mut other = instance();
        other.core.issuer = Some("https://node.example.pt/metadata".to_string());
        let err = engine_for(other).process_response(&xml).await.unwrap_err();
        assert!(err.is_invalid_saml());
        assert_eq!(err.root_key(), EidasErrorKey::MessageValidationError);
    }

    #[tokio::test]
    async fn expired_assertion_is_rejected() {
        let xml = engine_for(instance())
            .generate_response(&response(), &request(), "BE")
            .await
            .unwrap();

        let config = NodeConfig {
            instances: BTreeMap::from([("CPEPS".to_string(), instance())]),
            ..NodeConfig::default()
        };
        let later = ProtocolEngine::new(
            "CPEPS",
            Arc::new(ReloadableConfiguration::new(config)),
            Arc::new(FixedClock(Utc::now() + Duration::minutes(10))),
        )
        .unwrap();
        let err = later.process_response(&xml).await.unwrap_err();
        assert!(err.to_string().contains("validity window"));
    }

    #[tokio::test]
    async fn error_response_carries_status() {
        let engine = engine_for(instance());
        let cause = SamlError::invalid_saml(
            EidasErrorKey::ColleagueReqInconsistentSpType,
            "SPType differs from metadata",
        );
        let xml = engine
            .generate_error_response("_req-42", Some("https://node.example.es/acs"), &cause)
            .unwrap();

        let parsed = engine.process_response(&xml).await.unwrap();
        assert!(!parsed.is_success());
        assert_eq!(parsed.status.status_code, status_codes::REQUESTER);
        assert_eq!(
            parsed.status.sub_status_code.as_deref(),
            Some(sub_status_codes::INVALID_ATTR_NAME_OR_VALUE)
        );
        assert_eq!(
            parsed.status.status_message.as_deref(),
            Some(EidasErrorKey::ColleagueReqInconsistentSpType.code())
        );
        assert_eq!(parsed.destination.as_deref(), Some("https://node.example.es/acs"));
    }

    #[test]
    fn signed_metadata() {
        let mut instance = instance();
        instance.core.sp_type = Some("public".to_string());
        let engine = engine_for(instance);
        let generator = engine
            .metadata_generator()
            .unwrap()
            .with_assertion_consumer_service(SamlBinding::HttpPost, "https://node.example.es/acs");
        let xml = engine.generate_metadata(&generator).unwrap();

        assert!(xml.contains(&format!(r#"entityID="{ISSUER}""#)));
        assert!(xml.contains("<eidas:SPType"));
        assert!(xml.contains("ds:Signature"));
        let components = engine.components().unwrap();
        components
            .signature()
            .validate_signature(&xml, components.format(), None)
            .unwrap();
    }

    #[test]
    fn construction_failures_are_configuration_errors() {
        let config = Arc::new(ReloadableConfiguration::new(NodeConfig::default()));
        let err = ProtocolEngine::new("CPEPS", config, Arc::new(SystemClock)).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Configuration instance CPEPS does not exist");

        let mut broken = instance();
        broken.core.max_loa = "http://eidas.europa.eu/LoA/extreme".to_string();
        let config = NodeConfig {
            instances: BTreeMap::from([("CPEPS".to_string(), broken)]),
            ..NodeConfig::default()
        };
        let err = ProtocolEngine::new(
            "CPEPS",
            Arc::new(ReloadableConfiguration::new(config)),
            Arc::new(SystemClock),
        )
        .unwrap_err();
        assert!(err.is_configuration());

        let mut no_key = instance();
        no_key.signer.signing = Some(reference("9999"));
        let config = NodeConfig {
            instances: BTreeMap::from([("CPEPS".to_string(), no_key)]),
            ..NodeConfig::default()
        };
        assert!(ProtocolEngine::new(
            "CPEPS",
            Arc::new(ReloadableConfiguration::new(config)),
            Arc::new(SystemClock),
        )
        .unwrap_err()
        .is_configuration());
    }

    #[test]
    fn reload_rebuilds_components() {
        let node = |whitelist: &str| {
            let mut instance = instance();
            instance.signer.signature_algorithm_whitelist = whitelist.to_string();
            NodeConfig {
                instances: BTreeMap::from([("CPEPS".to_string(), instance)]),
                ..NodeConfig::default()
            }
        };
        let configuration = Arc::new(ReloadableConfiguration::new(node(
            signature_algorithms::RSA_SHA512,
        )));
        let engine =
            ProtocolEngine::new("CPEPS", configuration.clone(), Arc::new(SystemClock)).unwrap();
        assert!(engine.generate_request(&request()).is_ok());

        configuration.reload(node(signature_algorithms::RSA_SHA256));
        let components = engine.components().unwrap();
        assert_eq!(components.generation(), 1);
        assert!(!components
            .signature()
            .whitelist()
            .contains(signature_algorithms::RSA_SHA512));
        assert!(engine.generate_request(&request()).is_err());
    }
}
