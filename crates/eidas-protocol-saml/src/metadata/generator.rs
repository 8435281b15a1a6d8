//! Metadata for the local node.

use chrono::{DateTime, Duration, Utc};
use eidas_crypto::Certificate;

use crate::error::SamlResult;
use crate::message::format_instant;
use crate::signature::SignatureModule;
use crate::types::{
    eidas, LevelOfAssurance, NameIdFormat, SamlBinding, MDATTR_NS, MD_NS, SAMLP_NS, SAML_NS,
    XMLDSIG_NS,
};
use crate::xml::escape;

/// Builds the node's own `md:EntityDescriptor`.
#[derive(Debug, Clone)]
pub struct MetadataGenerator {
    entity_id: String,
    validity: Duration,
    assertion_consumer_services: Vec<(SamlBinding, String)>,
    single_sign_on_services: Vec<(SamlBinding, String)>,
    sp_type: Option<String>,
    levels_of_assurance: Vec<LevelOfAssurance>,
    signing: Option<Certificate>,
    encryption: Option<Certificate>,
}

impl MetadataGenerator {
    /// Starts metadata for `entity_id`, valid for one day.
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            validity: Duration::days(1),
            assertion_consumer_services: Vec::new(),
            single_sign_on_services: Vec::new(),
            sp_type: None,
            levels_of_assurance: Vec::new(),
            signing: None,
            encryption: None,
        }
    }

    /// Sets how long the metadata stays valid.
    #[must_use]
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    /// Adds an assertion consumer service, making this an SP.
    #[must_use]
    pub fn with_assertion_consumer_service(
        mut self,
        binding: SamlBinding,
        location: impl Into<String>,
    ) -> Self {
        self.assertion_consumer_services
            .push((binding, location.into()));
        self
    }

    /// Adds a single sign-on service, making this an IdP.
    #[must_use]
    pub fn with_single_sign_on_service(
        mut self,
        binding: SamlBinding,
        location: impl Into<String>,
    ) -> Self {
        self.single_sign_on_services.push((binding, location.into()));
        self
    }

    /// Declares the eIDAS SP type.
    #[must_use]
    pub fn with_sp_type(mut self, sp_type: impl Into<String>) -> Self {
        self.sp_type = Some(sp_type.into());
        self
    }

    /// Declares a supported level of assurance.
    #[must_use]
    pub fn with_level_of_assurance(mut self, loa: LevelOfAssurance) -> Self {
        self.levels_of_assurance.push(loa);
        self
    }

    /// Publishes a signing certificate.
    #[must_use]
    pub fn with_signing_certificate(mut self, certificate: Certificate) -> Self {
        self.signing = Some(certificate);
        self
    }

    /// Publishes an encryption certificate.
    #[must_use]
    pub fn with_encryption_certificate(mut self, certificate: Certificate) -> Self {
        self.encryption = Some(certificate);
        self
    }

    /// Renders the unsigned document.
    #[must_use]
    pub fn generate(&self, now: DateTime<Utc>) -> String {
        let mut out = format!(
            r#"<md:EntityDescriptor xmlns:md="{MD_NS}" xmlns:ds="{XMLDSIG_NS}" ID="{}" entityID="{}" validUntil="{}">"#,
            eidas_crypto::random::generate_message_id(),
            escape(&self.entity_id),
            format_instant(now + self.validity),
        );
        out.push_str(&self.extensions());

        let keys = self.key_descriptors();
        let formats: String = NameIdFormat::ALL
            .iter()
            .map(|f| format!("<md:NameIDFormat>{}</md:NameIDFormat>", f.uri()))
            .collect();

        if !self.assertion_consumer_services.is_empty() {
            out.push_str(&format!(
                r#"<md:SPSSODescriptor AuthnRequestsSigned="true" WantAssertionsSigned="true" protocolSupportEnumeration="{SAMLP_NS}">{keys}{formats}"#
            ));
            for (index, (binding, location)) in self.assertion_consumer_services.iter().enumerate() {
                out.push_str(&format!(
                    r#"<md:AssertionConsumerService Binding="{}" Location="{}" index="{index}"{}/>"#,
                    binding.uri(),
                    escape(location),
                    if index == 0 { r#" isDefault="true""# } else { "" },
                ));
            }
            out.push_str("</md:SPSSODescriptor>");
        }
        if !self.single_sign_on_services.is_empty() {
            out.push_str(&format!(
                r#"<md:IDPSSODescriptor WantAuthnRequestsSigned="true" protocolSupportEnumeration="{SAMLP_NS}">{keys}{formats}"#
            ));
            for (binding, location) in &self.single_sign_on_services {
                out.push_str(&format!(
                    r#"<md:SingleSignOnService Binding="{}" Location="{}"/>"#,
                    binding.uri(),
                    escape(location),
                ));
            }
            out.push_str("</md:IDPSSODescriptor>");
        }
        out.push_str("</md:EntityDescriptor>");
        out
    }

    /// Renders the document and signs it with the metadata credential.
    pub fn generate_signed(&self, module: &SignatureModule, now: DateTime<Utc>) -> SamlResult<String> {
        module.sign_metadata(&self.generate(now))
    }

    fn extensions(&self) -> String {
        let mut inner = String::new();
        if let Some(sp_type) = &self.sp_type {
            inner.push_str(&format!(
                r#"<eidas:SPType xmlns:eidas="{}">{}</eidas:SPType>"#,
                eidas::EXTENSIONS_NS,
                escape(sp_type)
            ));
        }
        if !self.levels_of_assurance.is_empty() {
            let values: String = self
                .levels_of_assurance
                .iter()
                .map(|l| format!("<saml2:AttributeValue>{}</saml2:AttributeValue>", l.uri()))
                .collect();
            inner.push_str(&format!(
                r#"<mdattr:EntityAttributes xmlns:mdattr="{MDATTR_NS}" xmlns:saml2="{SAML_NS}"><saml2:Attribute Name="{}" NameFormat="urn:oasis:names:tc:SAML:2.0:attrname-format:uri">{values}</saml2:Attribute></mdattr:EntityAttributes>"#,
                eidas::LOA_ENTITY_ATTRIBUTE
            ));
        }
        if inner.is_empty() {
            return inner;
        }
        format!("<md:Extensions>{inner}</md:Extensions>")
    }

    fn key_descriptors(&self) -> String {
        let descriptor = |usage: &str, certificate: &Certificate| {
            format!(
                r#"<md:KeyDescriptor use="{usage}"><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></md:KeyDescriptor>"#,
                certificate.to_base64()
            )
        };
        let mut out = String::new();
        if let Some(certificate) = &self.signing {
            out.push_str(&descriptor("signing", certificate));
        }
        if let Some(certificate) = &self.encryption {
            out.push_str(&descriptor("encryption", certificate));
        }
        out
    }
}
