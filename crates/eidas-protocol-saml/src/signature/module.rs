//! Signing and validation bound to an instance's signer configuration.

use std::sync::Arc;

use eidas_core::{Clock, CoreProperties, KeyReference, SignerConfig};
use eidas_crypto::{Certificate, KeyStore, TrustStore};

use super::{AlgorithmWhitelist, CertificatePolicy, SignatureAlgorithm, XmlSignature, XmlSigner};
use crate::error::{EidasErrorKey, SamlError, SamlResult};
use crate::extensions::{ProtocolDialect, SamlExtensionFormat};

/// Verifies signatures on metadata documents.
///
/// Implemented by [`SignatureModule`]; the metadata processor only sees
/// this trait.
pub trait MetadataSignatureVerifier: Send + Sync {
    /// Verifies the root signature of a metadata document against the
    /// local trust store.
    fn verify_metadata_signature(&self, xml: &str) -> SamlResult<()>;
}

/// Signs outbound messages and metadata and validates inbound signatures.
#[derive(Debug, Clone)]
pub struct SignatureModule {
    keystore: KeyStore,
    trust_store: TrustStore,
    signer: Option<XmlSigner>,
    metadata_signer: Option<XmlSigner>,
    whitelist: AlgorithmWhitelist,
    policy: CertificatePolicy,
    clock: Arc<dyn Clock>,
}

impl SignatureModule {
    /// Builds the module from configuration.
    ///
    /// Fails with a configuration error when a referenced credential is
    /// missing from the keystore or an algorithm is not supported.
    pub fn new(
        config: &SignerConfig,
        core: &CoreProperties,
        clock: Arc<dyn Clock>,
    ) -> SamlResult<Self> {
        let keystore = KeyStore::load(&config.keystore)
            .map_err(|e| SamlError::configuration(format!("cannot load signing keystore: {e}")))?;
        let trust_store = TrustStore::load(&config.trust_store)
            .map_err(|e| SamlError::configuration(format!("cannot load trust store: {e}")))?;

        let algorithm = SignatureAlgorithm::from_uri(&config.signature_algorithm).ok_or_else(|| {
            SamlError::configuration(format!(
                "unsupported signature algorithm {}",
                config.signature_algorithm
            ))
        })?;

        let build = |reference: &KeyReference| -> SamlResult<XmlSigner> {
            let credential = keystore.find(reference).ok_or_else(|| {
                SamlError::configuration(format!(
                    "no keystore entry for serial {} issued by {}",
                    reference.serial_number, reference.issuer
                ))
            })?;
            let signer = XmlSigner::new(credential.clone(), algorithm)?;
            match config.digest_algorithm.as_deref() {
                Some(digest) => signer
                    .with_digest(digest)
                    .map_err(|e| SamlError::configuration(e.to_string())),
                None => Ok(signer),
            }
        };

        let signer = config.signing.as_ref().map(&build).transpose()?;
        let metadata_signer = match config.metadata_signing.as_ref() {
            Some(reference) => Some(build(reference)?),
            None => signer.clone(),
        };

        let whitelist = AlgorithmWhitelist::signature(&config.signature_algorithm_whitelist);
        if whitelist.is_empty() {
            tracing::warn!("Signature algorithm whitelist is empty; every signature will be rejected");
        }

        Ok(Self {
            keystore,
            trust_store,
            signer,
            metadata_signer,
            whitelist,
            policy: CertificatePolicy {
                check_validity_period: core.check_certificate_validity_period,
                disallow_self_signed: core.disallow_self_signed_certificate,
            },
            clock,
        })
    }

    /// Returns the signature algorithm whitelist.
    #[must_use]
    pub const fn whitelist(&self) -> &AlgorithmWhitelist {
        &self.whitelist
    }

    /// Returns the certificate policy.
    #[must_use]
    pub const fn policy(&self) -> CertificatePolicy {
        self.policy
    }

    /// Returns the signing keystore.
    #[must_use]
    pub const fn keystore(&self) -> &KeyStore {
        &self.keystore
    }

    /// Returns the trust store.
    #[must_use]
    pub const fn trust_store(&self) -> &TrustStore {
        &self.trust_store
    }

    /// Returns the certificate used to sign messages, if signing is configured.
    #[must_use]
    pub fn signing_certificate(&self) -> Option<&Certificate> {
        self.signer.as_ref().map(|s| s.credential().certificate())
    }

    /// Returns the certificate used to sign metadata, if any.
    #[must_use]
    pub fn metadata_signing_certificate(&self) -> Option<&Certificate> {
        self.metadata_signer
            .as_ref()
            .map(|s| s.credential().certificate())
    }

    /// Checks a certificate against the validity and self-signed policy.
    pub fn check_certificate(&self, certificate: &Certificate) -> SamlResult<()> {
        self.policy.check(certificate, self.clock.now())
    }

    /// Signs the root element of a protocol message.
    pub fn sign(&self, xml: &str) -> SamlResult<String> {
        self.ready(self.signer.as_ref())?.sign_root(xml)
    }

    /// Signs the element with the given ID, such as an assertion.
    pub fn sign_element(&self, xml: &str, id: &str) -> SamlResult<String> {
        self.ready(self.signer.as_ref())?.sign(xml, id)
    }

    /// Signs a metadata document with the metadata credential.
    pub fn sign_metadata(&self, xml: &str) -> SamlResult<String> {
        self.ready(self.metadata_signer.as_ref())?.sign_root(xml)
    }

    fn ready<'a>(&self, signer: Option<&'a XmlSigner>) -> SamlResult<&'a XmlSigner> {
        let signer =
            signer.ok_or_else(|| SamlError::configuration("no signing credential configured"))?;
        let uri = signer.algorithm().uri();
        if !self.whitelist.contains(uri) {
            return Err(SamlError::SignatureAlgorithmNotAllowed(uri.to_string()));
        }
        self.check_certificate(signer.credential().certificate())?;
        Ok(signer)
    }

    /// Validates the root signature of `xml` and returns the signing certificate.
    ///
    /// For the eIDAS dialect, when the issuer's metadata publishes signing
    /// certificates, the signer must be one of them. Otherwise the signer
    /// must be trusted by the local trust store.
    pub fn validate_signature(
        &self,
        xml: &str,
        format: &SamlExtensionFormat,
        metadata_certificates: Option<&[Certificate]>,
    ) -> SamlResult<Certificate> {
        let signature = XmlSignature::extract(xml)?.ok_or(SamlError::SignatureMissing)?;
        if !self.whitelist.contains(&signature.signature_algorithm) {
            tracing::warn!(
                algorithm = %signature.signature_algorithm,
                "Rejected signature algorithm not on whitelist"
            );
            return Err(SamlError::SignatureAlgorithmNotAllowed(
                signature.signature_algorithm,
            ));
        }

        let metadata_certificates = metadata_certificates
            .filter(|certs| format.dialect == ProtocolDialect::Eidas && !certs.is_empty());
        let certificate = match metadata_certificates {
            Some(certs) => Self::match_metadata(&signature, certs)?,
            None => self.match_trust_store(&signature)?,
        };

        self.check_certificate(&certificate)?;
        signature.verify_digest(xml)?;
        signature.verify_with(&certificate)?;
        tracing::debug!(
            reference = %signature.reference_id,
            signer = %certificate.subject(),
            dialect = %format,
            "Signature validated"
        );
        Ok(certificate)
    }

    fn match_metadata(signature: &XmlSignature, certs: &[Certificate]) -> SamlResult<Certificate> {
        let found = match &signature.certificate {
            Some(embedded) => certs.iter().find(|c| c.der() == embedded.der()),
            None => certs.iter().find(|c| signature.verify_with(c).is_ok()),
        };
        found.cloned().ok_or_else(|| {
            SamlError::metadata(
                EidasErrorKey::SamlEngineInvalidMetadataSource,
                "signing certificate is not published in the issuer's metadata",
            )
        })
    }

    fn match_trust_store(&self, signature: &XmlSignature) -> SamlResult<Certificate> {
        match &signature.certificate {
            Some(embedded) => {
                self.trust_store
                    .check_trust(embedded)
                    .map_err(|e| SamlError::InvalidCertificate(e.to_string()))?;
                Ok(embedded.clone())
            }
            None => self
                .trust_store
                .certificates()
                .iter()
                .find(|c| signature.verify_with(c).is_ok())
                .cloned()
                .ok_or_else(|| {
                    SamlError::SignatureInvalid(
                        "no trusted certificate verifies the signature".to_string(),
                    )
                }),
        }
    }
}

impl MetadataSignatureVerifier for SignatureModule {
    fn verify_metadata_signature(&self, xml: &str) -> SamlResult<()> {
        self.validate_signature(xml, &SamlExtensionFormat::EIDAS, None)
            .map(|_| ())
    }
}
