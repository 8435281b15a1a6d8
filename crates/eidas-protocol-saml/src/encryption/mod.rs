//! Response encryption.
//!
//! Assertions are encrypted with AES-GCM under a fresh content key, which
//! is wrapped with RSA-OAEP for the destination's certificate and carried
//! inline. Whether a response is encrypted is decided per destination
//! country, unless encryption is mandatory.

mod xmlenc;

pub use xmlenc::EncryptedAssertion;

use std::collections::BTreeMap;
use std::sync::Arc;

use eidas_core::{CipherConfig, Clock, CoreProperties, KeyReference};
use eidas_crypto::{AeadAlgorithm, Certificate, KeyStore};

use crate::error::{SamlError, SamlResult};
use crate::signature::{AlgorithmWhitelist, CertificatePolicy};
use crate::types::encryption_algorithms;
use crate::xml;

const ASSERTION: &str = "saml2:Assertion";
const ENCRYPTED_ASSERTION: &str = "saml2:EncryptedAssertion";

/// Encrypts and decrypts response assertions.
#[derive(Debug, Clone)]
pub struct EncryptionModule {
    keystore: KeyStore,
    whitelist: AlgorithmWhitelist,
    data_algorithm: AeadAlgorithm,
    key_transport: String,
    mandatory: bool,
    encrypt_to: BTreeMap<String, bool>,
    response_to_point: BTreeMap<String, KeyReference>,
    decryption: Option<KeyReference>,
    policy: CertificatePolicy,
    clock: Arc<dyn Clock>,
}

impl EncryptionModule {
    /// Builds the module from configuration.
    pub fn new(
        config: &CipherConfig,
        core: &CoreProperties,
        clock: Arc<dyn Clock>,
    ) -> SamlResult<Self> {
        let keystore = KeyStore::load(&config.keystore).map_err(|e| {
            SamlError::configuration(format!("cannot load encryption keystore: {e}"))
        })?;
        let data_algorithm =
            AeadAlgorithm::from_uri(config.data_encryption_algorithm.trim()).ok_or_else(|| {
                SamlError::configuration(format!(
                    "unsupported data encryption algorithm {}",
                    config.data_encryption_algorithm
                ))
            })?;
        let key_transport = config.key_encryption_algorithm.trim().to_string();
        if key_transport != encryption_algorithms::RSA_OAEP_MGF1P
            && key_transport != encryption_algorithms::RSA_OAEP
        {
            return Err(SamlError::configuration(format!(
                "unsupported key encryption algorithm {key_transport}"
            )));
        }

        Ok(Self {
            keystore,
            whitelist: AlgorithmWhitelist::encryption(&config.encryption_algorithm_whitelist),
            data_algorithm,
            key_transport,
            mandatory: config.response_encryption_mandatory,
            encrypt_to: config
                .encrypt_to
                .iter()
                .map(|(cc, on)| (cc.trim().to_uppercase(), *on))
                .collect(),
            response_to_point: config
                .response_to_point
                .iter()
                .map(|(cc, r)| (cc.trim().to_uppercase(), r.clone()))
                .collect(),
            decryption: config.decryption.clone(),
            policy: CertificatePolicy {
                check_validity_period: core.check_certificate_validity_period,
                disallow_self_signed: core.disallow_self_signed_certificate,
            },
            clock,
        })
    }

    /// Returns the data encryption algorithm whitelist.
    #[must_use]
    pub const fn whitelist(&self) -> &AlgorithmWhitelist {
        &self.whitelist
    }

    /// Returns true when every response must be encrypted.
    #[must_use]
    pub const fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    /// Returns the certificate of the configured decryption credential.
    #[must_use]
    pub fn decryption_certificate(&self) -> Option<&Certificate> {
        self.decryption
            .as_ref()
            .and_then(|r| self.keystore.find(r))
            .map(|e| e.certificate())
    }

    /// Returns true when responses to `country` must be encrypted.
    ///
    /// Mandatory encryption overrides the per-country setting.
    #[must_use]
    pub fn is_encryption_enabled(&self, country: &str) -> bool {
        if self.mandatory {
            return true;
        }
        let country = country.trim();
        if country.is_empty() {
            tracing::debug!("No destination country; response encryption not enabled");
            return false;
        }
        self.encrypt_to
            .get(&country.to_uppercase())
            .copied()
            .unwrap_or(false)
    }

    /// Resolves the certificate to encrypt for.
    ///
    /// The destination's metadata encryption certificate comes first, then
    /// the locally configured certificate for the country.
    pub fn encryption_certificate(
        &self,
        country: &str,
        metadata_certificate: Option<&Certificate>,
    ) -> SamlResult<Certificate> {
        let certificate = match metadata_certificate {
            Some(certificate) => certificate.clone(),
            None => {
                let country = country.trim().to_uppercase();
                let reference = self.response_to_point.get(&country).ok_or_else(|| {
                    SamlError::UnencryptedResponse(format!(
                        "no encryption certificate for country '{country}'"
                    ))
                })?;
                self.keystore
                    .find(reference)
                    .map(|e| e.certificate().clone())
                    .ok_or_else(|| {
                        SamlError::InvalidCertificate(format!(
                            "encryption certificate {} / {} not in keystore",
                            reference.serial_number, reference.issuer
                        ))
                    })?
            }
        };
        self.policy.check(&certificate, self.clock.now())?;
        Ok(certificate)
    }

    /// Encrypts every assertion of a serialized response when encryption is
    /// enabled for `country`. Otherwise the response is returned unchanged.
    pub fn encrypt_response(
        &self,
        xml: &str,
        country: &str,
        metadata_certificate: Option<&Certificate>,
    ) -> SamlResult<String> {
        if !self.is_encryption_enabled(country) {
            return Ok(xml.to_string());
        }
        let recipient = self.encryption_certificate(country, metadata_certificate)?;
        let algorithm = self.data_algorithm.uri();
        if !self.whitelist.contains(algorithm) {
            return Err(SamlError::EncryptionAlgorithmNotAllowed(algorithm.to_string()));
        }

        let mut out = xml.to_string();
        for range in xml::element_ranges(xml, &[ASSERTION]).into_iter().rev() {
            let content_key = self.data_algorithm.generate_key();
            let encrypted = EncryptedAssertion {
                data_algorithm: Some(algorithm.to_string()),
                key_transport: Some(self.key_transport.clone()),
                encrypted_key: eidas_crypto::rsa_oaep_encrypt(recipient.spki_der(), &content_key)?,
                cipher_value: self
                    .data_algorithm
                    .encrypt(&content_key, xml::detach(xml, range.clone())?.as_bytes())?,
                recipient: Some(recipient.clone()),
            };
            out.replace_range(range, &encrypted.to_xml());
        }
        tracing::debug!(
            country = %country,
            recipient = %recipient.subject(),
            algorithm = %algorithm,
            "Encrypted response assertions"
        );
        Ok(out)
    }

    /// Decrypts every encrypted assertion of a serialized response.
    pub fn decrypt_response(&self, xml: &str) -> SamlResult<String> {
        let mut out = xml.to_string();
        for range in xml::element_ranges(xml, &[ENCRYPTED_ASSERTION])
            .into_iter()
            .rev()
        {
            let encrypted = EncryptedAssertion::parse_at(xml, range.clone())?;
            let plaintext = self.decrypt(&encrypted)?;
            out.replace_range(range, &plaintext);
        }
        Ok(out)
    }

    fn decrypt(&self, encrypted: &EncryptedAssertion) -> SamlResult<String> {
        let uri = encrypted.data_algorithm.as_deref().unwrap_or_default();
        if !self.whitelist.contains(uri) {
            return Err(SamlError::EncryptionAlgorithmNotAllowed(if uri.is_empty() {
                "none declared".to_string()
            } else {
                uri.to_string()
            }));
        }
        let algorithm = AeadAlgorithm::from_uri(uri.trim())
            .ok_or_else(|| SamlError::EncryptionAlgorithmNotAllowed(uri.to_string()))?;

        let entry = match &encrypted.recipient {
            Some(recipient) => self.keystore.find_by_certificate(recipient),
            None => self.decryption.as_ref().and_then(|r| self.keystore.find(r)),
        }
        .ok_or_else(|| SamlError::Encryption("no decryption credential".to_string()))?;
        let private_key = entry.private_key().ok_or_else(|| {
            SamlError::configuration(format!(
                "decryption credential '{}' has no private key",
                entry.alias()
            ))
        })?;

        let content_key = eidas_crypto::rsa_oaep_decrypt(private_key, &encrypted.encrypted_key)?;
        let plaintext = algorithm.decrypt(&content_key, &encrypted.cipher_value)?;
        String::from_utf8(plaintext)
            .map_err(|_| SamlError::Encryption("decrypted assertion is not UTF-8".to_string()))
    }
}
