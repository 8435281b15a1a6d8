//! SAML engine error types.
//!
//! Every error carries an [`EidasErrorKey`], the code reported to the
//! partner node and used by the web layer to pick the error page. Errors
//! fall into three families: configuration errors (fatal, never retried),
//! invalid SAML (returned to the caller as an authentication error with the
//! original cause chained) and everything else raised while processing a
//! message, which callers normally wrap into invalid SAML.

use std::fmt;

use eidas_cache::CacheError;
use eidas_crypto::CryptoError;
use thiserror::Error;

use crate::types::{status_codes, sub_status_codes};

/// Result type for SAML engine operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// Error codes exchanged with partner nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EidasErrorKey {
    /// Request rejected as invalid SAML.
    ColleagueReqInvalidSaml,
    /// Response rejected as invalid SAML.
    ColleagueRespInvalidSaml,
    /// STORK QAA level not acceptable.
    ColleagueReqInvalidQaa,
    /// Requested level of assurance not acceptable.
    ColleagueReqInvalidLoa,
    /// Request and metadata both declare an SP type.
    ColleagueReqInconsistentSpType,
    /// Neither request nor metadata declare an SP type.
    ColleagueReqMissingSpType,
    /// Unknown level of assurance URI.
    InvalidLoaValue,
    /// HTTP method does not match any published binding.
    InvalidProtocolBinding,
    /// Signature algorithm not on the whitelist.
    InvalidSignatureAlgorithm,
    /// Encryption algorithm missing or not on the whitelist.
    InvalidEncryptionAlgorithm,
    /// Signature or signing certificate rejected.
    InvalidCertificateSign,
    /// Signature on an assertion does not validate.
    InvalidAssertionSignature,
    /// Engine could not be configured.
    SamlEngineConfigurationError,
    /// Message could not be parsed or built.
    MessageValidationError,
    /// Certificate rejected by the certificate policy.
    SamlEngineInvalidCertificate,
    /// Metadata is expired or otherwise invalid.
    SamlEngineInvalidMetadata,
    /// Metadata source is not acceptable.
    SamlEngineInvalidMetadataSource,
    /// Metadata could not be retrieved.
    SamlEngineNoMetadata,
    /// Encryption required but no credential available.
    SamlEngineUnencryptedResponse,
    /// A repository entry with the same issuer already exists.
    ConsoleMetadataIssuerAlreadyExists,
    /// A repository file with the same name already exists.
    ConsoleMetadataFileAlreadyExists,
    /// Repository file is empty or not an entity descriptor.
    ConsoleMetadataFileParsing,
}

impl EidasErrorKey {
    /// Returns the wire error code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::ColleagueReqInvalidSaml => "colleagueRequest.invalidSAML",
            Self::ColleagueRespInvalidSaml => "colleagueResponse.invalidSAML",
            Self::ColleagueReqInvalidQaa => "colleagueRequest.invalidQaa",
            Self::ColleagueReqInvalidLoa => "colleagueRequest.invalidLoA",
            Self::ColleagueReqInconsistentSpType => "inconsistent.sptype",
            Self::ColleagueReqMissingSpType => "missing.sptype",
            Self::InvalidLoaValue => "invalidLoA",
            Self::InvalidProtocolBinding => "invalidProtocolBinding.error",
            Self::InvalidSignatureAlgorithm => "invalidReceivedSignAlgo.error",
            Self::InvalidEncryptionAlgorithm => "invalidEncryptionAlgorithm.error",
            Self::InvalidCertificateSign => "invalidCertificateSign.error",
            Self::InvalidAssertionSignature => "invalidSamlAssertionSignature.error",
            Self::SamlEngineConfigurationError => "samlEngine.configuration.error",
            Self::MessageValidationError => "message.validation.error",
            Self::SamlEngineInvalidCertificate => "samlengine.invalid.certificate",
            Self::SamlEngineInvalidMetadata => "samlengine.invalid.metadata.error",
            Self::SamlEngineInvalidMetadataSource => "samlengine.invalid.metadata.source.error",
            Self::SamlEngineNoMetadata => "samlengine.metadata.retrieval.error",
            Self::SamlEngineUnencryptedResponse => "samlengine.unencrypted.response",
            Self::ConsoleMetadataIssuerAlreadyExists => "err.metadata.already.exists",
            Self::ConsoleMetadataFileAlreadyExists => "err.metadata.file.already.exists",
            Self::ConsoleMetadataFileParsing => "err.metadata.file.invalid.format",
        }
    }

    /// Returns true for codes that describe local misconfiguration.
    #[must_use]
    pub const fn is_configuration(self) -> bool {
        matches!(
            self,
            Self::SamlEngineConfigurationError
                | Self::ConsoleMetadataIssuerAlreadyExists
                | Self::ConsoleMetadataFileAlreadyExists
                | Self::ConsoleMetadataFileParsing
        )
    }
}

impl fmt::Display for EidasErrorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// SAML engine errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Engine misconfiguration. Always fatal.
    #[error("configuration error ({key}): {message}")]
    Configuration {
        /// Error code.
        key: EidasErrorKey,
        /// Description.
        message: String,
    },

    /// Message rejected as invalid SAML.
    #[error("invalid SAML ({key}): {message}")]
    InvalidSaml {
        /// Error code.
        key: EidasErrorKey,
        /// Description.
        message: String,
        /// Underlying failure, kept for diagnostics.
        #[source]
        cause: Option<Box<SamlError>>,
    },

    /// Malformed XML.
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    /// Message content does not match what the engine expects.
    #[error("message validation error: {0}")]
    Message(String),

    /// No signature where one is required.
    #[error("signature missing")]
    SignatureMissing,

    /// Digest or signature value does not verify.
    #[error("signature validation failed: {0}")]
    SignatureInvalid(String),

    /// Signature algorithm not on the whitelist.
    #[error("signature algorithm not allowed: {0}")]
    SignatureAlgorithmNotAllowed(String),

    /// Data encryption algorithm missing or not on the whitelist.
    #[error("encryption algorithm not allowed: {0}")]
    EncryptionAlgorithmNotAllowed(String),

    /// Certificate rejected by policy or trust.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Encryption or decryption failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Encryption is required but no credential could be resolved.
    #[error("response must be encrypted: {0}")]
    UnencryptedResponse(String),

    /// Metadata retrieval or validation failed.
    #[error("metadata error ({key}): {message}")]
    Metadata {
        /// Error code.
        key: EidasErrorKey,
        /// Description.
        message: String,
    },

    /// Unknown or mismatching binding.
    #[error("unsupported binding: {0}")]
    UnsupportedBinding(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    /// I/O error, including inflate failures.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Cryptographic primitive failure.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Distributed cache failure.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration loading failure.
    #[error(transparent)]
    Core(#[from] eidas_core::Error),
}

impl SamlError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            key: EidasErrorKey::SamlEngineConfigurationError,
            message: message.into(),
        }
    }

    /// Creates an invalid SAML error without a cause.
    pub fn invalid_saml(key: EidasErrorKey, message: impl Into<String>) -> Self {
        Self::InvalidSaml {
            key,
            message: message.into(),
            cause: None,
        }
    }

    /// Wraps `cause` into an invalid SAML error.
    ///
    /// Invalid SAML errors pass through unchanged.
    #[must_use]
    pub fn wrap_invalid_saml(key: EidasErrorKey, cause: Self) -> Self {
        if cause.is_invalid_saml() {
            return cause;
        }
        Self::InvalidSaml {
            key,
            message: cause.to_string(),
            cause: Some(Box::new(cause)),
        }
    }

    /// Creates a metadata error.
    pub fn metadata(key: EidasErrorKey, message: impl Into<String>) -> Self {
        Self::Metadata {
            key,
            message: message.into(),
        }
    }

    /// Returns the error code.
    #[must_use]
    pub fn key(&self) -> EidasErrorKey {
        match self {
            Self::Configuration { key, .. }
            | Self::InvalidSaml { key, .. }
            | Self::Metadata { key, .. } => *key,
            Self::XmlParse(_) | Self::Message(_) | Self::Base64Decode(_) => {
                EidasErrorKey::MessageValidationError
            }
            Self::SignatureMissing | Self::SignatureInvalid(_) => {
                EidasErrorKey::InvalidCertificateSign
            }
            Self::SignatureAlgorithmNotAllowed(_) => EidasErrorKey::InvalidSignatureAlgorithm,
            Self::EncryptionAlgorithmNotAllowed(_) => EidasErrorKey::InvalidEncryptionAlgorithm,
            Self::InvalidCertificate(_) => EidasErrorKey::SamlEngineInvalidCertificate,
            Self::UnencryptedResponse(_) => EidasErrorKey::SamlEngineUnencryptedResponse,
            Self::Encryption(_) => EidasErrorKey::ColleagueRespInvalidSaml,
            Self::UnsupportedBinding(_) => EidasErrorKey::InvalidProtocolBinding,
            Self::Crypto(CryptoError::Verification) => EidasErrorKey::InvalidCertificateSign,
            Self::Crypto(CryptoError::InvalidCertificate(_)) => {
                EidasErrorKey::SamlEngineInvalidCertificate
            }
            Self::Crypto(CryptoError::Decryption) => EidasErrorKey::ColleagueRespInvalidSaml,
            Self::Crypto(_) | Self::Io(_) | Self::Cache(_) | Self::Core(_) => {
                EidasErrorKey::SamlEngineConfigurationError
            }
        }
    }

    /// Returns the innermost error code.
    ///
    /// For invalid SAML errors this is the code of the wrapped cause, which
    /// is what diagnostics usually want.
    #[must_use]
    pub fn root_key(&self) -> EidasErrorKey {
        match self {
            Self::InvalidSaml {
                cause: Some(cause), ..
            } => cause.root_key(),
            other => other.key(),
        }
    }

    /// Returns true for fatal configuration errors.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Configuration { .. } => true,
            Self::Metadata { key, .. } => key.is_configuration(),
            Self::Core(err) => err.is_configuration(),
            Self::Cache(err) => err.is_configuration(),
            Self::Io(_) => true,
            _ => false,
        }
    }

    /// Returns true for errors already classified as invalid SAML.
    #[must_use]
    pub const fn is_invalid_saml(&self) -> bool {
        matches!(self, Self::InvalidSaml { .. })
    }

    /// Returns the SAML top-level status code for this error.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        if self.is_configuration() {
            status_codes::RESPONDER
        } else {
            status_codes::REQUESTER
        }
    }

    /// Returns the second-level status code, if one applies.
    #[must_use]
    pub fn sub_status_code(&self) -> Option<&'static str> {
        match self.root_key() {
            EidasErrorKey::InvalidCertificateSign
            | EidasErrorKey::InvalidSignatureAlgorithm
            | EidasErrorKey::SamlEngineInvalidCertificate => Some(sub_status_codes::REQUEST_DENIED),
            EidasErrorKey::ColleagueReqInvalidLoa | EidasErrorKey::InvalidLoaValue => {
                Some(sub_status_codes::NO_AUTHN_CONTEXT)
            }
            EidasErrorKey::InvalidProtocolBinding => Some(sub_status_codes::REQUEST_UNSUPPORTED),
            EidasErrorKey::ColleagueReqInconsistentSpType
            | EidasErrorKey::ColleagueReqMissingSpType => {
                Some(sub_status_codes::INVALID_ATTR_NAME_OR_VALUE)
            }
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Configuration { .. } | Self::Io(_) | Self::Core(_) | Self::Cache(_) => 500,
            Self::Metadata { .. } => 502,
            Self::SignatureMissing
            | Self::SignatureInvalid(_)
            | Self::SignatureAlgorithmNotAllowed(_)
            | Self::InvalidCertificate(_) => 401,
            _ => 400,
        }
    }
}

impl From<quick_xml::Error> for SamlError {
    fn from(err: quick_xml::Error) -> Self {
        Self::XmlParse(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for SamlError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::XmlParse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_wire_values() {
        assert_eq!(
            EidasErrorKey::ColleagueReqInvalidSaml.code(),
            "colleagueRequest.invalidSAML"
        );
        assert_eq!(EidasErrorKey::ColleagueReqMissingSpType.code(), "missing.sptype");
        assert_eq!(
            EidasErrorKey::ColleagueReqInconsistentSpType.to_string(),
            "inconsistent.sptype"
        );
        assert_eq!(
            EidasErrorKey::SamlEngineNoMetadata.code(),
            "samlengine.metadata.retrieval.error"
        );
    }

    #[test]
    fn error_status_codes() {
        let err = SamlError::configuration("no keystore");
        assert!(err.is_configuration());
        assert_eq!(err.status_code(), status_codes::RESPONDER);
        assert_eq!(err.http_status(), 500);

        let err = SamlError::SignatureAlgorithmNotAllowed("rsa-sha1".to_string());
        assert!(!err.is_configuration());
        assert_eq!(err.key(), EidasErrorKey::InvalidSignatureAlgorithm);
        assert_eq!(err.status_code(), status_codes::REQUESTER);
        assert_eq!(err.sub_status_code(), Some(sub_status_codes::REQUEST_DENIED));
        assert_eq!(err.http_status(), 401);
    }

    #[test]
    fn wrapping_keeps_cause() {
        let binding = SamlError::invalid_saml(EidasErrorKey::InvalidProtocolBinding, "GET");
        let wrapped = SamlError::InvalidSaml {
            key: EidasErrorKey::ColleagueReqInvalidSaml,
            message: "binding".to_string(),
            cause: Some(Box::new(binding)),
        };
        assert_eq!(wrapped.key(), EidasErrorKey::ColleagueReqInvalidSaml);
        assert_eq!(wrapped.root_key(), EidasErrorKey::InvalidProtocolBinding);
        assert!(std::error::Error::source(&wrapped).is_some());

        let xml = SamlError::XmlParse("eof".to_string());
        let wrapped = SamlError::wrap_invalid_saml(EidasErrorKey::ColleagueReqInvalidSaml, xml);
        assert!(wrapped.is_invalid_saml());
        assert_eq!(wrapped.root_key(), EidasErrorKey::MessageValidationError);

        let again = SamlError::wrap_invalid_saml(EidasErrorKey::ColleagueRespInvalidSaml, wrapped);
        assert_eq!(again.key(), EidasErrorKey::ColleagueReqInvalidSaml);
    }

    #[test]
    fn repository_errors_are_configuration() {
        let err = SamlError::metadata(EidasErrorKey::ConsoleMetadataFileParsing, "empty metadata");
        assert!(err.is_configuration());
        let err = SamlError::metadata(EidasErrorKey::SamlEngineNoMetadata, "timeout");
        assert!(!err.is_configuration());
    }
}
