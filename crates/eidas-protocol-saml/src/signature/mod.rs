//! XML Signature support.
//!
//! Enveloped XML-DSig signatures over protocol messages and metadata.
//!
//! # Signing Algorithms
//!
//! - RSA-SHA256
//! - RSA-SHA384
//! - RSA-SHA512 (default)
//!
//! ECDSA and RSA-RIPEMD160 URIs are recognised on whitelists but cannot be
//! used to sign or verify.
//!
//! Every algorithm is gated by an [`AlgorithmWhitelist`] before any
//! cryptographic work happens.

mod module;
mod signer;
mod validator;
mod whitelist;

pub use module::{MetadataSignatureVerifier, SignatureModule};
pub use signer::XmlSigner;
pub use validator::XmlSignature;
pub use whitelist::AlgorithmWhitelist;

use chrono::{DateTime, Utc};
use eidas_crypto::{Certificate, HashAlgorithm, RsaAlgorithm};

use crate::error::{SamlError, SamlResult};
use crate::types::{digest_algorithms, signature_algorithms};

/// Signature algorithms that can sign and verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureAlgorithm {
    /// RSA with SHA-256.
    RsaSha256,
    /// RSA with SHA-384.
    RsaSha384,
    /// RSA with SHA-512.
    #[default]
    RsaSha512,
}

impl SignatureAlgorithm {
    /// Returns the URI for this signature algorithm.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => signature_algorithms::RSA_SHA256,
            Self::RsaSha384 => signature_algorithms::RSA_SHA384,
            Self::RsaSha512 => signature_algorithms::RSA_SHA512,
        }
    }

    /// Parses a signature algorithm from its URI, ignoring case.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        [Self::RsaSha256, Self::RsaSha384, Self::RsaSha512]
            .into_iter()
            .find(|a| a.uri().eq_ignore_ascii_case(uri.trim()))
    }

    /// Returns the digest algorithm URI that matches the signature hash.
    #[must_use]
    pub const fn digest_uri(&self) -> &'static str {
        match self {
            Self::RsaSha256 => digest_algorithms::SHA256,
            Self::RsaSha384 => digest_algorithms::SHA384,
            Self::RsaSha512 => digest_algorithms::SHA512,
        }
    }

    pub(crate) const fn rsa(self) -> RsaAlgorithm {
        match self {
            Self::RsaSha256 => RsaAlgorithm::Rs256,
            Self::RsaSha384 => RsaAlgorithm::Rs384,
            Self::RsaSha512 => RsaAlgorithm::Rs512,
        }
    }
}

/// Maps a digest method URI to a hash algorithm.
///
/// SHA-1 is recognised but refused.
pub fn digest_algorithm(uri: &str) -> SamlResult<HashAlgorithm> {
    match uri.trim() {
        digest_algorithms::SHA256 => Ok(HashAlgorithm::Sha256),
        digest_algorithms::SHA384 => Ok(HashAlgorithm::Sha384),
        digest_algorithms::SHA512 => Ok(HashAlgorithm::Sha512),
        other => Err(SamlError::SignatureAlgorithmNotAllowed(format!(
            "digest method {other}"
        ))),
    }
}

/// Certificate acceptance rules shared by signing, validation and encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CertificatePolicy {
    /// Reject certificates outside their validity period.
    pub check_validity_period: bool,
    /// Reject self-signed certificates.
    pub disallow_self_signed: bool,
}

impl CertificatePolicy {
    /// Checks a certificate against the policy at `now`.
    pub fn check(&self, certificate: &Certificate, now: DateTime<Utc>) -> SamlResult<()> {
        if self.disallow_self_signed && certificate.is_self_signed() {
            return Err(SamlError::InvalidCertificate(format!(
                "self-signed certificate {} is not allowed",
                certificate.subject()
            )));
        }
        if self.check_validity_period {
            certificate
                .check_validity(now)
                .map_err(|e| SamlError::InvalidCertificate(e.to_string()))?;
        }
        Ok(())
    }
}
