//! X.509 certificate inspection.
//!
//! The parsed fields are copied out of the DER so a [`Certificate`] owns its
//! data and can be shared between threads.

use base64::Engine;
use chrono::{DateTime, Utc};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{CryptoError, CryptoResult};

/// An X.509 certificate with its commonly used fields extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    serial_hex: String,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    spki_der: Vec<u8>,
    public_key: Vec<u8>,
}

impl Certificate {
    /// Parses a DER encoded certificate.
    pub fn from_der(der: &[u8]) -> CryptoResult<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| CryptoError::InvalidCertificate(format!("parse error: {e}")))?;

        let not_before = asn1_to_utc(cert.validity().not_before.timestamp())?;
        let not_after = asn1_to_utc(cert.validity().not_after.timestamp())?;

        Ok(Self {
            der: der.to_vec(),
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            serial_hex: normalize_serial(&hex(cert.raw_serial())),
            not_before,
            not_after,
            spki_der: cert.public_key().raw.to_vec(),
            public_key: cert.public_key().subject_public_key.data.to_vec(),
        })
    }

    /// Parses the first PEM block as a certificate.
    pub fn from_pem(pem: &str) -> CryptoResult<Self> {
        Self::from_der(&pem_to_der(pem)?)
    }

    /// Parses a base64 DER certificate as carried in `ds:X509Certificate`.
    pub fn from_base64(value: &str) -> CryptoResult<Self> {
        let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
        let der = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| CryptoError::InvalidCertificate(format!("base64: {e}")))?;
        Self::from_der(&der)
    }

    /// Returns the certificate as single-line base64 DER.
    #[must_use]
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.der)
    }

    /// Returns the DER encoding.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the subject distinguished name.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the issuer distinguished name.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the serial number as lower-case hex without leading zeros.
    #[must_use]
    pub fn serial_hex(&self) -> &str {
        &self.serial_hex
    }

    /// Returns the start of the validity period.
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// Returns the end of the validity period.
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Returns the DER `SubjectPublicKeyInfo`.
    #[must_use]
    pub fn spki_der(&self) -> &[u8] {
        &self.spki_der
    }

    /// Returns the raw subject public key (PKCS#1 `RSAPublicKey` for RSA).
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }

    /// Returns true when subject and issuer are the same name.
    #[must_use]
    pub fn is_self_signed(&self) -> bool {
        same_dn(&self.subject, &self.issuer)
    }

    /// Checks that `now` lies within the validity period.
    pub fn check_validity(&self, now: DateTime<Utc>) -> CryptoResult<()> {
        if now < self.not_before {
            return Err(CryptoError::InvalidCertificate(format!(
                "certificate {} is not valid before {}",
                self.subject, self.not_before
            )));
        }
        if now > self.not_after {
            return Err(CryptoError::InvalidCertificate(format!(
                "certificate {} expired on {}",
                self.subject, self.not_after
            )));
        }
        Ok(())
    }

    /// Verifies that this certificate was signed by `issuer`.
    pub fn verify_issued_by(&self, issuer: &Self) -> CryptoResult<()> {
        if !same_dn(&self.issuer, &issuer.subject) {
            return Err(CryptoError::Verification);
        }
        let (_, cert) = X509Certificate::from_der(&self.der)
            .map_err(|e| CryptoError::InvalidCertificate(format!("parse error: {e}")))?;
        let (_, issuer_cert) = X509Certificate::from_der(&issuer.der)
            .map_err(|e| CryptoError::InvalidCertificate(format!("parse error: {e}")))?;
        cert.verify_signature(Some(issuer_cert.public_key()))
            .map_err(|_| CryptoError::Verification)
    }

    /// Returns true when the serial number and issuer DN match.
    ///
    /// Serial numbers compare as hex ignoring case, separators and leading
    /// zeros. Issuer names compare ignoring case and spacing around `,`.
    #[must_use]
    pub fn matches(&self, serial_number: &str, issuer: &str) -> bool {
        self.serial_hex == normalize_serial(serial_number) && same_dn(&self.issuer, issuer)
    }
}

/// Decodes the first PEM block to DER.
pub fn pem_to_der(pem: &str) -> CryptoResult<Vec<u8>> {
    let (_, block) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
        .map_err(|e| CryptoError::InvalidKey(format!("PEM decode error: {e}")))?;
    Ok(block.contents)
}

fn asn1_to_utc(timestamp: i64) -> CryptoResult<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| CryptoError::InvalidCertificate(format!("timestamp out of range: {timestamp}")))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn normalize_serial(serial: &str) -> String {
    let cleaned: String = serial
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(char::is_ascii_hexdigit)
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let trimmed = cleaned.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

fn normalize_dn(dn: &str) -> String {
    dn.split(',')
        .map(|part| part.trim().replace(" = ", "=").to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

fn same_dn(a: &str, b: &str) -> bool {
    normalize_dn(a) == normalize_dn(b)
}
