//! Keystore and trust store.
//!
//! The keystore holds credentials (a certificate and, for signing or
//! decryption, a PKCS#8 private key). The trust store holds only
//! certificates and answers whether a presented certificate is trusted.

use std::path::Path;

use eidas_core::{KeyReference, KeyStoreEntry};

use crate::certificate::{pem_to_der, Certificate};
use crate::error::{CryptoError, CryptoResult};

/// A certificate with an optional private key.
#[derive(Debug, Clone)]
pub struct KeyEntry {
    alias: String,
    certificate: Certificate,
    private_key: Option<Vec<u8>>,
}

impl KeyEntry {
    /// Creates an entry from PEM text.
    pub fn from_pem(
        alias: impl Into<String>,
        certificate_pem: &str,
        private_key_pem: Option<&str>,
    ) -> CryptoResult<Self> {
        Ok(Self {
            alias: alias.into(),
            certificate: Certificate::from_pem(certificate_pem)?,
            private_key: private_key_pem.map(pem_to_der).transpose()?,
        })
    }

    /// Returns the alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Returns the certificate.
    #[must_use]
    pub const fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Returns the PKCS#8 private key, if this entry has one.
    #[must_use]
    pub fn private_key(&self) -> Option<&[u8]> {
        self.private_key.as_deref()
    }
}

/// Credentials addressable by alias or by serial number and issuer.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    entries: Vec<KeyEntry>,
}

impl KeyStore {
    /// Creates an empty keystore.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configured entries from disk.
    pub fn load(entries: &[KeyStoreEntry]) -> CryptoResult<Self> {
        let mut store = Self::new();
        for entry in entries {
            let cert = read(&entry.certificate)?;
            let key = entry.private_key.as_deref().map(read).transpose()?;
            store.insert(KeyEntry::from_pem(&entry.alias, &cert, key.as_deref())?);
        }
        tracing::debug!(entries = store.entries.len(), "Keystore loaded");
        Ok(store)
    }

    /// Adds an entry.
    pub fn insert(&mut self, entry: KeyEntry) {
        self.entries.push(entry);
    }

    /// Returns all entries.
    #[must_use]
    pub fn entries(&self) -> &[KeyEntry] {
        &self.entries
    }

    /// Returns true when the keystore has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Finds an entry by alias.
    #[must_use]
    pub fn find_by_alias(&self, alias: &str) -> Option<&KeyEntry> {
        self.entries.iter().find(|e| e.alias == alias)
    }

    /// Finds an entry by certificate serial number and issuer DN.
    #[must_use]
    pub fn find(&self, reference: &KeyReference) -> Option<&KeyEntry> {
        self.entries
            .iter()
            .find(|e| e.certificate.matches(&reference.serial_number, &reference.issuer))
    }

    /// Finds the entry holding exactly this certificate.
    #[must_use]
    pub fn find_by_certificate(&self, certificate: &Certificate) -> Option<&KeyEntry> {
        self.entries
            .iter()
            .find(|e| e.certificate.der() == certificate.der())
    }
}

/// Certificates trusted for signature validation.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    certificates: Vec<Certificate>,
}

impl TrustStore {
    /// Creates a trust store from certificates.
    #[must_use]
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self { certificates }
    }

    /// Loads PEM certificates from disk.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> CryptoResult<Self> {
        let certificates = paths
            .iter()
            .map(|p| read(p.as_ref()).and_then(|pem| Certificate::from_pem(&pem)))
            .collect::<CryptoResult<Vec<_>>>()?;
        Ok(Self::new(certificates))
    }

    /// Returns the trusted certificates.
    #[must_use]
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    /// Returns true when the trust store has no certificates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Checks that `certificate` is trusted: either pinned directly or
    /// issued by a trusted certificate.
    pub fn check_trust(&self, certificate: &Certificate) -> CryptoResult<()> {
        if self.certificates.iter().any(|c| c.der() == certificate.der()) {
            return Ok(());
        }
        if self
            .certificates
            .iter()
            .any(|anchor| certificate.verify_issued_by(anchor).is_ok())
        {
            return Ok(());
        }
        Err(CryptoError::InvalidCertificate(format!(
            "certificate {} is not trusted",
            certificate.subject()
        )))
    }
}

fn read(path: &Path) -> CryptoResult<String> {
    std::fs::read_to_string(path).map_err(|e| {
        CryptoError::InvalidKey(format!("cannot read {}: {e}", path.display()))
    })
}
