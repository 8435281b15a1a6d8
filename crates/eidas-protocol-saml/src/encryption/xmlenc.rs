//! `saml2:EncryptedAssertion` rendering and parsing.

use std::ops::Range;

use base64::Engine;
use eidas_crypto::Certificate;

use crate::error::{SamlError, SamlResult};
use crate::types::{encryption_algorithms, digest_algorithms, SAML_NS, XMLDSIG_NS, XMLENC_NS};
use crate::xml::{self, XmlElement};

/// An encrypted assertion with its inline encrypted key.
#[derive(Debug, Clone)]
pub struct EncryptedAssertion {
    /// Data encryption algorithm URI, if declared.
    pub data_algorithm: Option<String>,
    /// Key transport algorithm URI, if declared.
    pub key_transport: Option<String>,
    /// Certificate the content key was wrapped for.
    pub recipient: Option<Certificate>,
    /// Wrapped content-encryption key.
    pub encrypted_key: Vec<u8>,
    /// `IV || ciphertext || tag`.
    pub cipher_value: Vec<u8>,
}

impl EncryptedAssertion {
    /// Renders the element. The `saml2` prefix must be in scope.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let data_method = self
            .data_algorithm
            .as_deref()
            .map(|a| format!(r#"<xenc:EncryptionMethod Algorithm="{a}"/>"#))
            .unwrap_or_default();
        let key_method = self
            .key_transport
            .as_deref()
            .map(|a| {
                format!(
                    r#"<xenc:EncryptionMethod Algorithm="{a}"><ds:DigestMethod Algorithm="{}"/></xenc:EncryptionMethod>"#,
                    digest_algorithms::SHA1
                )
            })
            .unwrap_or_default();
        let recipient = self
            .recipient
            .as_ref()
            .map(|c| {
                format!(
                    "<ds:KeyInfo><ds:X509Data><ds:X509Certificate>{}</ds:X509Certificate></ds:X509Data></ds:KeyInfo>",
                    c.to_base64()
                )
            })
            .unwrap_or_default();
        format!(
            r#"<saml2:EncryptedAssertion><xenc:EncryptedData xmlns:xenc="{XMLENC_NS}" xmlns:ds="{XMLDSIG_NS}" Type="{}">{data_method}<ds:KeyInfo><xenc:EncryptedKey>{key_method}{recipient}<xenc:CipherData><xenc:CipherValue>{}</xenc:CipherValue></xenc:CipherData></xenc:EncryptedKey></ds:KeyInfo><xenc:CipherData><xenc:CipherValue>{}</xenc:CipherValue></xenc:CipherData></xenc:EncryptedData></saml2:EncryptedAssertion>"#,
            encryption_algorithms::TYPE_ELEMENT,
            encode(&self.encrypted_key),
            encode(&self.cipher_value),
        )
    }

    /// Parses the `saml2:EncryptedAssertion` at `range` of a document,
    /// resolving prefixes its ancestors declare.
    pub fn parse_at(xml: &str, range: Range<usize>) -> SamlResult<Self> {
        Self::parse(&xml::detach(xml, range)?)
    }

    /// Parses a standalone `saml2:EncryptedAssertion` element.
    pub fn parse(fragment: &str) -> SamlResult<Self> {
        let root = xml::parse(fragment)?;
        if !root.is(SAML_NS, "EncryptedAssertion") {
            return Err(SamlError::Encryption(format!(
                "expected EncryptedAssertion, found {}",
                root.qname
            )));
        }
        let data = root
            .child(XMLENC_NS, "EncryptedData")
            .ok_or_else(|| SamlError::Encryption("missing EncryptedData".to_string()))?;
        let key = data
            .find(XMLENC_NS, "EncryptedKey")
            .ok_or_else(|| SamlError::Encryption("missing EncryptedKey".to_string()))?;

        let recipient = key
            .find(XMLDSIG_NS, "X509Certificate")
            .map(|c| Certificate::from_base64(c.text()))
            .transpose()
            .map_err(|e| SamlError::InvalidCertificate(e.to_string()))?;

        Ok(Self {
            data_algorithm: algorithm(data),
            key_transport: algorithm(key),
            recipient,
            encrypted_key: cipher_value(key)?,
            cipher_value: cipher_value(data)?,
        })
    }
}

fn algorithm(element: &XmlElement) -> Option<String> {
    element
        .child(XMLENC_NS, "EncryptionMethod")
        .and_then(|m| m.attr("Algorithm"))
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
}

fn cipher_value(element: &XmlElement) -> SamlResult<Vec<u8>> {
    let value = element
        .child(XMLENC_NS, "CipherData")
        .and_then(|d| d.child_text(XMLENC_NS, "CipherValue"))
        .ok_or_else(|| SamlError::Encryption(format!("{} has no CipherValue", element.qname)))?;
    Ok(base64::engine::general_purpose::STANDARD
        .decode(value.split_whitespace().collect::<String>())?)
}

fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
