//! XML Signature validation.

use std::ops::Range;

use base64::Engine;
use eidas_crypto::Certificate;

use super::{digest_algorithm, signer::signature_position};
use crate::error::{SamlError, SamlResult};
use crate::types::XMLDSIG_NS;
use crate::xml::{self, XmlElement};

/// An enveloped signature found on a document's root element.
#[derive(Debug, Clone)]
pub struct XmlSignature {
    /// ID of the signed element.
    pub reference_id: String,
    /// Signature method URI.
    pub signature_algorithm: String,
    /// Digest method URI.
    pub digest_algorithm: String,
    /// Base64 digest value.
    pub digest_value: String,
    /// Base64 signature value.
    pub signature_value: String,
    /// Certificate from `KeyInfo`, if any.
    pub certificate: Option<Certificate>,
    signed_info: String,
    signed_info_scope: Vec<(String, String)>,
    range: Range<usize>,
}

impl XmlSignature {
    /// Extracts the signature of the root element.
    ///
    /// Returns `None` when the root is unsigned. Signatures on nested
    /// elements, such as assertions, are not considered.
    pub fn extract(xml: &str) -> SamlResult<Option<Self>> {
        let root_range = xml::root_range(xml)
            .ok_or_else(|| SamlError::Message("document has no root element".to_string()))?;
        let position = signature_position(xml, root_range.start)?;
        if xml::find_start_tag(xml, position, "ds:Signature") != Some(position) {
            return Ok(None);
        }
        let range = xml::element_range_at(xml, position)
            .ok_or_else(|| SamlError::Message("unclosed ds:Signature".to_string()))?;
        let element = xml::parse(&xml[range.clone()])?;
        let root = xml::parse(&xml[root_range])?;

        let signed_info_start = xml::find_start_tag(xml, range.start, "ds:SignedInfo")
            .filter(|s| *s < range.end)
            .ok_or_else(|| SamlError::Message("signature has no SignedInfo".to_string()))?;
        let signed_info_range = xml::element_range_at(xml, signed_info_start)
            .ok_or_else(|| SamlError::Message("unclosed SignedInfo".to_string()))?;

        let signed_info = child(&element, "SignedInfo")?;
        let reference = child(signed_info, "Reference")?;
        let reference_id = reference
            .attr("URI")
            .and_then(|u| u.strip_prefix('#'))
            .ok_or_else(|| SamlError::SignatureInvalid("reference URI is not local".to_string()))?;
        let root_id = root.attr("ID").unwrap_or_default();
        if reference_id != root_id {
            return Err(SamlError::SignatureInvalid(format!(
                "signature references '{reference_id}', not the root element '{root_id}'"
            )));
        }

        let certificate = element
            .find(XMLDSIG_NS, "X509Certificate")
            .map(|c| Certificate::from_base64(c.text()))
            .transpose()
            .map_err(|e| SamlError::InvalidCertificate(e.to_string()))?;

        Ok(Some(Self {
            reference_id: reference_id.to_string(),
            signature_algorithm: algorithm_of(child(signed_info, "SignatureMethod")?)?,
            digest_algorithm: algorithm_of(child(reference, "DigestMethod")?)?,
            digest_value: child(reference, "DigestValue")?.text().to_string(),
            signature_value: child(&element, "SignatureValue")?.text().to_string(),
            certificate,
            signed_info_scope: xml::namespaces_in_scope(xml, signed_info_range.start)?,
            signed_info: xml[signed_info_range].to_string(),
            range,
        }))
    }

    /// Recomputes the digest of the signed element without its signature.
    pub fn verify_digest(&self, xml: &str) -> SamlResult<()> {
        let element = xml::element_range_by_id(xml, &self.reference_id).ok_or_else(|| {
            SamlError::SignatureInvalid(format!("element '{}' not found", self.reference_id))
        })?;
        if self.range.start < element.start || self.range.end > element.end {
            return Err(SamlError::SignatureInvalid(
                "signature is not enveloped by the signed element".to_string(),
            ));
        }
        let unsigned = format!(
            "{}{}",
            &xml[element.start..self.range.start],
            &xml[self.range.end..element.end]
        );
        let scope = xml::namespaces_in_scope(xml, element.start)?;
        let digest = eidas_crypto::hash(
            digest_algorithm(&self.digest_algorithm)?,
            xml::canonicalize(&unsigned, &scope)?.as_bytes(),
        );
        if base64::engine::general_purpose::STANDARD.encode(digest) != self.digest_value {
            return Err(SamlError::SignatureInvalid("digest mismatch".to_string()));
        }
        Ok(())
    }

    /// Verifies the signature value over `SignedInfo` with `certificate`.
    pub fn verify_with(&self, certificate: &Certificate) -> SamlResult<()> {
        let algorithm = super::SignatureAlgorithm::from_uri(&self.signature_algorithm)
            .ok_or_else(|| {
                SamlError::SignatureInvalid(format!(
                    "cannot verify {} signatures",
                    self.signature_algorithm
                ))
            })?;
        let signature = base64::engine::general_purpose::STANDARD
            .decode(self.signature_value.split_whitespace().collect::<String>())?;
        eidas_crypto::rsa_verify(
            certificate.public_key(),
            xml::canonicalize(&self.signed_info, &self.signed_info_scope)?.as_bytes(),
            &signature,
            algorithm.rsa(),
        )
        .map_err(|_| SamlError::SignatureInvalid("signature value does not verify".to_string()))
    }

    /// Returns the document without this signature.
    #[must_use]
    pub fn strip(&self, xml: &str) -> String {
        format!("{}{}", &xml[..self.range.start], &xml[self.range.end..])
    }
}

fn child<'a>(element: &'a XmlElement, local_name: &str) -> SamlResult<&'a XmlElement> {
    element
        .child(XMLDSIG_NS, local_name)
        .ok_or_else(|| SamlError::SignatureInvalid(format!("signature has no {local_name}")))
}

fn algorithm_of(element: &XmlElement) -> SamlResult<String> {
    element
        .attr("Algorithm")
        .map(str::to_string)
        .ok_or_else(|| SamlError::SignatureInvalid(format!("{} has no Algorithm", element.qname)))
}
