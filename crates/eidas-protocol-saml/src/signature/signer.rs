//! XML Signature creation.

use base64::Engine;
use eidas_crypto::KeyEntry;

use super::{digest_algorithm, SignatureAlgorithm};
use crate::error::{SamlError, SamlResult};
use crate::types::{canonicalization_algorithms, XMLDSIG_NS};
use crate::xml;

/// Enveloped signature writer bound to one credential.
#[derive(Debug, Clone)]
pub struct XmlSigner {
    credential: KeyEntry,
    algorithm: SignatureAlgorithm,
    digest_uri: String,
}

impl XmlSigner {
    /// Creates a signer. The credential must carry a private key.
    pub fn new(credential: KeyEntry, algorithm: SignatureAlgorithm) -> SamlResult<Self> {
        if credential.private_key().is_none() {
            return Err(SamlError::configuration(format!(
                "signing credential '{}' has no private key",
                credential.alias()
            )));
        }
        Ok(Self {
            credential,
            algorithm,
            digest_uri: algorithm.digest_uri().to_string(),
        })
    }

    /// Uses a digest method other than the one matching the signature hash.
    pub fn with_digest(mut self, digest_uri: &str) -> SamlResult<Self> {
        digest_algorithm(digest_uri)?;
        self.digest_uri = digest_uri.trim().to_string();
        Ok(self)
    }

    /// Returns the signing credential.
    #[must_use]
    pub const fn credential(&self) -> &KeyEntry {
        &self.credential
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Signs the document's root element.
    pub fn sign_root(&self, xml: &str) -> SamlResult<String> {
        let range = xml::root_range(xml)
            .ok_or_else(|| SamlError::Message("document has no root element".to_string()))?;
        let root = xml::parse(&xml[range])?;
        let id = root
            .attr("ID")
            .ok_or_else(|| SamlError::Message(format!("{} has no ID", root.qname)))?;
        self.sign(xml, id)
    }

    /// Signs the element carrying `ID="reference_id"`.
    ///
    /// The `ds:Signature` is inserted after the element's `Issuer` when the
    /// element starts with one, otherwise as its first child.
    pub fn sign(&self, xml: &str, reference_id: &str) -> SamlResult<String> {
        let range = xml::element_range_by_id(xml, reference_id).ok_or_else(|| {
            SamlError::Message(format!("element with ID '{reference_id}' not found"))
        })?;
        let insert_at = signature_position(xml, range.start)?;

        let digest = eidas_crypto::hash(
            digest_algorithm(&self.digest_uri)?,
            xml::canonicalize_element(xml, range)?.as_bytes(),
        );
        let signed_info = self.signed_info(reference_id, &encode(&digest));

        let scope = xml::namespaces_in_scope(xml, insert_at)?;
        let canonical_signed_info = xml::canonicalize(&signed_info, &scope)?;

        let private_key = self
            .credential
            .private_key()
            .ok_or_else(|| SamlError::configuration("signing credential has no private key"))?;
        let signature_value = eidas_crypto::rsa_sign(
            private_key,
            canonical_signed_info.as_bytes(),
            self.algorithm.rsa(),
        )?;

        let signature = format!(
            r#"<ds:Signature xmlns:ds="{XMLDSIG_NS}">{signed_info}<ds:SignatureValue>{}</ds:SignatureValue><ds:KeyInfo><ds:X509Data><ds:X509Certificate>{}</ds:X509Certificate></ds:X509Data></ds:KeyInfo></ds:Signature>"#,
            encode(&signature_value),
            self.credential.certificate().to_base64()
        );

        tracing::debug!(
            reference = %reference_id,
            algorithm = %self.algorithm.uri(),
            credential = %self.credential.alias(),
            "Signed element"
        );
        Ok(format!("{}{signature}{}", &xml[..insert_at], &xml[insert_at..]))
    }

    fn signed_info(&self, reference_id: &str, digest_b64: &str) -> String {
        format!(
            r##"<ds:SignedInfo xmlns:ds="{XMLDSIG_NS}"><ds:CanonicalizationMethod Algorithm="{c14n}"/><ds:SignatureMethod Algorithm="{method}"/><ds:Reference URI="#{reference}"><ds:Transforms><ds:Transform Algorithm="{enveloped}"/><ds:Transform Algorithm="{c14n}"/></ds:Transforms><ds:DigestMethod Algorithm="{digest}"/><ds:DigestValue>{digest_b64}</ds:DigestValue></ds:Reference></ds:SignedInfo>"##,
            c14n = canonicalization_algorithms::EXCLUSIVE_C14N,
            method = self.algorithm.uri(),
            reference = xml::escape(reference_id),
            enveloped = canonicalization_algorithms::ENVELOPED_SIGNATURE,
            digest = self.digest_uri,
        )
    }
}

fn encode(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Returns where an enveloped signature goes inside the element at `start`.
pub(super) fn signature_position(xml: &str, start: usize) -> SamlResult<usize> {
    let open_end = xml::start_tag_end(xml, start)
        .ok_or_else(|| SamlError::Message("malformed start tag".to_string()))?;
    let rest = &xml[open_end..];
    let child = open_end + (rest.len() - rest.trim_start().len());
    let is_issuer = xml[child..].starts_with('<')
        && xml[child..]
            .split(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .next()
            .is_some_and(|tag| tag.ends_with(":Issuer") || tag == "<Issuer");
    if is_issuer {
        let issuer = xml::element_range_at(xml, child)
            .ok_or_else(|| SamlError::Message("unclosed Issuer element".to_string()))?;
        return Ok(issuer.end);
    }
    Ok(open_end)
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: &str = include_str!("../../../../testdata/node.pem");
    const NODE_KEY: &str = include_str!("../../../../testdata/node.key");
    const PARTNER: &str = include_str!("../../../../testdata/partner.pem");

    fn signer() -> XmlSigner {
        let credential = KeyEntry::from_pem("node", NODE, Some(NODE_KEY)).unwrap();
        XmlSigner::new(credential, SignatureAlgorithm::RsaSha256).unwrap()
    }

    const DOC: &str = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml2="urn:oasis:names:tc:SAML:2.0:assertion" ID="_resp"><saml2:Issuer>https://node.example.eu</saml2:Issuer><samlp:Status/></samlp:Response>"#;

    #[test]
    fn signature_follows_issuer() {
        let signed = signer().sign_root(DOC).unwrap();
        let issuer_end = signed.find("</saml2:Issuer>").unwrap();
        let signature = signed.find("<ds:Signature").unwrap();
        assert_eq!(signature, issuer_end + "</saml2:Issuer>".len());
        assert!(signed.contains(r##"URI="#_resp""##));
        assert!(signed.contains(SignatureAlgorithm::RsaSha256.uri()));
        assert!(xml::parse(&signed).is_ok());
    }

    #[test]
    fn signature_is_first_child_without_issuer() {
        let doc = r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" ID="_md" entityID="https://node"><md:Extensions/></md:EntityDescriptor>"#;
        let signed = signer().sign_root(doc).unwrap();
        assert!(signed.contains(r#"entityID="https://node"><ds:Signature"#));
    }

    #[test]
    fn credential_without_key_is_rejected() {
        let credential = KeyEntry::from_pem("partner", PARTNER, None).unwrap();
        let err = XmlSigner::new(credential, SignatureAlgorithm::RsaSha512).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn unknown_reference_fails() {
        assert!(signer().sign(DOC, "_missing").is_err());
    }

    #[test]
    fn digest_override() {
        let signer = signer()
            .with_digest(crate::types::digest_algorithms::SHA512)
            .unwrap();
        let signed = signer.sign_root(DOC).unwrap();
        assert!(signed.contains(crate::types::digest_algorithms::SHA512));
        assert!(signer
            .clone()
            .with_digest(crate::types::digest_algorithms::SHA1)
            .is_err());
    }
}
