//! SAML 2.0, eIDAS and STORK constants.
//!
//! Namespace URIs, binding URIs, name ID formats, status codes and the
//! algorithm URIs used by XML-DSig and XML-Enc. Values are reproduced
//! exactly as partner nodes expect them on the wire.

/// SAML 2.0 assertion namespace URI.
pub const SAML_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// SAML 2.0 protocol namespace URI.
pub const SAMLP_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// SAML 2.0 metadata namespace URI.
pub const MD_NS: &str = "urn:oasis:names:tc:SAML:2.0:metadata";

/// SAML metadata entity attributes namespace URI.
pub const MDATTR_NS: &str = "urn:oasis:names:tc:SAML:metadata:attribute";

/// XML Digital Signature namespace URI.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// XML Encryption namespace URI.
pub const XMLENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";

/// XSI namespace URI.
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XS namespace URI.
pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// URI attribute name format.
pub const ATTRNAME_FORMAT_URI: &str = "urn:oasis:names:tc:SAML:2.0:attrname-format:uri";

/// SAML protocol version written on every message.
pub const SAML_VERSION: &str = "2.0";

/// eIDAS wire constants.
pub mod eidas {
    /// SAML extensions namespace.
    pub const EXTENSIONS_NS: &str = "http://eidas.europa.eu/saml-extensions";

    /// SAML extensions namespace prefix.
    pub const EXTENSIONS_PREFIX: &str = "eidas";

    /// Base URI of eIDAS attribute names.
    pub const ATTRIBUTES_BASE_URI: &str = "http://eidas.europa.eu/attributes/";

    /// Natural person attribute name prefix.
    pub const NATURAL_PERSON_PREFIX: &str = "http://eidas.europa.eu/attributes/naturalperson/";

    /// Legal person attribute name prefix.
    pub const LEGAL_PERSON_PREFIX: &str = "http://eidas.europa.eu/attributes/legalperson/";

    /// Natural person attribute type namespace.
    pub const NATURAL_PERSON_TYPES_NS: &str = "http://eidas.europa.eu/attributes/naturalperson";

    /// Legal person attribute type namespace.
    pub const LEGAL_PERSON_TYPES_NS: &str = "http://eidas.europa.eu/attributes/legalperson";

    /// Case-insensitive prefix of eIDAS level of assurance URIs.
    pub const LOA_START: &str = "http://eidas.europa.eu/loa/";

    /// Entity attribute carrying the supported level of assurance.
    pub const LOA_ENTITY_ATTRIBUTE: &str = "http://eidas.europa.eu/LoA";

    /// Request validator suite identifier.
    pub const REQUEST_VALIDATOR_SUITE_ID: &str = "eidasRequestValidatorSuiteId";

    /// Response validator suite identifier.
    pub const RESPONSE_VALIDATOR_SUITE_ID: &str = "eidasResponseValidatorSuiteId";
}

/// STORK 1.0 wire constants.
pub mod stork {
    /// Assertion namespace.
    pub const ASSERTION_NS: &str = "urn:eu:stork:names:tc:STORK:1.0:assertion";

    /// Assertion namespace prefix.
    pub const ASSERTION_PREFIX: &str = "stork";

    /// Protocol namespace.
    pub const PROTOCOL_NS: &str = "urn:eu:stork:names:tc:STORK:1.0:protocol";

    /// Protocol namespace prefix.
    pub const PROTOCOL_PREFIX: &str = "storkp";

    /// Base URI of STORK attribute names.
    pub const ATTRIBUTES_BASE_URI: &str = "http://www.stork.gov.eu/1.0/";

    /// Request validator suite identifier.
    pub const REQUEST_VALIDATOR_SUITE_ID: &str = "storkRequestValidatorSuiteId";

    /// Response validator suite identifier.
    pub const RESPONSE_VALIDATOR_SUITE_ID: &str = "storkResponseValidatorSuiteId";
}

// ============================================================================
// Binding URIs
// ============================================================================

/// SAML binding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SamlBinding {
    /// HTTP POST binding.
    HttpPost,
    /// HTTP Redirect binding.
    HttpRedirect,
    /// HTTP Artifact binding.
    HttpArtifact,
    /// SOAP binding.
    Soap,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
            Self::HttpArtifact => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact",
            Self::Soap => "urn:oasis:names:tc:SAML:2.0:bindings:SOAP",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" => Some(Self::HttpPost),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" => Some(Self::HttpRedirect),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Artifact" => Some(Self::HttpArtifact),
            "urn:oasis:names:tc:SAML:2.0:bindings:SOAP" => Some(Self::Soap),
            _ => None,
        }
    }

    /// Returns the HTTP method a message arrives with on this binding.
    ///
    /// Redirect is `GET`; every other binding is `POST`.
    #[must_use]
    pub const fn http_method(&self) -> &'static str {
        match self {
            Self::HttpRedirect => "GET",
            _ => "POST",
        }
    }
}

/// Returns the HTTP method for a binding URI.
///
/// Unknown URIs map to `POST`.
#[must_use]
pub fn binding_http_method(binding_uri: &str) -> &'static str {
    SamlBinding::from_uri(binding_uri).map_or("POST", |b| b.http_method())
}

// ============================================================================
// Name ID Formats
// ============================================================================

/// SAML Name ID formats used by eIDAS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum NameIdFormat {
    /// Unspecified name ID format.
    #[default]
    Unspecified,
    /// Persistent identifier format.
    Persistent,
    /// Transient identifier format.
    Transient,
}

impl NameIdFormat {
    /// All formats, in the order published in metadata.
    pub const ALL: [Self; 3] = [Self::Persistent, Self::Transient, Self::Unspecified];

    /// Returns the URI for this name ID format.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified",
            Self::Persistent => "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent",
            Self::Transient => "urn:oasis:names:tc:SAML:2.0:nameid-format:transient",
        }
    }

    /// Parses a name ID format from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified" => Some(Self::Unspecified),
            "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent" => Some(Self::Persistent),
            "urn:oasis:names:tc:SAML:2.0:nameid-format:transient" => Some(Self::Transient),
            _ => None,
        }
    }
}

// ============================================================================
// Status Codes
// ============================================================================

/// Top-level SAML status codes.
pub mod status_codes {
    /// Success status code.
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

    /// Requester error status code.
    pub const REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";

    /// Responder error status code.
    pub const RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";

    /// Version mismatch status code.
    pub const VERSION_MISMATCH: &str = "urn:oasis:names:tc:SAML:2.0:status:VersionMismatch";
}

/// Second-level SAML status codes.
pub mod sub_status_codes {
    /// Authentication failed.
    pub const AUTHN_FAILED: &str = "urn:oasis:names:tc:SAML:2.0:status:AuthnFailed";

    /// Invalid attribute name or value.
    pub const INVALID_ATTR_NAME_OR_VALUE: &str =
        "urn:oasis:names:tc:SAML:2.0:status:InvalidAttrNameOrValue";

    /// No authn context.
    pub const NO_AUTHN_CONTEXT: &str = "urn:oasis:names:tc:SAML:2.0:status:NoAuthnContext";

    /// Request denied.
    pub const REQUEST_DENIED: &str = "urn:oasis:names:tc:SAML:2.0:status:RequestDenied";

    /// Request unsupported.
    pub const REQUEST_UNSUPPORTED: &str = "urn:oasis:names:tc:SAML:2.0:status:RequestUnsupported";
}

// ============================================================================
// Algorithms
// ============================================================================

/// XML signature algorithms.
pub mod signature_algorithms {
    /// RSA-SHA256 signature algorithm.
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";

    /// RSA-SHA384 signature algorithm.
    pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";

    /// RSA-SHA512 signature algorithm.
    pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";

    /// RSA-RIPEMD160 signature algorithm.
    pub const RSA_RIPEMD160: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-ripemd160";

    /// ECDSA-SHA256 signature algorithm.
    pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";

    /// ECDSA-SHA384 signature algorithm.
    pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";

    /// ECDSA-SHA512 signature algorithm.
    pub const ECDSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";

    /// Every algorithm a whitelist may name.
    pub const KNOWN: [&str; 7] = [
        RSA_SHA256,
        RSA_SHA384,
        RSA_SHA512,
        RSA_RIPEMD160,
        ECDSA_SHA256,
        ECDSA_SHA384,
        ECDSA_SHA512,
    ];
}

/// Digest algorithms.
pub mod digest_algorithms {
    /// SHA-256 digest algorithm.
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

    /// SHA-384 digest algorithm.
    pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";

    /// SHA-512 digest algorithm.
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

    /// SHA-1 digest, only used as the RSA-OAEP default.
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
}

/// Canonicalization and transform algorithms.
pub mod canonicalization_algorithms {
    /// Exclusive C14N without comments.
    pub const EXCLUSIVE_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

    /// Enveloped signature transform.
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
}

/// XML encryption algorithms.
pub mod encryption_algorithms {
    /// AES-128 in GCM mode.
    pub const AES128_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes128-gcm";

    /// AES-192 in GCM mode.
    pub const AES192_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes192-gcm";

    /// AES-256 in GCM mode.
    pub const AES256_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";

    /// RSA-OAEP key transport with MGF1/SHA-1.
    pub const RSA_OAEP_MGF1P: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";

    /// RSA-OAEP key transport, XML-Enc 1.1 identifier.
    pub const RSA_OAEP: &str = "http://www.w3.org/2009/xmlenc11#rsa-oaep";

    /// Encrypted element content type.
    pub const TYPE_ELEMENT: &str = "http://www.w3.org/2001/04/xmlenc#Element";

    /// Every data encryption algorithm a whitelist may name.
    pub const KNOWN: [&str; 3] = [AES128_GCM, AES192_GCM, AES256_GCM];
}
