//! Dialect-specific `<samlp:Extensions>` processing.
//!
//! STORK 1.0 and eIDAS carry their request properties in different
//! extension elements. Both dialects implement [`ExtensionProcessor`] and
//! are selected by the [`SamlExtensionFormat`] configured for an engine
//! instance.
//!
//! Attribute wire names are resolved by [`NameResolver`]: first
//! `<prefix>.<shortName>` in the instance's attribute table, then the bare
//! `<shortName>`.

mod eidas;
mod stork;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use base64::Engine;
use chrono::{DateTime, Utc};
use eidas_core::CoreProperties;

pub use self::eidas::EidasExtensionProcessor;
pub use self::stork::StorkExtensionProcessor;

use crate::attribute::AttributeDefinition;
use crate::error::{SamlError, SamlResult};
use crate::types::{
    self, AuthnRequest, RequestedAttribute, ResponseAttribute, SamlBinding, ATTRNAME_FORMAT_URI,
    SAMLP_NS, SAML_NS, XSI_NS,
};
use crate::xml::{self, XmlElement};

/// Which protocol dialect a format selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolDialect {
    /// STORK 1.0.
    Stork1,
    /// eIDAS 1.0.
    Eidas,
}

/// Namespaces and naming conventions of a protocol dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamlExtensionFormat {
    /// Format name as configured.
    pub name: &'static str,
    /// Dialect.
    pub dialect: ProtocolDialect,
    /// Assertion extension namespace.
    pub assertion_ns: &'static str,
    /// Assertion extension prefix.
    pub assertion_prefix: &'static str,
    /// Protocol extension namespace.
    pub protocol_ns: &'static str,
    /// Protocol extension prefix.
    pub protocol_prefix: &'static str,
    /// Base URI of attribute names.
    pub base_uri: &'static str,
}

impl SamlExtensionFormat {
    /// STORK 1.0.
    pub const STORK1: Self = Self {
        name: "stork1",
        dialect: ProtocolDialect::Stork1,
        assertion_ns: types::stork::ASSERTION_NS,
        assertion_prefix: types::stork::ASSERTION_PREFIX,
        protocol_ns: types::stork::PROTOCOL_NS,
        protocol_prefix: types::stork::PROTOCOL_PREFIX,
        base_uri: types::stork::ATTRIBUTES_BASE_URI,
    };

    /// eIDAS 1.0.
    pub const EIDAS: Self = Self {
        name: "eidas",
        dialect: ProtocolDialect::Eidas,
        assertion_ns: types::stork::ASSERTION_NS,
        assertion_prefix: types::stork::ASSERTION_PREFIX,
        protocol_ns: types::stork::PROTOCOL_NS,
        protocol_prefix: types::stork::PROTOCOL_PREFIX,
        base_uri: types::eidas::ATTRIBUTES_BASE_URI,
    };

    /// Looks up a format by name, ignoring case. Unknown names select STORK 1.0.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case(Self::EIDAS.name) {
            Self::EIDAS
        } else {
            if !name.trim().eq_ignore_ascii_case(Self::STORK1.name) {
                tracing::debug!(format = %name, "Unknown extension format, using stork1");
            }
            Self::STORK1
        }
    }
}

impl fmt::Display for SamlExtensionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Parses and generates the dialect-specific parts of protocol messages.
pub trait ExtensionProcessor: Send + Sync + fmt::Debug {
    /// Returns the dialect's format.
    fn format(&self) -> &'static SamlExtensionFormat;

    /// Returns the prefix of dialect-specific attribute name keys.
    fn name_prefix(&self) -> &'static str;

    /// Returns the attribute name URIs this dialect knows.
    fn supported_attributes(&self) -> BTreeSet<String>;

    /// Parses an `AuthnRequest` document, or a bare `Extensions` element.
    ///
    /// Header fields and the eIDAS authentication context are only present
    /// when a full request is given.
    fn process_extensions(&self, xml: &str) -> SamlResult<AuthnRequest>;

    /// Generates the `samlp:Extensions` element for a request.
    fn generate_extensions(&self, request: &AuthnRequest) -> SamlResult<String>;

    /// Generates the request elements that follow `Extensions`, such as
    /// `NameIDPolicy` and `RequestedAuthnContext`.
    fn generate_authn_context(&self, request: &AuthnRequest) -> SamlResult<String> {
        let _ = request;
        Ok(String::new())
    }

    /// Returns true if the raw request belongs to this dialect.
    fn is_valid_request(&self, xml: &str) -> bool;

    /// Generates a `saml2:Attribute` for a released attribute.
    fn generate_attribute(&self, attribute: &ResponseAttribute) -> SamlResult<String>;

    /// Returns the request validator suite ID.
    fn request_validator_suite_id(&self) -> &'static str;

    /// Returns the response validator suite ID.
    fn response_validator_suite_id(&self) -> &'static str;
}

/// Builds the processor for a core configuration.
#[must_use]
pub fn processor_for(core: &CoreProperties) -> Arc<dyn ExtensionProcessor> {
    match SamlExtensionFormat::from_name(&core.format).dialect {
        ProtocolDialect::Stork1 => Arc::new(StorkExtensionProcessor::new(core)),
        ProtocolDialect::Eidas => Arc::new(EidasExtensionProcessor::new(core)),
    }
}

/// Two-tier attribute name lookup.
#[derive(Debug, Clone, Default)]
pub struct NameResolver {
    prefix: &'static str,
    names: BTreeMap<String, String>,
}

impl NameResolver {
    /// Creates a resolver over a name table.
    #[must_use]
    pub fn new(prefix: &'static str, names: BTreeMap<String, String>) -> Self {
        Self { prefix, names }
    }

    /// Resolves a short name to its configured wire name.
    #[must_use]
    pub fn resolve(&self, short_name: &str) -> Option<&str> {
        let prefixed = (!self.prefix.is_empty())
            .then(|| self.names.get(&format!("{}.{short_name}", self.prefix)))
            .flatten();
        prefixed
            .or_else(|| self.names.get(short_name))
            .map(String::as_str)
            .filter(|name| !name.trim().is_empty())
    }
}

/// Options shared by attribute generation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AttributeOptions {
    pub include_friendly_name: bool,
    pub include_is_required: bool,
    pub hash_values: bool,
}

impl AttributeOptions {
    pub(crate) const fn from_core(core: &CoreProperties) -> Self {
        Self {
            include_friendly_name: core.include_friendly_name,
            include_is_required: core.include_is_required,
            hash_values: core.hash_attribute_values,
        }
    }
}

/// Returns the part of an attribute name after the last `/`.
#[must_use]
pub fn short_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Returns true if the value contains letters outside the Latin script.
#[must_use]
pub fn needs_transliteration(value: &str) -> bool {
    value
        .chars()
        .any(|c| c.is_alphabetic() && u32::from(c) > 0x024F && !(0x1E00..=0x1EFF).contains(&u32::from(c)))
}

/// Returns the `Extensions` element of a request, or the root if it is one.
pub(crate) fn extensions_of(root: &XmlElement) -> Option<&XmlElement> {
    if root.is(SAMLP_NS, "Extensions") {
        Some(root)
    } else {
        root.child(SAMLP_NS, "Extensions")
    }
}

/// Reads the `AuthnRequest` header attributes and issuer.
pub(crate) fn read_request_header(root: &XmlElement, request: &mut AuthnRequest) -> SamlResult<()> {
    if !root.is(SAMLP_NS, "AuthnRequest") {
        return Ok(());
    }
    request.id = root
        .attr("ID")
        .ok_or_else(|| SamlError::Message("AuthnRequest has no ID".to_string()))?
        .to_string();
    request.issuer = root
        .child_text(SAML_NS, "Issuer")
        .ok_or_else(|| SamlError::Message("AuthnRequest has no Issuer".to_string()))?
        .to_string();
    if let Some(instant) = root.attr("IssueInstant") {
        request.issue_instant = parse_instant(instant)?;
    }
    request.destination = root.attr("Destination").map(str::to_string);
    request.provider_name = root.attr("ProviderName").map(str::to_string);
    request.assertion_consumer_service_url =
        root.attr("AssertionConsumerServiceURL").map(str::to_string);
    request.protocol_binding = root.attr("ProtocolBinding").and_then(SamlBinding::from_uri);
    Ok(())
}

/// Parses an `xs:dateTime`.
pub(crate) fn parse_instant(value: &str) -> SamlResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| SamlError::Message(format!("invalid instant '{value}': {e}")))
}

/// Parses an empty request shell, then the header if `root` is a request.
pub(crate) fn new_request_from(root: &XmlElement) -> SamlResult<AuthnRequest> {
    let mut request = AuthnRequest::with_id(String::new(), String::new());
    read_request_header(root, &mut request)?;
    Ok(request)
}

/// Parses a `RequestedAttribute` element.
pub(crate) fn parse_requested_attribute(element: &XmlElement) -> SamlResult<RequestedAttribute> {
    let name = element
        .attr("Name")
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| SamlError::Message("RequestedAttribute has no Name".to_string()))?;
    Ok(RequestedAttribute {
        name: name.to_string(),
        friendly_name: element.attr("FriendlyName").map(str::to_string),
        required: element.attr("isRequired").is_some_and(parse_bool),
        values: element
            .children
            .iter()
            .filter(|c| c.local_name == "AttributeValue")
            .map(|c| c.text().to_string())
            .collect(),
    })
}

/// Renders a `RequestedAttribute` element.
pub(crate) fn render_requested_attribute(
    element_qname: &str,
    value_qname: &str,
    name: &str,
    attribute: &RequestedAttribute,
    options: AttributeOptions,
) -> String {
    let mut out = format!(
        r#"<{element_qname} Name="{}" NameFormat="{ATTRNAME_FORMAT_URI}""#,
        xml::escape(name)
    );
    if options.include_friendly_name {
        let friendly = attribute
            .friendly_name
            .as_deref()
            .unwrap_or_else(|| short_name(&attribute.name));
        out.push_str(&format!(r#" FriendlyName="{}""#, xml::escape(friendly)));
    }
    if options.include_is_required {
        out.push_str(&format!(r#" isRequired="{}""#, attribute.required));
    }
    if attribute.values.is_empty() {
        out.push_str("/>");
        return out;
    }
    out.push('>');
    for value in &attribute.values {
        out.push_str(&format!("<{value_qname}>{}</{value_qname}>", xml::escape(value)));
    }
    out.push_str(&format!("</{element_qname}>"));
    out
}

/// Renders a released attribute as `saml2:Attribute`.
///
/// The status is written as an `AttributeStatus` attribute in the
/// format's assertion namespace. Blank values are skipped.
pub(crate) fn generate_attribute_simple(
    format: &SamlExtensionFormat,
    definition: Option<&AttributeDefinition>,
    attribute: &ResponseAttribute,
    hash_values: bool,
) -> SamlResult<String> {
    if attribute.name.trim().is_empty() {
        return Err(SamlError::Message("attribute name is empty".to_string()));
    }
    let prefix = format.assertion_prefix;
    let mut out = format!(
        r#"<saml2:Attribute xmlns:{prefix}="{}" Name="{}" NameFormat="{ATTRNAME_FORMAT_URI}""#,
        format.assertion_ns,
        xml::escape(&attribute.name)
    );
    let friendly = attribute
        .friendly_name
        .as_deref()
        .or_else(|| definition.map(AttributeDefinition::friendly_name));
    if let Some(friendly) = friendly {
        out.push_str(&format!(r#" FriendlyName="{}""#, xml::escape(friendly)));
    }
    out.push_str(&format!(r#" {prefix}:AttributeStatus="{}">"#, attribute.status));

    for value in &attribute.values {
        if value.value().trim().is_empty() {
            continue;
        }
        let text = match definition {
            Some(d) => d.marshaller().marshal(value)?,
            None => value.value().clone(),
        };
        let text = if hash_values {
            base64::engine::general_purpose::STANDARD.encode(eidas_crypto::sha512(text.as_bytes()))
        } else {
            text
        };
        out.push_str("<saml2:AttributeValue");
        if let Some(d) = definition {
            let xml_type = d.xml_type();
            out.push_str(&format!(
                r#" xmlns:xsi="{XSI_NS}" xmlns:{}="{}" xsi:type="{}""#,
                xml_type.prefix,
                xml_type.namespace,
                xml_type.qualified()
            ));
        }
        if value.is_non_latin_script_alternate_version() || needs_transliteration(value.value()) {
            out.push_str(r#" LatinScript="false""#);
        }
        out.push_str(&format!(">{}</saml2:AttributeValue>", xml::escape(&text)));
    }
    out.push_str("</saml2:Attribute>");
    Ok(out)
}

/// Parses an `xs:boolean`.
pub(crate) fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "true" | "1")
}
