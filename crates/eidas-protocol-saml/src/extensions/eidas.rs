//! eIDAS 1.0 extensions.

use std::collections::BTreeSet;

use eidas_core::CoreProperties;

use super::{
    extensions_of, generate_attribute_simple, new_request_from, parse_requested_attribute,
    render_requested_attribute, short_name, AttributeOptions, ExtensionProcessor, NameResolver,
    SamlExtensionFormat,
};
use crate::attribute::AttributeRegistry;
use crate::error::{EidasErrorKey, SamlError, SamlResult};
use crate::types::{
    eidas, AuthnRequest, LevelOfAssurance, LoaComparison, NameIdFormat, RequestedAttribute,
    ResponseAttribute, SpType, SAMLP_NS, SAML_NS,
};
use crate::xml::{self, XmlElement};

/// eIDAS 1.0 processor.
#[derive(Debug, Clone)]
pub struct EidasExtensionProcessor {
    resolver: NameResolver,
    registry: AttributeRegistry,
    options: AttributeOptions,
}

impl EidasExtensionProcessor {
    /// Creates a processor for an instance's core properties.
    #[must_use]
    pub fn new(core: &CoreProperties) -> Self {
        Self {
            resolver: NameResolver::new(eidas::EXTENSIONS_PREFIX, core.attributes.clone()),
            registry: AttributeRegistry::eidas(),
            options: AttributeOptions::from_core(core),
        }
    }

    /// Returns the attribute registry.
    #[must_use]
    pub const fn registry(&self) -> &AttributeRegistry {
        &self.registry
    }

    /// Resolves a requested attribute to its wire name.
    ///
    /// Full URIs pass through. Short names go through the configured table,
    /// then the registry's friendly names.
    fn wire_name<'a>(&'a self, attribute: &'a RequestedAttribute) -> SamlResult<&'a str> {
        let name = attribute.name.trim();
        if name.is_empty() {
            return Err(SamlError::Message("attribute name is empty".to_string()));
        }
        if name.contains(':') {
            return Ok(name);
        }
        self.resolver
            .resolve(name)
            .or_else(|| self.registry.get_by_friendly_name(name).map(|d| d.name_uri()))
            .ok_or_else(|| SamlError::Message(format!("Attribute name: {name} was not found.")))
    }

    fn read_authn_context(root: &XmlElement, request: &mut AuthnRequest) -> SamlResult<()> {
        if let Some(policy) = root.child(SAMLP_NS, "NameIDPolicy") {
            request.name_id_format = policy.attr("Format").and_then(NameIdFormat::from_uri);
        }
        let Some(context) = root.child(SAMLP_NS, "RequestedAuthnContext") else {
            return Ok(());
        };
        let Some(class_ref) = context.child_text(SAML_NS, "AuthnContextClassRef") else {
            return Ok(());
        };
        let comparison = context.attr("Comparison").unwrap_or_default();
        request.loa_comparison = Some(LoaComparison::parse(comparison).ok_or_else(|| {
            SamlError::invalid_saml(
                EidasErrorKey::InvalidLoaValue,
                format!("invalid LoA comparison '{comparison}'"),
            )
        })?);
        request.level_of_assurance = Some(class_ref.parse::<LevelOfAssurance>()?);
        Ok(())
    }
}

impl ExtensionProcessor for EidasExtensionProcessor {
    fn format(&self) -> &'static SamlExtensionFormat {
        &SamlExtensionFormat::EIDAS
    }

    fn name_prefix(&self) -> &'static str {
        eidas::EXTENSIONS_PREFIX
    }

    fn supported_attributes(&self) -> BTreeSet<String> {
        self.registry
            .names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn process_extensions(&self, xml: &str) -> SamlResult<AuthnRequest> {
        let root = xml::parse(xml)?;
        let mut request = new_request_from(&root)?;
        Self::read_authn_context(&root, &mut request)?;

        let extensions = extensions_of(&root)
            .ok_or_else(|| SamlError::Message("request has no Extensions".to_string()))?;

        if let Some(sp_type) = extensions
            .child(eidas::EXTENSIONS_NS, "SPType")
            .map(XmlElement::text)
            .filter(|t| !t.is_empty())
        {
            request.sp_type = Some(
                SpType::parse(sp_type)
                    .ok_or_else(|| SamlError::Message(format!("invalid SPType '{sp_type}'")))?,
            );
        }

        let requested = extensions
            .child(eidas::EXTENSIONS_NS, "RequestedAttributes")
            .ok_or_else(|| SamlError::Message("request has no RequestedAttributes".to_string()))?;
        for element in requested.children_named(eidas::EXTENSIONS_NS, "RequestedAttribute") {
            request
                .requested_attributes
                .push(parse_requested_attribute(element)?);
        }
        Ok(request)
    }

    fn generate_extensions(&self, request: &AuthnRequest) -> SamlResult<String> {
        let e = eidas::EXTENSIONS_PREFIX;
        let mut out = format!(
            r#"<samlp:Extensions xmlns:samlp="{SAMLP_NS}" xmlns:{e}="{}">"#,
            eidas::EXTENSIONS_NS
        );
        if let Some(sp_type) = request.sp_type {
            out.push_str(&format!("<{e}:SPType>{sp_type}</{e}:SPType>"));
        }
        out.push_str(&format!("<{e}:RequestedAttributes>"));
        for attribute in &request.requested_attributes {
            let name = self.wire_name(attribute)?;
            let mut attribute = attribute.clone();
            if attribute.friendly_name.is_none() {
                attribute.friendly_name = Some(
                    self.registry
                        .get_by_name(name)
                        .map_or_else(|| short_name(name), |d| d.friendly_name())
                        .to_string(),
                );
            }
            out.push_str(&render_requested_attribute(
                &format!("{e}:RequestedAttribute"),
                &format!("{e}:AttributeValue"),
                name,
                &attribute,
                self.options,
            ));
        }
        out.push_str(&format!("</{e}:RequestedAttributes></samlp:Extensions>"));
        Ok(out)
    }

    fn generate_authn_context(&self, request: &AuthnRequest) -> SamlResult<String> {
        let mut out = String::new();
        if let Some(format) = request.name_id_format {
            out.push_str(&format!(
                r#"<samlp:NameIDPolicy AllowCreate="true" Format="{}"/>"#,
                format.uri()
            ));
        }
        if let Some(loa) = request.level_of_assurance {
            let comparison = request.loa_comparison.unwrap_or_default();
            out.push_str(&format!(
                r#"<samlp:RequestedAuthnContext Comparison="{}"><saml2:AuthnContextClassRef>{}</saml2:AuthnContextClassRef></samlp:RequestedAuthnContext>"#,
                comparison.as_str(),
                loa.uri()
            ));
        }
        Ok(out)
    }

    fn is_valid_request(&self, xml: &str) -> bool {
        let Ok(root) = xml::parse(xml) else {
            return false;
        };
        let has_sp_type = extensions_of(&root)
            .and_then(|e| e.child(eidas::EXTENSIONS_NS, "SPType"))
            .is_some_and(|t| !t.text().is_empty());
        has_sp_type
            || root
                .find_all(SAML_NS, "AuthnContextClassRef")
                .iter()
                .any(|r| r.text().to_lowercase().starts_with(eidas::LOA_START))
    }

    fn generate_attribute(&self, attribute: &ResponseAttribute) -> SamlResult<String> {
        generate_attribute_simple(
            self.format(),
            self.registry.get_by_name(&attribute.name),
            attribute,
            self.options.hash_values,
        )
    }

    fn request_validator_suite_id(&self) -> &'static str {
        eidas::REQUEST_VALIDATOR_SUITE_ID
    }

    fn response_validator_suite_id(&self) -> &'static str {
        eidas::RESPONSE_VALIDATOR_SUITE_ID
    }
}
