//! STORK 1.0 extensions.

use std::collections::BTreeSet;

use eidas_core::CoreProperties;

use super::{
    extensions_of, generate_attribute_simple, new_request_from, parse_bool,
    parse_requested_attribute, render_requested_attribute, short_name, AttributeOptions,
    ExtensionProcessor, NameResolver, SamlExtensionFormat,
};
use crate::error::{SamlError, SamlResult};
use crate::types::{stork, AuthnRequest, ResponseAttribute, SAMLP_NS};
use crate::xml::{self, XmlElement};

/// STORK 1.0 processor.
#[derive(Debug, Clone)]
pub struct StorkExtensionProcessor {
    resolver: NameResolver,
    options: AttributeOptions,
}

impl StorkExtensionProcessor {
    /// Creates a processor for an instance's core properties.
    #[must_use]
    pub fn new(core: &CoreProperties) -> Self {
        Self {
            resolver: NameResolver::new("", core.attributes.clone()),
            options: AttributeOptions::from_core(core),
        }
    }

    /// Finds an extension element in either STORK namespace.
    fn element<'a>(extensions: &'a XmlElement, local_name: &str) -> Option<&'a XmlElement> {
        extensions
            .find(stork::ASSERTION_NS, local_name)
            .or_else(|| extensions.find(stork::PROTOCOL_NS, local_name))
    }

    fn text_of<'a>(extensions: &'a XmlElement, local_name: &str) -> Option<&'a str> {
        Self::element(extensions, local_name)
            .map(XmlElement::text)
            .filter(|t| !t.is_empty())
    }
}

impl ExtensionProcessor for StorkExtensionProcessor {
    fn format(&self) -> &'static SamlExtensionFormat {
        &SamlExtensionFormat::STORK1
    }

    fn name_prefix(&self) -> &'static str {
        ""
    }

    fn supported_attributes(&self) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn process_extensions(&self, xml: &str) -> SamlResult<AuthnRequest> {
        let root = xml::parse(xml)?;
        let mut request = new_request_from(&root)?;
        let extensions = extensions_of(&root)
            .ok_or_else(|| SamlError::Message("request has no Extensions".to_string()))?;

        if let Some(qaa) = Self::text_of(extensions, "QualityAuthenticationAssuranceLevel") {
            let level = qaa
                .parse::<u8>()
                .map_err(|_| SamlError::Message(format!("invalid QAA level '{qaa}'")))?;
            request.stork.qaa = Some(level);
        }
        request.stork.sp_sector = Self::text_of(extensions, "spSector").map(str::to_string);
        request.stork.sp_application =
            Self::text_of(extensions, "spApplication").map(str::to_string);
        request.stork.sp_country = Self::text_of(extensions, "spCountry").map(str::to_string);
        if request.provider_name.is_none() {
            request.provider_name = Self::text_of(extensions, "spInstitution").map(str::to_string);
        }
        request.stork.eid_sector_share =
            Self::text_of(extensions, "eIDSectorShare").is_some_and(parse_bool);
        request.stork.eid_cross_sector_share =
            Self::text_of(extensions, "eIDCrossSectorShare").is_some_and(parse_bool);
        request.stork.eid_cross_border_share =
            Self::text_of(extensions, "eIDCrossBorderShare").is_some_and(parse_bool);
        request.citizen_country_code =
            Self::text_of(extensions, "CitizenCountryCode").map(str::to_string);
        request.stork.sp_id = Self::text_of(extensions, "SPID").map(str::to_string);

        let requested = Self::element(extensions, "RequestedAttributes")
            .ok_or_else(|| SamlError::Message("request has no RequestedAttributes".to_string()))?;
        for element in requested
            .children_named(stork::ASSERTION_NS, "RequestedAttribute")
            .chain(requested.children_named(stork::PROTOCOL_NS, "RequestedAttribute"))
        {
            let mut attribute = parse_requested_attribute(element)?;
            attribute.name = short_name(&attribute.name).to_string();
            request.requested_attributes.push(attribute);
        }
        Ok(request)
    }

    fn generate_extensions(&self, request: &AuthnRequest) -> SamlResult<String> {
        let props = &request.stork;
        let a = stork::ASSERTION_PREFIX;
        let p = stork::PROTOCOL_PREFIX;
        let mut out = format!(
            r#"<samlp:Extensions xmlns:samlp="{SAMLP_NS}" xmlns:{a}="{}" xmlns:{p}="{}">"#,
            stork::ASSERTION_NS,
            stork::PROTOCOL_NS
        );

        if let Some(qaa) = props.qaa {
            if !(1..=4).contains(&qaa) {
                return Err(SamlError::Message(format!("invalid QAA level {qaa}")));
            }
            out.push_str(&format!(
                "<{a}:QualityAuthenticationAssuranceLevel>{qaa}</{a}:QualityAuthenticationAssuranceLevel>"
            ));
        }
        if let Some(sector) = props.sp_sector.as_deref().filter(|s| !s.trim().is_empty()) {
            out.push_str(&format!("<{a}:spSector>{}</{a}:spSector>", xml::escape(sector)));
        }
        if let Some(institution) = request.provider_name.as_deref() {
            out.push_str(&format!(
                "<{a}:spInstitution>{}</{a}:spInstitution>",
                xml::escape(institution)
            ));
        }
        if let Some(application) = props.sp_application.as_deref() {
            out.push_str(&format!(
                "<{a}:spApplication>{}</{a}:spApplication>",
                xml::escape(application)
            ));
        }
        if let Some(country) = props.sp_country.as_deref() {
            out.push_str(&format!("<{a}:spCountry>{}</{a}:spCountry>", xml::escape(country)));
        }
        out.push_str(&format!(
            "<{p}:eIDSectorShare>{}</{p}:eIDSectorShare>\
             <{p}:eIDCrossSectorShare>{}</{p}:eIDCrossSectorShare>\
             <{p}:eIDCrossBorderShare>{}</{p}:eIDCrossBorderShare>",
            props.eid_sector_share, props.eid_cross_sector_share, props.eid_cross_border_share
        ));

        out.push_str(&format!("<{p}:RequestedAttributes>"));
        for attribute in &request.requested_attributes {
            let short = short_name(&attribute.name);
            if short.trim().is_empty() {
                return Err(SamlError::Message("attribute name is empty".to_string()));
            }
            let name = self
                .resolver
                .resolve(short)
                .ok_or_else(|| SamlError::Message(format!("Attribute name: {short} was not found.")))?;
            out.push_str(&render_requested_attribute(
                &format!("{a}:RequestedAttribute"),
                &format!("{a}:AttributeValue"),
                name,
                attribute,
                self.options,
            ));
        }
        out.push_str(&format!("</{p}:RequestedAttributes>"));

        out.push_str(&format!("<{p}:AuthenticationAttributes>"));
        if request.citizen_country_code.is_some() || props.sp_id.is_some() {
            out.push_str(&format!("<{p}:VIDPAuthenticationAttributes>"));
            if let Some(country) = request.citizen_country_code.as_deref() {
                out.push_str(&format!(
                    "<{p}:CitizenCountryCode>{}</{p}:CitizenCountryCode>",
                    xml::escape(&country.to_uppercase())
                ));
            }
            if let Some(sp_id) = props.sp_id.as_deref() {
                out.push_str(&format!(
                    "<{p}:SPInformation><{p}:SPID>{}</{p}:SPID></{p}:SPInformation>",
                    xml::escape(&sp_id.to_uppercase())
                ));
            }
            out.push_str(&format!("</{p}:VIDPAuthenticationAttributes>"));
        }
        out.push_str(&format!("</{p}:AuthenticationAttributes>"));

        out.push_str("</samlp:Extensions>");
        Ok(out)
    }

    fn is_valid_request(&self, xml: &str) -> bool {
        self.process_extensions(xml).is_ok()
    }

    fn generate_attribute(&self, attribute: &ResponseAttribute) -> SamlResult<String> {
        generate_attribute_simple(self.format(), None, attribute, self.options.hash_values)
    }

    fn request_validator_suite_id(&self) -> &'static str {
        stork::REQUEST_VALIDATOR_SUITE_ID
    }

    fn response_validator_suite_id(&self) -> &'static str {
        stork::RESPONSE_VALIDATOR_SUITE_ID
    }
}
