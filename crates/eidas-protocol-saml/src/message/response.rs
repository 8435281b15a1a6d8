//! `samlp:Response` documents.

use chrono::{DateTime, Duration, Utc};

use super::{format_instant, CONSENT_UNSPECIFIED, ENTITY_FORMAT};
use crate::attribute::{AttributeStatus, AttributeValue};
use crate::error::{SamlError, SamlResult};
use crate::extensions::{parse_instant, ExtensionProcessor};
use crate::types::{
    AuthnResponse, LevelOfAssurance, NameIdFormat, ResponseAttribute, Status, SAMLP_NS, SAML_NS,
    SAML_VERSION,
};
use crate::xml::{self, XmlElement};

const BEARER: &str = "urn:oasis:names:tc:SAML:2.0:cm:bearer";
const UNSPECIFIED_CONTEXT: &str = "urn:oasis:names:tc:SAML:2.0:ac:classes:unspecified";

/// Assertion parameters that are not part of the response model.
#[derive(Debug, Clone)]
pub struct ResponseParams<'a> {
    /// Audience restriction, usually the request issuer.
    pub audience: &'a str,
    /// Subject name ID format.
    pub name_id_format: NameIdFormat,
    /// How long the assertion is valid.
    pub validity: Duration,
}

impl<'a> ResponseParams<'a> {
    /// Five minute validity with a persistent name ID.
    #[must_use]
    pub fn new(audience: &'a str) -> Self {
        Self {
            audience,
            name_id_format: NameIdFormat::Persistent,
            validity: Duration::minutes(5),
        }
    }
}

/// Validity window and audience of an assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertionConditions {
    /// `NotBefore`.
    pub not_before: Option<DateTime<Utc>>,
    /// `NotOnOrAfter`.
    pub not_on_or_after: Option<DateTime<Utc>>,
    /// Audiences.
    pub audiences: Vec<String>,
}

impl AssertionConditions {
    /// Returns true if `now` is inside the window, allowing `skew`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>, skew: Duration) -> bool {
        self.not_before.map_or(true, |nb| now + skew >= nb)
            && self.not_on_or_after.map_or(true, |na| now - skew < na)
    }
}

fn issuer_element(issuer: &str) -> String {
    format!(
        r#"<saml2:Issuer Format="{ENTITY_FORMAT}">{}</saml2:Issuer>"#,
        xml::escape(issuer)
    )
}

fn status_element(status: &Status) -> String {
    let mut out = format!(
        r#"<samlp:Status><samlp:StatusCode Value="{}">"#,
        xml::escape(&status.status_code)
    );
    if let Some(sub) = &status.sub_status_code {
        out.push_str(&format!(r#"<samlp:StatusCode Value="{}"/>"#, xml::escape(sub)));
    }
    out.push_str("</samlp:StatusCode>");
    if let Some(message) = &status.status_message {
        out.push_str(&format!(
            "<samlp:StatusMessage>{}</samlp:StatusMessage>",
            xml::escape(message)
        ));
    }
    out.push_str("</samlp:Status>");
    out
}

fn response_open(response: &AuthnResponse) -> String {
    let mut out = format!(
        r#"<samlp:Response xmlns:samlp="{SAMLP_NS}" xmlns:saml2="{SAML_NS}" ID="{}" InResponseTo="{}" Version="{SAML_VERSION}" IssueInstant="{}" Consent="{CONSENT_UNSPECIFIED}""#,
        xml::escape(&response.id),
        xml::escape(&response.in_response_to),
        format_instant(response.issue_instant)
    );
    if let Some(destination) = &response.destination {
        out.push_str(&format!(r#" Destination="{}""#, xml::escape(destination)));
    }
    out.push('>');
    out
}

/// Builds an unsigned response carrying one assertion.
///
/// Failure responses carry the status only.
pub fn build_response(
    processor: &dyn ExtensionProcessor,
    response: &AuthnResponse,
    params: &ResponseParams<'_>,
) -> SamlResult<String> {
    if !response.is_success() {
        return Ok(build_error_response(response));
    }
    let subject = response
        .subject
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| SamlError::Message("successful response has no subject".to_string()))?;

    let issued = format_instant(response.issue_instant);
    let expires = format_instant(response.issue_instant + params.validity);
    let recipient = response.destination.as_deref().unwrap_or_default();
    let class_ref = response
        .level_of_assurance
        .map_or(UNSPECIFIED_CONTEXT, LevelOfAssurance::uri);

    let mut attributes = String::new();
    for attribute in &response.attributes {
        attributes.push_str(&processor.generate_attribute(attribute)?);
    }

    let assertion = format!(
        r#"<saml2:Assertion ID="{assertion_id}" Version="{SAML_VERSION}" IssueInstant="{issued}">{issuer}<saml2:Subject><saml2:NameID Format="{format}">{subject}</saml2:NameID><saml2:SubjectConfirmation Method="{BEARER}"><saml2:SubjectConfirmationData InResponseTo="{in_response_to}" NotOnOrAfter="{expires}" Recipient="{recipient}"/></saml2:SubjectConfirmation></saml2:Subject><saml2:Conditions NotBefore="{issued}" NotOnOrAfter="{expires}"><saml2:AudienceRestriction><saml2:Audience>{audience}</saml2:Audience></saml2:AudienceRestriction></saml2:Conditions><saml2:AuthnStatement AuthnInstant="{issued}"><saml2:AuthnContext><saml2:AuthnContextClassRef>{class_ref}</saml2:AuthnContextClassRef></saml2:AuthnContext></saml2:AuthnStatement><saml2:AttributeStatement>{attributes}</saml2:AttributeStatement></saml2:Assertion>"#,
        assertion_id = eidas_crypto::random::generate_message_id(),
        issuer = issuer_element(&response.issuer),
        format = params.name_id_format.uri(),
        subject = xml::escape(subject),
        in_response_to = xml::escape(&response.in_response_to),
        recipient = xml::escape(recipient),
        audience = xml::escape(params.audience),
    );

    Ok(format!(
        "{}{}{}{assertion}</samlp:Response>",
        response_open(response),
        issuer_element(&response.issuer),
        status_element(&response.status)
    ))
}

/// Builds a response with a status and no assertion.
#[must_use]
pub fn build_error_response(response: &AuthnResponse) -> String {
    format!(
        "{}{}{}</samlp:Response>",
        response_open(response),
        issuer_element(&response.issuer),
        status_element(&response.status)
    )
}

fn parse_status(root: &XmlElement) -> SamlResult<Status> {
    let status = root
        .child(SAMLP_NS, "Status")
        .ok_or_else(|| SamlError::Message("response has no Status".to_string()))?;
    let code = status
        .child(SAMLP_NS, "StatusCode")
        .ok_or_else(|| SamlError::Message("response has no StatusCode".to_string()))?;
    Ok(Status {
        status_code: code
            .attr("Value")
            .ok_or_else(|| SamlError::Message("StatusCode has no Value".to_string()))?
            .to_string(),
        sub_status_code: code
            .child(SAMLP_NS, "StatusCode")
            .and_then(|c| c.attr("Value"))
            .map(str::to_string),
        status_message: status
            .child_text(SAMLP_NS, "StatusMessage")
            .map(str::to_string),
    })
}

fn parse_attribute(element: &XmlElement) -> SamlResult<ResponseAttribute> {
    let name = element
        .attr("Name")
        .ok_or_else(|| SamlError::Message("Attribute has no Name".to_string()))?;
    let status = element
        .attributes
        .iter()
        .find(|a| a.namespace.is_some() && a.local_name == "AttributeStatus")
        .and_then(|a| AttributeStatus::parse(&a.value))
        .unwrap_or_default();
    let values = element
        .children_named(SAML_NS, "AttributeValue")
        .map(|v| {
            let value = v.text().to_string();
            if v.attr("LatinScript") == Some("false") {
                AttributeValue::non_latin(value)
            } else {
                AttributeValue::new(value)
            }
        })
        .collect();
    Ok(ResponseAttribute {
        name: name.to_string(),
        friendly_name: element.attr("FriendlyName").map(str::to_string),
        status,
        values,
    })
}

/// Parses a response document with plaintext assertions.
pub fn parse_response(xml: &str) -> SamlResult<AuthnResponse> {
    let root = xml::parse(xml)?;
    if !root.is(SAMLP_NS, "Response") {
        return Err(SamlError::Message(format!(
            "expected samlp:Response, found {}",
            root.qname
        )));
    }
    let issuer = root
        .child_text(SAML_NS, "Issuer")
        .ok_or_else(|| SamlError::Message("response has no Issuer".to_string()))?;

    let mut response = AuthnResponse {
        id: root
            .attr("ID")
            .ok_or_else(|| SamlError::Message("response has no ID".to_string()))?
            .to_string(),
        in_response_to: root.attr("InResponseTo").unwrap_or_default().to_string(),
        issuer: issuer.to_string(),
        destination: root.attr("Destination").map(str::to_string),
        issue_instant: match root.attr("IssueInstant") {
            Some(instant) => parse_instant(instant)?,
            None => Utc::now(),
        },
        status: parse_status(&root)?,
        subject: None,
        level_of_assurance: None,
        attributes: Vec::new(),
        encrypted: false,
    };

    if root.child(SAML_NS, "EncryptedAssertion").is_some() {
        return Err(SamlError::Message(
            "response carries an encrypted assertion".to_string(),
        ));
    }

    if let Some(assertion) = root.child(SAML_NS, "Assertion") {
        response.subject = assertion
            .find(SAML_NS, "NameID")
            .map(|n| n.text().to_string());
        response.level_of_assurance = assertion
            .find(SAML_NS, "AuthnContextClassRef")
            .and_then(|c| LevelOfAssurance::from_uri(c.text()));
        if let Some(statement) = assertion.child(SAML_NS, "AttributeStatement") {
            for element in statement.children_named(SAML_NS, "Attribute") {
                response.attributes.push(parse_attribute(element)?);
            }
        }
    }
    Ok(response)
}

/// Reads the `Conditions` of the first assertion, if any.
pub fn read_conditions(xml: &str) -> SamlResult<Option<AssertionConditions>> {
    let root = xml::parse(xml)?;
    let Some(conditions) = root
        .child(SAML_NS, "Assertion")
        .and_then(|a| a.child(SAML_NS, "Conditions"))
    else {
        return Ok(None);
    };
    Ok(Some(AssertionConditions {
        not_before: conditions.attr("NotBefore").map(parse_instant).transpose()?,
        not_on_or_after: conditions
            .attr("NotOnOrAfter")
            .map(parse_instant)
            .transpose()?,
        audiences: conditions
            .find_all(SAML_NS, "Audience")
            .iter()
            .map(|a| a.text().to_string())
            .collect(),
    }))
}

#[cfg(test)]
mod tests {
    use eidas_core::CoreProperties;

    use super::*;
    use crate::extensions::EidasExtensionProcessor;
    use crate::types::{status_codes, sub_status_codes};

    const FAMILY_NAME: &str = "http://eidas.europa.eu/attributes/naturalperson/CurrentFamilyName";

    fn response() -> AuthnResponse {
        AuthnResponse::success("_req", "https://idp.example.be/metadata", "BE/ES/123")
            .with_destination("https://sp.example.eu/acs")
            .with_loa(LevelOfAssurance::Substantial)
            .with_attribute(
                ResponseAttribute::new(FAMILY_NAME, "Garcia")
                    .with_value(AttributeValue::non_latin("Γκαρσία".to_string())),
            )
    }

    #[test]
    fn success_response_round_trip() {
        let processor = EidasExtensionProcessor::new(&CoreProperties::default());
        let original = response();
        let xml = build_response(
            &processor,
            &original,
            &ResponseParams::new("https://sp.example.eu/metadata"),
        )
        .unwrap();
        let parsed = parse_response(&xml).unwrap();

        assert!(parsed.is_success());
        assert_eq!(parsed.id, original.id);
        assert_eq!(parsed.in_response_to, "_req");
        assert_eq!(parsed.subject.as_deref(), Some("BE/ES/123"));
        assert_eq!(parsed.level_of_assurance, Some(LevelOfAssurance::Substantial));
        let attribute = parsed.attribute(FAMILY_NAME).unwrap();
        assert_eq!(attribute.friendly_name.as_deref(), Some("CurrentFamilyName"));
        assert_eq!(attribute.values, original.attributes[0].values);

        let conditions = read_conditions(&xml).unwrap().unwrap();
        assert_eq!(conditions.audiences, vec!["https://sp.example.eu/metadata".to_string()]);
        assert!(conditions.is_valid_at(original.issue_instant, Duration::zero()));
        assert!(!conditions.is_valid_at(
            original.issue_instant + Duration::minutes(6),
            Duration::seconds(30)
        ));
    }

    #[test]
    fn error_response_has_no_assertion() {
        let mut failed = response();
        failed.status = Status::failure(
            status_codes::REQUESTER,
            Some(sub_status_codes::REQUEST_DENIED),
            "202007",
        );
        let processor = EidasExtensionProcessor::new(&CoreProperties::default());
        let xml = build_response(&processor, &failed, &ResponseParams::new("aud")).unwrap();
        assert!(!xml.contains("Assertion"));

        let parsed = parse_response(&xml).unwrap();
        assert!(!parsed.is_success());
        assert_eq!(parsed.status, failed.status);
        assert!(parsed.subject.is_none());
        assert!(read_conditions(&xml).unwrap().is_none());
    }

    #[test]
    fn success_requires_subject() {
        let mut anonymous = response();
        anonymous.subject = None;
        let processor = EidasExtensionProcessor::new(&CoreProperties::default());
        assert!(build_response(&processor, &anonymous, &ResponseParams::new("aud")).is_err());
    }

    #[test]
    fn rejects_other_documents() {
        assert!(parse_response(&format!(r#"<samlp:AuthnRequest xmlns:samlp="{SAMLP_NS}"/>"#)).is_err());
    }
}
