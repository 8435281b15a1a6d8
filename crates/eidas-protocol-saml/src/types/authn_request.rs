//! Protocol-neutral authentication request.
//!
//! Both dialects parse into and generate from the same [`AuthnRequest`].
//! Fields that only one dialect carries are optional; the STORK-only ones
//! are grouped in [`StorkProperties`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{LevelOfAssurance, LoaComparison, NameIdFormat, SamlBinding};

/// Service provider sector declared in `eidas:SPType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpType {
    /// Public sector body.
    Public,
    /// Private sector body.
    Private,
}

impl SpType {
    /// Returns the wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    /// Parses the wire value. Blank values are treated as absent.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            _ => None,
        }
    }
}

impl fmt::Display for SpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An attribute requested by the service provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAttribute {
    /// Attribute name: the full URI for eIDAS, the short name for STORK.
    pub name: String,

    /// Friendly name, when sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// Whether the attribute is mandatory.
    #[serde(default)]
    pub required: bool,

    /// Requested values, if the SP constrains them.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

impl RequestedAttribute {
    /// Creates a requested attribute without values.
    #[must_use]
    pub fn new(name: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            friendly_name: None,
            required,
            values: Vec::new(),
        }
    }

    /// Sets the friendly name.
    #[must_use]
    pub fn with_friendly_name(mut self, friendly_name: impl Into<String>) -> Self {
        self.friendly_name = Some(friendly_name.into());
        self
    }

    /// Adds a requested value.
    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.values.push(value.into());
        self
    }
}

/// STORK 1.0 request properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorkProperties {
    /// Quality authentication assurance level, 1 to 4.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qaa: Option<u8>,

    /// SP sector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_sector: Option<String>,

    /// SP application.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_application: Option<String>,

    /// SP country.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_country: Option<String>,

    /// SP identifier sent in `SPInformation/SPID`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_id: Option<String>,

    /// `eIDSectorShare`.
    #[serde(default)]
    pub eid_sector_share: bool,

    /// `eIDCrossSectorShare`.
    #[serde(default)]
    pub eid_cross_sector_share: bool,

    /// `eIDCrossBorderShare`.
    #[serde(default)]
    pub eid_cross_border_share: bool,
}

/// Authentication request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthnRequest {
    /// SAML message ID.
    pub id: String,

    /// Timestamp when this request was issued.
    pub issue_instant: DateTime<Utc>,

    /// Issuer, the requester's metadata URL.
    pub issuer: String,

    /// Where the request is sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// Provider name (STORK `spInstitution`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_name: Option<String>,

    /// Where the response must be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_consumer_service_url: Option<String>,

    /// Binding requested for the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol_binding: Option<SamlBinding>,

    /// Country of the citizen being authenticated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citizen_country_code: Option<String>,

    /// Requested level of assurance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_of_assurance: Option<LevelOfAssurance>,

    /// How the level of assurance is compared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loa_comparison: Option<LoaComparison>,

    /// SP type declared in the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sp_type: Option<SpType>,

    /// Requested name ID format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_id_format: Option<NameIdFormat>,

    /// Requested attributes, in request order.
    #[serde(default)]
    pub requested_attributes: Vec<RequestedAttribute>,

    /// STORK-only properties.
    #[serde(default)]
    pub stork: StorkProperties,
}

impl AuthnRequest {
    /// Creates a request with a fresh message ID.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self::with_id(eidas_crypto::random::generate_message_id(), issuer)
    }

    /// Creates a request with a given message ID.
    #[must_use]
    pub fn with_id(id: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            issue_instant: Utc::now(),
            issuer: issuer.into(),
            destination: None,
            provider_name: None,
            assertion_consumer_service_url: None,
            protocol_binding: None,
            citizen_country_code: None,
            level_of_assurance: None,
            loa_comparison: None,
            sp_type: None,
            name_id_format: None,
            requested_attributes: Vec::new(),
            stork: StorkProperties::default(),
        }
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Sets the assertion consumer service URL.
    #[must_use]
    pub fn with_acs_url(mut self, url: impl Into<String>) -> Self {
        self.assertion_consumer_service_url = Some(url.into());
        self
    }

    /// Sets the citizen country code.
    #[must_use]
    pub fn with_citizen_country(mut self, country: impl Into<String>) -> Self {
        self.citizen_country_code = Some(country.into());
        self
    }

    /// Sets the requested level of assurance and its comparison.
    #[must_use]
    pub const fn with_loa(mut self, loa: LevelOfAssurance, comparison: LoaComparison) -> Self {
        self.level_of_assurance = Some(loa);
        self.loa_comparison = Some(comparison);
        self
    }

    /// Sets the SP type.
    #[must_use]
    pub const fn with_sp_type(mut self, sp_type: SpType) -> Self {
        self.sp_type = Some(sp_type);
        self
    }

    /// Adds a requested attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: RequestedAttribute) -> Self {
        self.requested_attributes.push(attribute);
        self
    }

    /// Returns the citizen country code, or an empty string.
    #[must_use]
    pub fn country(&self) -> &str {
        self.citizen_country_code.as_deref().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let request = AuthnRequest::new("https://sp.example.eu/metadata")
            .with_citizen_country("BE")
            .with_loa(LevelOfAssurance::Substantial, LoaComparison::Minimum)
            .with_sp_type(SpType::Public)
            .with_attribute(RequestedAttribute::new(
                "http://eidas.europa.eu/attributes/naturalperson/PersonIdentifier",
                true,
            ));

        assert!(request.id.starts_with('_'));
        assert_eq!(request.country(), "BE");
        assert_eq!(request.level_of_assurance, Some(LevelOfAssurance::Substantial));
        assert_eq!(request.requested_attributes.len(), 1);
    }

    #[test]
    fn sp_type_values() {
        assert_eq!(SpType::parse(" public "), Some(SpType::Public));
        assert_eq!(SpType::parse(""), None);
        assert_eq!(SpType::Private.to_string(), "private");
    }
}
