//! Authentication response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{status_codes, LevelOfAssurance};
use crate::attribute::{AttributeStatus, AttributeValue};

/// SAML protocol status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Top-level status code.
    pub status_code: String,

    /// Second-level status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_status_code: Option<String>,

    /// Status message, usually an error code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

impl Status {
    /// Creates a success status.
    #[must_use]
    pub fn success() -> Self {
        Self {
            status_code: status_codes::SUCCESS.to_string(),
            sub_status_code: None,
            status_message: None,
        }
    }

    /// Creates a failure status.
    #[must_use]
    pub fn failure(
        status_code: impl Into<String>,
        sub_status_code: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status_code: status_code.into(),
            sub_status_code: sub_status_code.map(str::to_string),
            status_message: Some(message.into()),
        }
    }

    /// Returns true if this status indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status_code == status_codes::SUCCESS
    }
}

/// An attribute released in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseAttribute {
    /// Full attribute name URI.
    pub name: String,

    /// Friendly name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,

    /// Availability of the attribute.
    pub status: AttributeStatus,

    /// Values; non-Latin alternates are flagged.
    #[serde(default)]
    pub values: Vec<AttributeValue<String>>,
}

impl ResponseAttribute {
    /// Creates an available attribute with one value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            friendly_name: None,
            status: AttributeStatus::Available,
            values: vec![AttributeValue::new(value.into())],
        }
    }

    /// Adds a value.
    #[must_use]
    pub fn with_value(mut self, value: AttributeValue<String>) -> Self {
        self.values.push(value);
        self
    }

    /// Returns the first Latin-script value.
    #[must_use]
    pub fn first_value(&self) -> Option<&str> {
        self.values
            .iter()
            .find(|v| !v.is_non_latin_script_alternate_version())
            .map(|v| v.value().as_str())
    }
}

/// Authentication response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthnResponse {
    /// Response ID.
    pub id: String,

    /// ID of the request this answers.
    pub in_response_to: String,

    /// Issuer of the response.
    pub issuer: String,

    /// Where the response is delivered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,

    /// When the response was issued.
    pub issue_instant: DateTime<Utc>,

    /// Status.
    pub status: Status,

    /// Subject name ID, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Level of assurance the citizen was authenticated at.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_of_assurance: Option<LevelOfAssurance>,

    /// Released attributes.
    #[serde(default)]
    pub attributes: Vec<ResponseAttribute>,

    /// Whether the response carried an encrypted assertion.
    #[serde(default)]
    pub encrypted: bool,
}

impl AuthnResponse {
    /// Creates a successful response.
    #[must_use]
    pub fn success(
        in_response_to: impl Into<String>,
        issuer: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            id: eidas_crypto::random::generate_message_id(),
            in_response_to: in_response_to.into(),
            issuer: issuer.into(),
            destination: None,
            issue_instant: Utc::now(),
            status: Status::success(),
            subject: Some(subject.into()),
            level_of_assurance: None,
            attributes: Vec::new(),
            encrypted: false,
        }
    }

    /// Sets the destination.
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Sets the level of assurance.
    #[must_use]
    pub const fn with_loa(mut self, loa: LevelOfAssurance) -> Self {
        self.level_of_assurance = Some(loa);
        self
    }

    /// Adds an attribute.
    #[must_use]
    pub fn with_attribute(mut self, attribute: ResponseAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Looks up an attribute by full name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&ResponseAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Returns true if the status is success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_response() {
        let response = AuthnResponse::success("_req", "https://node.example.eu/metadata", "BE/ES/1")
            .with_attribute(
                ResponseAttribute::new("urn:x:FamilyName", "Garcia")
                    .with_value(AttributeValue::non_latin("Γκαρσία".to_string())),
            );

        assert!(response.is_success());
        let attribute = response.attribute("urn:x:FamilyName").unwrap();
        assert_eq!(attribute.first_value(), Some("Garcia"));
        assert_eq!(attribute.values.len(), 2);
    }

    #[test]
    fn failure_status() {
        let status = Status::failure(status_codes::REQUESTER, None, "missing.sptype");
        assert!(!status.is_success());
        assert_eq!(status.status_message.as_deref(), Some("missing.sptype"));
    }
}
