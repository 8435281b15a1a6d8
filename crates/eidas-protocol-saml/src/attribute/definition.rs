//! Attribute definitions and value marshallers.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;

use super::AttributeValue;
use crate::error::{SamlError, SamlResult};

/// Whether an attribute describes a natural or a legal person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersonType {
    /// Natural person.
    NaturalPerson,
    /// Legal person.
    LegalPerson,
}

impl PersonType {
    /// Returns the path segment used in attribute names.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NaturalPerson => "naturalperson",
            Self::LegalPerson => "legalperson",
        }
    }

    /// Parses the path segment, ignoring case.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.eq_ignore_ascii_case("naturalperson") {
            Some(Self::NaturalPerson)
        } else if value.eq_ignore_ascii_case("legalperson") {
            Some(Self::LegalPerson)
        } else {
            None
        }
    }
}

/// Qualified XML schema type of an attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct XmlType {
    /// Namespace URI.
    pub namespace: String,
    /// Local type name.
    pub local_name: String,
    /// Preferred prefix.
    pub prefix: String,
}

impl XmlType {
    /// Creates a type.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        local_name: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            local_name: local_name.into(),
            prefix: prefix.into(),
        }
    }

    /// Returns `prefix:local_name`.
    #[must_use]
    pub fn qualified(&self) -> String {
        format!("{}:{}", self.prefix, self.local_name)
    }
}

/// Converts attribute values to and from their wire form.
pub trait AttributeValueMarshaller: Send + Sync + fmt::Debug {
    /// Renders a value for the wire.
    fn marshal(&self, value: &AttributeValue<String>) -> SamlResult<String>;

    /// Parses a wire value.
    fn unmarshal(&self, value: &str, non_latin: bool) -> SamlResult<AttributeValue<String>>;
}

/// Free text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringMarshaller;

impl AttributeValueMarshaller for StringMarshaller {
    fn marshal(&self, value: &AttributeValue<String>) -> SamlResult<String> {
        Ok(value.value().clone())
    }

    fn unmarshal(&self, value: &str, non_latin: bool) -> SamlResult<AttributeValue<String>> {
        Ok(wrap(value.to_string(), non_latin))
    }
}

/// `xsd:date` values (`YYYY-MM-DD`).
#[derive(Debug, Clone, Copy, Default)]
pub struct DateMarshaller;

impl DateMarshaller {
    fn check(value: &str) -> SamlResult<()> {
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(|_| ())
            .map_err(|e| SamlError::Message(format!("invalid date '{value}': {e}")))
    }
}

impl AttributeValueMarshaller for DateMarshaller {
    fn marshal(&self, value: &AttributeValue<String>) -> SamlResult<String> {
        Self::check(value.value())?;
        Ok(value.value().trim().to_string())
    }

    fn unmarshal(&self, value: &str, non_latin: bool) -> SamlResult<AttributeValue<String>> {
        Self::check(value)?;
        Ok(wrap(value.trim().to_string(), non_latin))
    }
}

/// eIDAS gender codes.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenderMarshaller;

impl GenderMarshaller {
    const VALUES: [&'static str; 3] = ["Male", "Female", "Unspecified"];

    fn normalize(value: &str) -> SamlResult<String> {
        Self::VALUES
            .iter()
            .find(|v| v.eq_ignore_ascii_case(value.trim()))
            .map(|v| (*v).to_string())
            .ok_or_else(|| SamlError::Message(format!("invalid gender '{value}'")))
    }
}

impl AttributeValueMarshaller for GenderMarshaller {
    fn marshal(&self, value: &AttributeValue<String>) -> SamlResult<String> {
        Self::normalize(value.value())
    }

    fn unmarshal(&self, value: &str, non_latin: bool) -> SamlResult<AttributeValue<String>> {
        Ok(wrap(Self::normalize(value)?, non_latin))
    }
}

fn wrap(value: String, non_latin: bool) -> AttributeValue<String> {
    if non_latin {
        AttributeValue::non_latin(value)
    } else {
        AttributeValue::new(value)
    }
}

/// Immutable description of an attribute. Identity is the name URI.
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    name_uri: String,
    friendly_name: String,
    person_type: PersonType,
    xml_type: XmlType,
    required: bool,
    unique_identifier: bool,
    transliteration_mandatory: bool,
    marshaller: Arc<dyn AttributeValueMarshaller>,
}

impl PartialEq for AttributeDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.name_uri == other.name_uri
    }
}

impl Eq for AttributeDefinition {}

impl AttributeDefinition {
    /// Starts a definition with a string marshaller and no flags set.
    #[must_use]
    pub fn builder(
        name_uri: impl Into<String>,
        friendly_name: impl Into<String>,
        person_type: PersonType,
        xml_type: XmlType,
    ) -> AttributeDefinitionBuilder {
        AttributeDefinitionBuilder {
            definition: Self {
                name_uri: name_uri.into(),
                friendly_name: friendly_name.into(),
                person_type,
                xml_type,
                required: false,
                unique_identifier: false,
                transliteration_mandatory: false,
                marshaller: Arc::new(StringMarshaller),
            },
        }
    }

    /// Returns the full name URI.
    #[must_use]
    pub fn name_uri(&self) -> &str {
        &self.name_uri
    }

    /// Returns the friendly name.
    #[must_use]
    pub fn friendly_name(&self) -> &str {
        &self.friendly_name
    }

    /// Returns the name without its URI prefix.
    #[must_use]
    pub fn short_name(&self) -> &str {
        self.name_uri.rsplit('/').next().unwrap_or(&self.name_uri)
    }

    /// Returns the person type.
    #[must_use]
    pub const fn person_type(&self) -> PersonType {
        self.person_type
    }

    /// Returns the XML type.
    #[must_use]
    pub const fn xml_type(&self) -> &XmlType {
        &self.xml_type
    }

    /// Returns true if the attribute is mandatory in its minimum data set.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns true if the attribute is a unique identifier.
    #[must_use]
    pub const fn is_unique_identifier(&self) -> bool {
        self.unique_identifier
    }

    /// Returns true if non-Latin values must carry a Latin transliteration.
    #[must_use]
    pub const fn is_transliteration_mandatory(&self) -> bool {
        self.transliteration_mandatory
    }

    /// Returns the value marshaller.
    #[must_use]
    pub fn marshaller(&self) -> &dyn AttributeValueMarshaller {
        self.marshaller.as_ref()
    }
}

/// Builder for [`AttributeDefinition`].
#[derive(Debug)]
pub struct AttributeDefinitionBuilder {
    definition: AttributeDefinition,
}

impl AttributeDefinitionBuilder {
    /// Marks the attribute mandatory.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.definition.required = true;
        self
    }

    /// Marks the attribute a unique identifier.
    #[must_use]
    pub fn unique_identifier(mut self) -> Self {
        self.definition.unique_identifier = true;
        self
    }

    /// Requires a Latin transliteration for non-Latin values.
    #[must_use]
    pub fn transliteration_mandatory(mut self) -> Self {
        self.definition.transliteration_mandatory = true;
        self
    }

    /// Sets the value marshaller.
    #[must_use]
    pub fn marshaller(mut self, marshaller: Arc<dyn AttributeValueMarshaller>) -> Self {
        self.definition.marshaller = marshaller;
        self
    }

    /// Finishes the definition.
    #[must_use]
    pub fn build(self) -> AttributeDefinition {
        self.definition
    }
}
