//! Attribute registries.
//!
//! A registry is an ordered set of [`AttributeDefinition`]s keyed by name
//! URI. The eIDAS minimum data sets for natural and legal persons are
//! built in.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{
    AttributeDefinition, DateMarshaller, GenderMarshaller, PersonType, XmlType,
};
use crate::types::eidas;

/// Ordered set of attribute definitions.
#[derive(Debug, Clone, Default)]
pub struct AttributeRegistry {
    definitions: BTreeMap<String, AttributeDefinition>,
}

impl AttributeRegistry {
    /// Creates a registry from definitions. A later duplicate replaces an earlier one.
    #[must_use]
    pub fn new(definitions: impl IntoIterator<Item = AttributeDefinition>) -> Self {
        let definitions = definitions
            .into_iter()
            .map(|d| (d.name_uri().to_string(), d))
            .collect();
        Self { definitions }
    }

    /// The eIDAS natural person attributes.
    #[must_use]
    pub fn eidas_natural_person() -> Self {
        Self::new(natural_person_definitions())
    }

    /// The eIDAS legal person attributes.
    #[must_use]
    pub fn eidas_legal_person() -> Self {
        Self::new(legal_person_definitions())
    }

    /// Natural and legal person attributes together.
    #[must_use]
    pub fn eidas() -> Self {
        Self::new(
            natural_person_definitions()
                .into_iter()
                .chain(legal_person_definitions()),
        )
    }

    /// Looks up a definition by name URI.
    #[must_use]
    pub fn get_by_name(&self, name_uri: &str) -> Option<&AttributeDefinition> {
        self.definitions.get(name_uri)
    }

    /// Looks up a definition by friendly name.
    #[must_use]
    pub fn get_by_friendly_name(&self, friendly_name: &str) -> Option<&AttributeDefinition> {
        self.definitions
            .values()
            .find(|d| d.friendly_name() == friendly_name)
    }

    /// Returns true if the registry holds this name URI.
    #[must_use]
    pub fn contains(&self, name_uri: &str) -> bool {
        self.definitions.contains_key(name_uri)
    }

    /// Iterates in name URI order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.definitions.values()
    }

    /// Returns the name URIs in order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.definitions.keys().map(String::as_str).collect()
    }

    /// Returns the number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

const NATURAL_PREFIX: &str = "eidas-natural";
const LEGAL_PREFIX: &str = "eidas-legal";

fn natural(friendly_name: &str, type_name: &str) -> super::AttributeDefinitionBuilder {
    AttributeDefinition::builder(
        format!("{}{friendly_name}", eidas::NATURAL_PERSON_PREFIX),
        friendly_name,
        PersonType::NaturalPerson,
        XmlType::new(eidas::NATURAL_PERSON_TYPES_NS, type_name, NATURAL_PREFIX),
    )
}

fn legal(friendly_name: &str, type_name: &str) -> super::AttributeDefinitionBuilder {
    AttributeDefinition::builder(
        format!("{}{friendly_name}", eidas::LEGAL_PERSON_PREFIX),
        friendly_name,
        PersonType::LegalPerson,
        XmlType::new(eidas::LEGAL_PERSON_TYPES_NS, type_name, LEGAL_PREFIX),
    )
}

fn natural_person_definitions() -> Vec<AttributeDefinition> {
    vec![
        natural("CurrentFamilyName", "CurrentFamilyNameType")
            .required()
            .transliteration_mandatory()
            .build(),
        natural("CurrentGivenName", "CurrentGivenNameType")
            .required()
            .transliteration_mandatory()
            .build(),
        natural("DateOfBirth", "DateOfBirthType")
            .required()
            .marshaller(Arc::new(DateMarshaller))
            .build(),
        natural("PersonIdentifier", "PersonIdentifierType")
            .required()
            .unique_identifier()
            .build(),
        natural("BirthName", "BirthNameType")
            .transliteration_mandatory()
            .build(),
        natural("CurrentAddress", "CurrentAddressType").build(),
        natural("PlaceOfBirth", "PlaceOfBirthType")
            .transliteration_mandatory()
            .build(),
        natural("Gender", "GenderType")
            .marshaller(Arc::new(GenderMarshaller))
            .build(),
    ]
}

fn legal_person_definitions() -> Vec<AttributeDefinition> {
    vec![
        legal("LegalPersonIdentifier", "LegalPersonIdentifierType")
            .required()
            .unique_identifier()
            .build(),
        legal("LegalName", "LegalNameType")
            .required()
            .transliteration_mandatory()
            .build(),
        legal("LegalAddress", "LegalPersonAddressType").build(),
        legal("VATRegistration", "VATRegistrationNumberType").build(),
        legal("TaxReference", "TaxReferenceType").build(),
        legal("D-2012-17-EUIdentifier", "D-2012-17-EUIdentifierType").build(),
        legal("LEI", "LEIType").build(),
        legal("EORI", "EORIType").build(),
        legal("SEED", "SEEDType").build(),
        legal("SIC", "SICType").build(),
    ]
}
