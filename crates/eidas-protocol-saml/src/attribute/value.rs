//! Attribute values and attribute status.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An immutable attribute value.
///
/// Two values are equal when both the value and the non-Latin flag are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeValue<T> {
    value: T,
    #[serde(default)]
    non_latin_script_alternate_version: bool,
}

impl<T> AttributeValue<T> {
    /// Creates a Latin-script value.
    pub const fn new(value: T) -> Self {
        Self {
            value,
            non_latin_script_alternate_version: false,
        }
    }

    /// Creates the non-Latin alternate of a transliterated value.
    pub const fn non_latin(value: T) -> Self {
        Self {
            value,
            non_latin_script_alternate_version: true,
        }
    }

    /// Returns the value.
    pub const fn value(&self) -> &T {
        &self.value
    }

    /// Returns true for the non-Latin alternate.
    pub const fn is_non_latin_script_alternate_version(&self) -> bool {
        self.non_latin_script_alternate_version
    }

    /// Consumes the wrapper.
    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: fmt::Display> fmt::Display for AttributeValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.fmt(f)
    }
}

/// Availability of a released attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttributeStatus {
    /// Value present.
    #[default]
    Available,
    /// The source holds no value.
    NotAvailable,
    /// The citizen refused to release it.
    Withheld,
}

impl AttributeStatus {
    /// Returns the wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::NotAvailable => "NotAvailable",
            Self::Withheld => "Withheld",
        }
    }

    /// Parses the wire value, ignoring case.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        [Self::Available, Self::NotAvailable, Self::Withheld]
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for AttributeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
