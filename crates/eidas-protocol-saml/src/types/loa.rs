//! eIDAS levels of assurance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{EidasErrorKey, SamlError};

/// eIDAS level of assurance, ordered `Low < Substantial < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LevelOfAssurance {
    /// `http://eidas.europa.eu/LoA/low`
    Low,
    /// `http://eidas.europa.eu/LoA/substantial`
    Substantial,
    /// `http://eidas.europa.eu/LoA/high`
    High,
}

impl LevelOfAssurance {
    /// Returns the URI for this level.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Low => "http://eidas.europa.eu/LoA/low",
            Self::Substantial => "http://eidas.europa.eu/LoA/substantial",
            Self::High => "http://eidas.europa.eu/LoA/high",
        }
    }

    /// Parses a level from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri.trim() {
            "http://eidas.europa.eu/LoA/low" => Some(Self::Low),
            "http://eidas.europa.eu/LoA/substantial" => Some(Self::Substantial),
            "http://eidas.europa.eu/LoA/high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for LevelOfAssurance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.uri())
    }
}

impl FromStr for LevelOfAssurance {
    type Err = SamlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uri(s).ok_or_else(|| {
            SamlError::invalid_saml(EidasErrorKey::InvalidLoaValue, format!("unknown LoA {s}"))
        })
    }
}

/// `Comparison` attribute of `RequestedAuthnContext`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LoaComparison {
    /// The requested level is a lower bound.
    #[default]
    Minimum,
    /// The requested level must match exactly.
    Exact,
}

impl LoaComparison {
    /// Returns the wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minimum => "minimum",
            Self::Exact => "exact",
        }
    }

    /// Parses the wire value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "minimum" => Some(Self::Minimum),
            "exact" => Some(Self::Exact),
            _ => None,
        }
    }

    /// Returns true when `requested` satisfies `max` under this comparison.
    #[must_use]
    pub fn accepts(self, requested: LevelOfAssurance, max: LevelOfAssurance) -> bool {
        match self {
            Self::Minimum => requested <= max,
            Self::Exact => requested == max,
        }
    }
}
