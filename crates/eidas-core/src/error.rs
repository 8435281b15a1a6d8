//! Error handling for the eIDAS node.
//!
//! Configuration problems are fatal and never retried. Everything the
//! protocol layer classifies as "invalid SAML" lives in
//! `eidas-protocol-saml`; this type only covers what can go wrong before an
//! engine exists.

use thiserror::Error;

/// Result type alias using the core error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// The requested engine instance is not configured.
    #[error("Configuration instance {0} does not exist")]
    UnknownInstance(String),

    /// Configuration document could not be parsed.
    #[error("configuration parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration document could not be written.
    #[error("configuration serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// I/O error while reading configuration or key material.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error.
    #[error("validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Returns whether this error is a fatal misconfiguration.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::UnknownInstance(_) | Self::Parse(_) | Self::Io(_)
        )
    }
}
