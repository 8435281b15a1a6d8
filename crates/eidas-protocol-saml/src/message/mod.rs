//! Complete protocol messages.
//!
//! Requests and responses are written with `format!` templates and read
//! back through [`crate::xml`]. Dialect-specific parts are delegated to an
//! [`ExtensionProcessor`](crate::extensions::ExtensionProcessor).

mod request;
mod response;

pub use request::{build_authn_request, parse_authn_request};
pub use response::{
    build_error_response, build_response, parse_response, read_conditions, AssertionConditions,
    ResponseParams,
};

use chrono::{DateTime, SecondsFormat, Utc};

/// Entity name ID format used on `Issuer` elements.
pub const ENTITY_FORMAT: &str = "urn:oasis:names:tc:SAML:2.0:nameid-format:entity";

/// Consent value written on outgoing messages.
pub const CONSENT_UNSPECIFIED: &str = "urn:oasis:names:tc:SAML:2.0:consent:unspecified";

/// Formats an `xs:dateTime` with millisecond precision.
#[must_use]
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}
