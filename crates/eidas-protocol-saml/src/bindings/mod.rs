//! SAML message transport.
//!
//! - **HTTP-POST**: the message is base64 encoded into a form field.
//! - **HTTP-Redirect**: the message is deflated, base64 encoded and URL
//!   encoded into a query parameter.
//!
//! Signatures always travel inside the XML; the redirect binding's detached
//! query signature is not used between eIDAS nodes.

mod post;
mod redirect;

pub use post::HttpPostBinding;
pub use redirect::HttpRedirectBinding;

use crate::error::{SamlError, SamlResult};
use crate::types::SamlBinding;

/// Which kind of message a binding carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamlMessageType {
    /// `AuthnRequest`.
    Request,
    /// `Response`.
    Response,
}

impl SamlMessageType {
    /// Returns the form or query parameter name.
    #[must_use]
    pub const fn param_name(self) -> &'static str {
        match self {
            Self::Request => "SAMLRequest",
            Self::Response => "SAMLResponse",
        }
    }
}

/// A message taken off the wire.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The XML document.
    pub xml: String,
    /// Request or response.
    pub message_type: SamlMessageType,
    /// `RelayState`, when sent.
    pub relay_state: Option<String>,
}

/// Decodes a `SAMLRequest` or `SAMLResponse` parameter value received over
/// `binding`.
///
/// Exactly one of the two parameters must be present.
pub fn decode(
    binding: SamlBinding,
    saml_request: Option<&str>,
    saml_response: Option<&str>,
    relay_state: Option<&str>,
) -> SamlResult<DecodedMessage> {
    match binding {
        SamlBinding::HttpPost => HttpPostBinding::decode(saml_request, saml_response, relay_state),
        SamlBinding::HttpRedirect => {
            HttpRedirectBinding::decode(saml_request, saml_response, relay_state)
        }
        other => Err(SamlError::UnsupportedBinding(other.uri().to_string())),
    }
}

fn select<'a>(
    saml_request: Option<&'a str>,
    saml_response: Option<&'a str>,
) -> SamlResult<(&'a str, SamlMessageType)> {
    match (saml_request, saml_response) {
        (Some(request), None) => Ok((request, SamlMessageType::Request)),
        (None, Some(response)) => Ok((response, SamlMessageType::Response)),
        (None, None) => Err(SamlError::Message(
            "no SAMLRequest or SAMLResponse parameter".to_string(),
        )),
        (Some(_), Some(_)) => Err(SamlError::Message(
            "both SAMLRequest and SAMLResponse parameters present".to_string(),
        )),
    }
}

fn utf8(bytes: Vec<u8>) -> SamlResult<String> {
    String::from_utf8(bytes).map_err(|e| SamlError::Message(format!("message is not UTF-8: {e}")))
}
