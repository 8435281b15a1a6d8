//! HTTP-POST binding.

use base64::Engine;

use super::{select, utf8, DecodedMessage, SamlMessageType};
use crate::error::SamlResult;
use crate::xml::escape;

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// HTTP-POST encoder and decoder.
#[derive(Debug, Clone, Copy)]
pub struct HttpPostBinding;

impl HttpPostBinding {
    /// Returns the form field value for `xml`.
    #[must_use]
    pub fn encode_value(xml: &str) -> String {
        B64.encode(xml)
    }

    /// Renders a self-submitting form posting `xml` to `destination`.
    #[must_use]
    pub fn encode_form(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> String {
        let relay_state = relay_state
            .map(|rs| {
                format!(
                    r#"<input type="hidden" name="RelayState" value="{}"/>"#,
                    escape(rs)
                )
            })
            .unwrap_or_default();
        format!(
            r#"<!DOCTYPE html>
<html>
<body onload="document.forms[0].submit()">
    <form method="post" action="{}">
        <input type="hidden" name="{}" value="{}"/>
        {relay_state}
        <noscript><input type="submit" value="Continue"/></noscript>
    </form>
</body>
</html>"#,
            escape(destination),
            message_type.param_name(),
            Self::encode_value(xml),
        )
    }

    /// Decodes posted form values.
    ///
    /// Line breaks inside the base64 value are tolerated.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = select(saml_request, saml_response)?;
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let xml = utf8(B64.decode(compact)?)?;
        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(str::to_string),
        })
    }
}
