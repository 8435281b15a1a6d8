//! HTTP-Redirect binding.

use std::io::{Read, Write};

use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use super::{select, utf8, DecodedMessage, SamlMessageType};
use crate::error::{SamlError, SamlResult};

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Largest inflated message accepted.
const MAX_INFLATED_SIZE: u64 = 1024 * 1024;

/// HTTP-Redirect encoder and decoder.
#[derive(Debug, Clone, Copy)]
pub struct HttpRedirectBinding;

impl HttpRedirectBinding {
    /// Builds the redirect URL carrying `xml` to `destination`.
    pub fn encode(
        xml: &str,
        destination: &str,
        relay_state: Option<&str>,
        message_type: SamlMessageType,
    ) -> SamlResult<String> {
        let encoded = B64.encode(deflate(xml.as_bytes())?);
        let separator = if destination.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{destination}{separator}{}={}",
            message_type.param_name(),
            urlencoding::encode(&encoded)
        );
        if let Some(relay_state) = relay_state {
            url.push_str(&format!("&RelayState={}", urlencoding::encode(relay_state)));
        }
        Ok(url)
    }

    /// Decodes query parameter values.
    ///
    /// Values are expected URL-decoded already, as web frameworks hand them
    /// over.
    pub fn decode(
        saml_request: Option<&str>,
        saml_response: Option<&str>,
        relay_state: Option<&str>,
    ) -> SamlResult<DecodedMessage> {
        let (encoded, message_type) = select(saml_request, saml_response)?;
        let xml = utf8(inflate(&B64.decode(encoded.trim())?)?)?;
        Ok(DecodedMessage {
            xml,
            message_type,
            relay_state: relay_state.map(str::to_string),
        })
    }

    /// Decodes the message carried by a full redirect URL.
    pub fn decode_url(url: &str) -> SamlResult<DecodedMessage> {
        let parsed = url::Url::parse(url)
            .map_err(|e| SamlError::Message(format!("invalid redirect URL: {e}")))?;
        let mut saml_request = None;
        let mut saml_response = None;
        let mut relay_state = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "SAMLRequest" => saml_request = Some(value.into_owned()),
                "SAMLResponse" => saml_response = Some(value.into_owned()),
                "RelayState" => relay_state = Some(value.into_owned()),
                _ => {}
            }
        }
        Self::decode(
            saml_request.as_deref(),
            saml_response.as_deref(),
            relay_state.as_deref(),
        )
    }
}

fn deflate(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| SamlError::Message(format!("cannot deflate message: {e}")))?;
    encoder
        .finish()
        .map_err(|e| SamlError::Message(format!("cannot deflate message: {e}")))
}

fn inflate(data: &[u8]) -> SamlResult<Vec<u8>> {
    let mut inflated = Vec::new();
    DeflateDecoder::new(data)
        .take(MAX_INFLATED_SIZE + 1)
        .read_to_end(&mut inflated)
        .map_err(|e| SamlError::Message(format!("cannot inflate message: {e}")))?;
    if inflated.len() as u64 > MAX_INFLATED_SIZE {
        return Err(SamlError::Message(format!(
            "inflated message exceeds {MAX_INFLATED_SIZE} bytes"
        )));
    }
    Ok(inflated)
}
