//! Request-scoped values the protocol layer reads from the HTTP session.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Keys of the values kept in a request session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionAttribute {
    /// The request this node sent on to the next hop.
    ConnectorAuthnRequest,
    /// Where errors are redirected.
    ErrorRedirectUrl,
    /// `RelayState` received with the request.
    RelayState,
    /// Client address.
    RemoteAddress,
    /// ID of the request being answered.
    InResponseTo,
    /// The request received from the service provider.
    SpAuthnRequest,
    /// Service provider return URL.
    SpUrl,
    /// HTTP method the request arrived with.
    HttpMethod,
}

impl SessionAttribute {
    /// Every attribute.
    pub const ALL: [Self; 8] = [
        Self::ConnectorAuthnRequest,
        Self::ErrorRedirectUrl,
        Self::RelayState,
        Self::RemoteAddress,
        Self::InResponseTo,
        Self::SpAuthnRequest,
        Self::SpUrl,
        Self::HttpMethod,
    ];

    /// Returns the session key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ConnectorAuthnRequest => "connectorAuthnRequest",
            Self::ErrorRedirectUrl => "errorRedirectUrl",
            Self::RelayState => "relayState",
            Self::RemoteAddress => "remoteAddress",
            Self::InResponseTo => "inResponseTo",
            Self::SpAuthnRequest => "spAuthnRequest",
            Self::SpUrl => "spUrl",
            Self::HttpMethod => "httpMethod",
        }
    }

    /// Looks up an attribute by session key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.key() == key)
    }
}

impl fmt::Display for SessionAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Session values of one protocol exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSession {
    values: BTreeMap<SessionAttribute, String>,
}

impl RequestSession {
    /// Creates an empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a session for a request that arrived with `method`.
    #[must_use]
    pub fn with_http_method(method: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.set(SessionAttribute::HttpMethod, method);
        session
    }

    /// Returns a raw value.
    #[must_use]
    pub fn get(&self, attribute: SessionAttribute) -> Option<&str> {
        self.values.get(&attribute).map(String::as_str)
    }

    /// Sets a raw value.
    pub fn set(&mut self, attribute: SessionAttribute, value: impl Into<String>) {
        self.values.insert(attribute, value.into());
    }

    /// Removes a value, returning it.
    pub fn remove(&mut self, attribute: SessionAttribute) -> Option<String> {
        self.values.remove(&attribute)
    }

    /// Drops every value.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Returns the HTTP method, upper-cased.
    #[must_use]
    pub fn http_method(&self) -> Option<String> {
        self.get(SessionAttribute::HttpMethod)
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_ascii_uppercase)
    }

    /// Returns the client address, if it parses.
    #[must_use]
    pub fn remote_address(&self) -> Option<IpAddr> {
        self.get(SessionAttribute::RemoteAddress)?.trim().parse().ok()
    }

    /// Returns the relay state.
    #[must_use]
    pub fn relay_state(&self) -> Option<&str> {
        self.get(SessionAttribute::RelayState)
    }

    /// Returns the ID of the request being answered.
    #[must_use]
    pub fn in_response_to(&self) -> Option<&str> {
        self.get(SessionAttribute::InResponseTo)
    }

    /// Returns the error redirect URL.
    #[must_use]
    pub fn error_redirect_url(&self) -> Option<&str> {
        self.get(SessionAttribute::ErrorRedirectUrl)
    }

    /// Returns the service provider URL.
    #[must_use]
    pub fn sp_url(&self) -> Option<&str> {
        self.get(SessionAttribute::SpUrl)
    }

    /// Returns the request received from the service provider.
    #[must_use]
    pub fn sp_authn_request(&self) -> Option<&str> {
        self.get(SessionAttribute::SpAuthnRequest)
    }

    /// Returns the request sent on to the next hop.
    #[must_use]
    pub fn connector_authn_request(&self) -> Option<&str> {
        self.get(SessionAttribute::ConnectorAuthnRequest)
    }
}
