//! Protocol-neutral message types and SAML constants.

mod authn_request;
mod constants;
mod loa;
mod response;

pub use authn_request::*;
pub use constants::*;
pub use loa::*;
pub use response::*;
