//! Request validation and replay protection.
//!
//! [`RequestValidator`] checks an inbound request against the issuer's
//! metadata; [`AntiReplayGuard`] rejects message IDs already processed.

mod replay;
mod request;

pub use replay::AntiReplayGuard;
pub use request::RequestValidator;
