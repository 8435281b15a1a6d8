//! Cryptographically secure random generation.
//!
//! Used for content-encryption keys, GCM nonces and SAML message IDs.

use rand::distr::{Alphanumeric, SampleString};
use rand::Rng;

/// Generates `len` cryptographically secure random bytes.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates a random alphanumeric string.
#[must_use]
pub fn random_alphanumeric(len: usize) -> String {
    let mut rng = rand::rng();
    Alphanumeric.sample_string(&mut rng, len)
}

/// Generates a SAML message ID.
///
/// XML IDs must not start with a digit, so the value is prefixed with `_`.
#[must_use]
pub fn generate_message_id() -> String {
    format!("_{}", random_alphanumeric(40))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_have_requested_length() {
        assert_eq!(random_bytes(12).len(), 12);
        assert_ne!(random_bytes(32), random_bytes(32));
    }

    #[test]
    fn message_id_is_ncname() {
        let id = generate_message_id();
        assert!(id.starts_with('_'));
        assert_eq!(id.len(), 41);
        assert!(id[1..].chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
