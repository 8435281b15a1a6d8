//! Algorithm whitelists.

use std::fmt;

use crate::types::{encryption_algorithms, signature_algorithms};

/// Allow-list of algorithm URIs.
///
/// Entries are split on `;` or `,`, trimmed and lower-cased. Unknown URIs
/// are dropped with a warning. An empty whitelist allows nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlgorithmWhitelist {
    entries: Vec<String>,
}

impl AlgorithmWhitelist {
    /// Parses a whitelist, keeping only URIs in `known`.
    #[must_use]
    pub fn parse(value: &str, known: &[&str]) -> Self {
        let mut entries = Vec::new();
        for entry in value
            .split([';', ','])
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
        {
            if !known.iter().any(|k| k.eq_ignore_ascii_case(&entry)) {
                tracing::warn!(algorithm = %entry, "Ignoring unknown whitelist entry");
                continue;
            }
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        Self { entries }
    }

    /// Parses a signature algorithm whitelist.
    #[must_use]
    pub fn signature(value: &str) -> Self {
        Self::parse(value, &signature_algorithms::KNOWN)
    }

    /// Parses a data encryption algorithm whitelist.
    #[must_use]
    pub fn encryption(value: &str) -> Self {
        Self::parse(value, &encryption_algorithms::KNOWN)
    }

    /// Returns true if `uri` is allowed.
    #[must_use]
    pub fn contains(&self, uri: &str) -> bool {
        let uri = uri.trim().to_lowercase();
        self.entries.iter().any(|e| *e == uri)
    }

    /// Returns true if nothing is allowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the allowed URIs.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl fmt::Display for AlgorithmWhitelist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entries.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_separators_and_case() {
        let whitelist = AlgorithmWhitelist::signature(
            " http://www.w3.org/2001/04/xmldsig-more#RSA-SHA256 ,\
             http://www.w3.org/2001/04/xmldsig-more#rsa-sha512;urn:made:up;;",
        );
        assert_eq!(whitelist.iter().count(), 2);
        assert!(whitelist.contains(signature_algorithms::RSA_SHA256));
        assert!(whitelist.contains(signature_algorithms::RSA_SHA512));
        assert!(!whitelist.contains(signature_algorithms::RSA_SHA384));
        assert!(!whitelist.contains("urn:made:up"));
    }

    #[test]
    fn empty_whitelist_allows_nothing() {
        let whitelist = AlgorithmWhitelist::encryption("");
        assert!(whitelist.is_empty());
        assert!(!whitelist.contains(encryption_algorithms::AES256_GCM));
    }

    #[test]
    fn encryption_whitelist_ignores_key_transport() {
        let whitelist = AlgorithmWhitelist::encryption(&format!(
            "{};{}",
            encryption_algorithms::AES128_GCM,
            encryption_algorithms::RSA_OAEP
        ));
        assert_eq!(whitelist.to_string(), encryption_algorithms::AES128_GCM);
    }
}
