//! # eidas-crypto
//!
//! Cryptographic primitives for the eIDAS node, built on aws-lc-rs and
//! x509-parser.
//!
//! - Digests (SHA-256/384/512) for XML-DSig references and attribute hashing
//! - RSA PKCS#1 v1.5 signatures as used by XML-DSig `rsa-shaNNN`
//! - RSA-OAEP key transport and AES-GCM data encryption for XML-Enc
//! - X.509 certificate inspection (validity window, issuer, self-signed)
//! - PEM keystore and trust store

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod aead;
pub mod certificate;
pub mod error;
pub mod hash;
pub mod keystore;
pub mod random;
pub mod rsa;

pub use aead::AeadAlgorithm;
pub use certificate::Certificate;
pub use error::{CryptoError, CryptoResult};
pub use hash::{hash, sha256, sha384, sha512, HashAlgorithm};
pub use keystore::{KeyEntry, KeyStore, TrustStore};
pub use rsa::{rsa_oaep_decrypt, rsa_oaep_encrypt, rsa_sign, rsa_verify, RsaAlgorithm};
