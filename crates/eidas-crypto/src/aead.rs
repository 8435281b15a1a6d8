//! AES-GCM data encryption in the XML-Enc 1.1 layout.
//!
//! The cipher value is `IV (12 bytes) || ciphertext || tag (16 bytes)`.

use aws_lc_rs::aead::{
    Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_192_GCM, AES_256_GCM, NONCE_LEN,
};

use crate::error::{CryptoError, CryptoResult};
use crate::random::random_bytes;

const TAG_LEN: usize = 16;

/// AES-GCM variants identified by their XML-Enc 1.1 URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AeadAlgorithm {
    /// AES-128-GCM.
    Aes128Gcm,
    /// AES-192-GCM.
    Aes192Gcm,
    /// AES-256-GCM.
    Aes256Gcm,
}

impl AeadAlgorithm {
    /// Returns the XML-Enc algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Aes128Gcm => "http://www.w3.org/2009/xmlenc11#aes128-gcm",
            Self::Aes192Gcm => "http://www.w3.org/2009/xmlenc11#aes192-gcm",
            Self::Aes256Gcm => "http://www.w3.org/2009/xmlenc11#aes256-gcm",
        }
    }

    /// Parses an XML-Enc algorithm URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "http://www.w3.org/2009/xmlenc11#aes128-gcm" => Some(Self::Aes128Gcm),
            "http://www.w3.org/2009/xmlenc11#aes192-gcm" => Some(Self::Aes192Gcm),
            "http://www.w3.org/2009/xmlenc11#aes256-gcm" => Some(Self::Aes256Gcm),
            _ => None,
        }
    }

    /// Returns the key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes192Gcm => 24,
            Self::Aes256Gcm => 32,
        }
    }

    /// Generates a fresh random content-encryption key.
    #[must_use]
    pub fn generate_key(self) -> Vec<u8> {
        random_bytes(self.key_len())
    }

    fn key(self, key: &[u8]) -> CryptoResult<LessSafeKey> {
        let alg = match self {
            Self::Aes128Gcm => &AES_128_GCM,
            Self::Aes192Gcm => &AES_192_GCM,
            Self::Aes256Gcm => &AES_256_GCM,
        };
        let unbound = UnboundKey::new(alg, key)
            .map_err(|_| CryptoError::InvalidKey(format!("{} key length", self.uri())))?;
        Ok(LessSafeKey::new(unbound))
    }

    /// Encrypts `plaintext`, returning `IV || ciphertext || tag`.
    pub fn encrypt(self, key: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        let key = self.key(key)?;

        let mut iv = [0u8; NONCE_LEN];
        iv.copy_from_slice(&random_bytes(NONCE_LEN));

        let mut in_out = plaintext.to_vec();
        key.seal_in_place_append_tag(Nonce::assume_unique_for_key(iv), Aad::empty(), &mut in_out)
            .map_err(|e| CryptoError::Encryption(format!("AES-GCM seal failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + in_out.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&in_out);
        Ok(out)
    }

    /// Decrypts an `IV || ciphertext || tag` value.
    pub fn decrypt(self, key: &[u8], cipher_value: &[u8]) -> CryptoResult<Vec<u8>> {
        if cipher_value.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Decryption);
        }
        let key = self.key(key)?;

        let (iv, sealed) = cipher_value.split_at(NONCE_LEN);
        let nonce = Nonce::try_assume_unique_for_key(iv).map_err(|_| CryptoError::Decryption)?;

        let mut in_out = sealed.to_vec();
        let plaintext = key
            .open_in_place(nonce, Aad::empty(), &mut in_out)
            .map_err(|_| CryptoError::Decryption)?;
        Ok(plaintext.to_vec())
    }
}
