//! RSA operations used by XML-DSig and XML-Enc.
//!
//! Signatures are RSA PKCS#1 v1.5 (`rsa-sha256/384/512`). Key transport is
//! RSA-OAEP with the XML-Enc defaults (SHA-1 digest, MGF1 with SHA-1).

use aws_lc_rs::{
    rand::SystemRandom,
    rsa::{
        OaepPrivateDecryptingKey, OaepPublicEncryptingKey, PrivateDecryptingKey,
        PublicEncryptingKey, OAEP_SHA1_MGF1SHA1,
    },
    signature::{self, RsaKeyPair, UnparsedPublicKey, VerificationAlgorithm},
};

use crate::error::{CryptoError, CryptoResult};

/// RSA PKCS#1 v1.5 signature algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsaAlgorithm {
    /// RSA PKCS#1 v1.5 with SHA-256.
    Rs256,
    /// RSA PKCS#1 v1.5 with SHA-384.
    Rs384,
    /// RSA PKCS#1 v1.5 with SHA-512.
    Rs512,
}

impl RsaAlgorithm {
    /// Returns the XML-DSig algorithm URI.
    #[must_use]
    pub const fn xml_dsig_uri(self) -> &'static str {
        match self {
            Self::Rs256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
            Self::Rs384 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384",
            Self::Rs512 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512",
        }
    }
}

/// Signs data with an RSA private key (PKCS#8 or PKCS#1 DER).
pub fn rsa_sign(key_der: &[u8], data: &[u8], algorithm: RsaAlgorithm) -> CryptoResult<Vec<u8>> {
    let key_pair = RsaKeyPair::from_pkcs8(key_der)
        .or_else(|_| RsaKeyPair::from_der(key_der))
        .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA key: {e}")))?;

    let rng = SystemRandom::new();
    let mut sig = vec![0u8; key_pair.public_modulus_len()];

    let padding = match algorithm {
        RsaAlgorithm::Rs256 => &signature::RSA_PKCS1_SHA256,
        RsaAlgorithm::Rs384 => &signature::RSA_PKCS1_SHA384,
        RsaAlgorithm::Rs512 => &signature::RSA_PKCS1_SHA512,
    };

    key_pair
        .sign(padding, &rng, data, &mut sig)
        .map_err(|e| CryptoError::Signing(format!("RSA signing failed: {e}")))?;

    Ok(sig)
}

/// Verifies an RSA signature.
///
/// `public_key` is the PKCS#1 `RSAPublicKey` carried in the certificate's
/// subject public key bit string.
pub fn rsa_verify(
    public_key: &[u8],
    data: &[u8],
    sig: &[u8],
    algorithm: RsaAlgorithm,
) -> CryptoResult<()> {
    let verification_alg: &'static dyn VerificationAlgorithm = match algorithm {
        RsaAlgorithm::Rs256 => &signature::RSA_PKCS1_2048_8192_SHA256,
        RsaAlgorithm::Rs384 => &signature::RSA_PKCS1_2048_8192_SHA384,
        RsaAlgorithm::Rs512 => &signature::RSA_PKCS1_2048_8192_SHA512,
    };

    UnparsedPublicKey::new(verification_alg, public_key)
        .verify(data, sig)
        .map_err(|_| CryptoError::Verification)
}

/// Wraps a symmetric key with RSA-OAEP.
///
/// `spki_der` is the certificate's DER `SubjectPublicKeyInfo`.
pub fn rsa_oaep_encrypt(spki_der: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let public = PublicEncryptingKey::from_der(spki_der)
        .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA public key: {e}")))?;
    let oaep = OaepPublicEncryptingKey::new(public)
        .map_err(|e| CryptoError::InvalidKey(format!("RSA-OAEP unavailable: {e}")))?;

    let mut out = vec![0u8; oaep.ciphertext_size()];
    let ciphertext = oaep
        .encrypt(&OAEP_SHA1_MGF1SHA1, plaintext, &mut out, None)
        .map_err(|e| CryptoError::Encryption(format!("RSA-OAEP key wrap failed: {e}")))?;
    Ok(ciphertext.to_vec())
}

/// Unwraps an RSA-OAEP wrapped key with a PKCS#8 private key.
pub fn rsa_oaep_decrypt(pkcs8_der: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    let private = PrivateDecryptingKey::from_pkcs8(pkcs8_der)
        .map_err(|e| CryptoError::InvalidKey(format!("Invalid RSA private key: {e}")))?;
    let oaep = OaepPrivateDecryptingKey::new(private)
        .map_err(|e| CryptoError::InvalidKey(format!("RSA-OAEP unavailable: {e}")))?;

    let mut out = vec![0u8; oaep.min_output_size()];
    let plaintext = oaep
        .decrypt(&OAEP_SHA1_MGF1SHA1, ciphertext, &mut out, None)
        .map_err(|_| CryptoError::Decryption)?;
    Ok(plaintext.to_vec())
}
