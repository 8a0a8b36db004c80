//! AES-GCM encryption for secret environment values.
//!
//! Secret-classified values are encrypted with AES-256-GCM before they are
//! written to the `.user` environment file. Stored payloads carry the
//! [`CRYPTO_PREFIX`] tag followed by base64 of a random 96-bit nonce
//! prepended to the ciphertext, so a reader can tell encrypted values from
//! plaintext without attempting decryption.

use crate::errors::CryptoError;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Tag marking a stored value as encrypted.
pub const CRYPTO_PREFIX: &str = "crypto_";

/// Nonce size for AES-GCM (96 bits / 12 bytes).
const NONCE_SIZE: usize = 12;

/// Encryptor for secret environment values.
///
/// The cipher key is derived from a per-project key string with SHA-256,
/// so the same project settings always decrypt what they encrypted.
#[derive(Clone)]
pub struct Encryptor {
    cipher: Aes256Gcm,
}

impl Encryptor {
    /// Creates an encryptor from a project key string.
    #[must_use]
    pub fn new(project_key: &str) -> Self {
        let digest = Sha256::digest(project_key.as_bytes());
        let key = Key::<Aes256Gcm>::from_slice(&digest);
        Self {
            cipher: Aes256Gcm::new(key),
        }
    }

    /// Returns true if a stored value carries the encrypted tag.
    #[must_use]
    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(CRYPTO_PREFIX)
    }

    /// Encrypts a plaintext value into a tagged payload.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encrypt`] if the cipher fails.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encrypt {
                message: e.to_string(),
            })?;

        let mut payload = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        payload.extend_from_slice(&nonce_bytes);
        payload.extend_from_slice(&ciphertext);

        Ok(format!("{CRYPTO_PREFIX}{}", BASE64.encode(payload)))
    }

    /// Decrypts a tagged payload back to its plaintext.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Payload`] if the value is not a well-formed
    /// payload, or [`CryptoError::Decrypt`] if the key is wrong or the
    /// data was tampered with.
    pub fn decrypt(&self, value: &str) -> Result<String, CryptoError> {
        let encoded = value
            .strip_prefix(CRYPTO_PREFIX)
            .ok_or_else(|| CryptoError::Payload {
                message: format!("value does not start with '{CRYPTO_PREFIX}'"),
            })?;

        let payload = BASE64.decode(encoded).map_err(|e| CryptoError::Payload {
            message: format!("invalid base64: {e}"),
        })?;

        if payload.len() < NONCE_SIZE {
            return Err(CryptoError::Payload {
                message: "payload too short (missing nonce)".to_string(),
            });
        }

        let (nonce_bytes, ciphertext) = payload.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| CryptoError::Decrypt {
                message: e.to_string(),
            })?;

        String::from_utf8(plaintext).map_err(|e| CryptoError::Decrypt {
            message: format!("decrypted value is not UTF-8: {e}"),
        })
    }
}

impl std::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encryptor").finish_non_exhaustive()
    }
}
