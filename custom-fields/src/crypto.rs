//! Encryption of text-like field values.
//!
//! Ciphertext is stored as `base64(nonce || ciphertext || tag)` in the same
//! text or string column the plaintext would occupy.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{FieldsError, Result};

/// 96-bit nonce.
const NONCE_LEN: usize = 12;
/// 256-bit key.
const KEY_LEN: usize = 32;
/// GCM authentication tag.
const TAG_LEN: usize = 16;

/// Reversible transform applied to encrypted field values.
pub trait Encrypter: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String>;
    fn decrypt(&self, ciphertext: &str) -> Result<String>;
}

/// AES-256-GCM with a random nonce per value.
pub struct AesGcmEncrypter {
    cipher: Aes256Gcm,
}

impl AesGcmEncrypter {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key)),
        }
    }

    /// Build from a base64 encoded 32-byte key.
    pub fn from_base64_key(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| FieldsError::crypto(format!("invalid base64 key: {e}")))?;
        let key: [u8; KEY_LEN] = bytes.as_slice().try_into().map_err(|_| {
            FieldsError::crypto(format!(
                "key must be {KEY_LEN} bytes (got {})",
                bytes.len()
            ))
        })?;
        Ok(Self::new(&key))
    }

    /// A fresh random key, base64 encoded.
    pub fn generate_key() -> String {
        let key = Aes256Gcm::generate_key(&mut OsRng);
        STANDARD.encode(key)
    }
}

impl std::fmt::Debug for AesGcmEncrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmEncrypter").finish_non_exhaustive()
    }
}

impl Encrypter for AesGcmEncrypter {
    fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| FieldsError::crypto(format!("AES-GCM encrypt failed: {e}")))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(out))
    }

    fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let blob = STANDARD
            .decode(ciphertext)
            .map_err(|e| FieldsError::crypto(format!("ciphertext is not base64: {e}")))?;
        if blob.len() < NONCE_LEN + TAG_LEN {
            return Err(FieldsError::crypto(format!(
                "ciphertext too short (expected at least {} bytes)",
                NONCE_LEN + TAG_LEN
            )));
        }

        let nonce = Nonce::from_slice(&blob[..NONCE_LEN]);
        let plaintext = self
            .cipher
            .decrypt(nonce, &blob[NONCE_LEN..])
            .map_err(|e| FieldsError::crypto(format!("AES-GCM decrypt failed: {e}")))?;

        String::from_utf8(plaintext)
            .map_err(|e| FieldsError::crypto(format!("plaintext is not UTF-8: {e}")))
    }
}
