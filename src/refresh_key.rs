//! Refresh keys: the subject id sealed with AES-256-GCM.
//!
//! A refresh key is opaque to the client and only ever used as a store
//! lookup key. Every sealing uses a fresh nonce, so two sessions of the
//! same subject get distinct keys, yet each one still opens to its owner.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::claims::SubjectId;

const NONCE_LEN: usize = 12;

/// Errors from sealing or opening refresh keys.
#[derive(Debug, thiserror::Error)]
pub enum RefreshKeyError {
    #[error("refresh key is not valid base64url")]
    Encoding,
    #[error("refresh key is too short")]
    Truncated,
    #[error("refresh key failed authentication")]
    Tampered,
    #[error("refresh key does not hold a subject id")]
    Malformed,
    #[error("encryption failed")]
    Encrypt,
}

/// Symmetric cipher for refresh keys.
#[derive(Clone)]
pub struct RefreshKeyCipher {
    cipher: Aes256Gcm,
}

impl RefreshKeyCipher {
    /// Derive the AES-256 key from an arbitrary-length secret.
    pub fn new(secret: &[u8]) -> Self {
        let key = Sha256::digest(secret);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Seal `subject_id` into a new refresh key (base64url of nonce || ciphertext).
    pub fn encrypt_refresh_key(&self, subject_id: SubjectId) -> Result<String, RefreshKeyError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, subject_id.to_string().as_bytes())
            .map_err(|_| RefreshKeyError::Encrypt)?;

        let mut sealed = nonce_bytes.to_vec();
        sealed.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    /// Open a refresh key and return the subject id it was sealed for.
    pub fn decrypt_refresh_key(&self, key: &str) -> Result<SubjectId, RefreshKeyError> {
        let sealed = URL_SAFE_NO_PAD
            .decode(key)
            .map_err(|_| RefreshKeyError::Encoding)?;

        if sealed.len() <= NONCE_LEN {
            return Err(RefreshKeyError::Truncated);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| RefreshKeyError::Tampered)?;

        std::str::from_utf8(&plaintext)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or(RefreshKeyError::Malformed)
    }
}
