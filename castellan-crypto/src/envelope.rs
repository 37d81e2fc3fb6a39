//! AES-256-GCM encrypt-at-rest envelope.
//!
//! Wire format: `{"algorithm":"AES-GCM","ciphertext":"<base64 nonce||ct||tag>","keyID":"<thumbprint>"}`.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption key must be exactly 32 bytes for AES-256-GCM, got {0}")]
    InvalidKeyLength(usize),
    #[error("AES-GCM encryption failed")]
    EncryptFailed,
    #[error("AES-GCM decryption failed")]
    DecryptFailed,
    #[error("ciphertext too short to contain a nonce")]
    Truncated,
    #[error("invalid base64 ciphertext: {0}")]
    InvalidBase64(String),
    #[error("decrypted plaintext was not valid UTF-8")]
    InvalidUtf8,
    #[error("envelope key id {envelope} does not match this service's key id {service}")]
    KeyIdMismatch { envelope: String, service: String },
}

/// The at-rest wire envelope for an encrypted secret (e.g. a client secret).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncryptionEnvelope {
    pub algorithm: String,
    pub ciphertext: String,
    #[serde(rename = "keyID")]
    pub key_id: String,
}

/// Process-wide encryption service, initialised once from configuration.
/// Holds a single AES-256 key,
/// identified by `key_id` so the envelope is self-describing for future
/// key rotation.
#[derive(Clone)]
pub struct EncryptionService {
    key_id: String,
    key: [u8; 32],
}

impl EncryptionService {
    /// Construct from a raw 32-byte key (as decoded from the `hex`
    /// configuration value).
    pub fn new(key_id: impl Into<String>, key: &[u8]) -> Result<Self, EncryptionError> {
        if key.len() != 32 {
            return Err(EncryptionError::InvalidKeyLength(key.len()));
        }
        let mut fixed = [0u8; 32];
        fixed.copy_from_slice(key);
        Ok(Self {
            key_id: key_id.into(),
            key: fixed,
        })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<EncryptionEnvelope, EncryptionError> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| EncryptionError::EncryptFailed)?;

        let mut combined = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(EncryptionEnvelope {
            algorithm: "AES-GCM".to_string(),
            ciphertext: STANDARD.encode(combined),
            key_id: self.key_id.clone(),
        })
    }

    pub fn decrypt(&self, envelope: &EncryptionEnvelope) -> Result<String, EncryptionError> {
        if envelope.key_id != self.key_id {
            return Err(EncryptionError::KeyIdMismatch {
                envelope: envelope.key_id.clone(),
                service: self.key_id.clone(),
            });
        }

        let combined = STANDARD
            .decode(&envelope.ciphertext)
            .map_err(|e| EncryptionError::InvalidBase64(e.to_string()))?;

        if combined.len() < NONCE_LEN {
            return Err(EncryptionError::Truncated);
        }
        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| EncryptionError::DecryptFailed)?;

        String::from_utf8(plaintext).map_err(|_| EncryptionError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> EncryptionService {
        EncryptionService::new("k1", &[7u8; 32]).unwrap()
    }

    #[test]
    fn round_trips_a_client_secret() {
        let svc = service();
        let envelope = svc.encrypt("s3cr3t-client-secret").unwrap();
        assert_eq!(envelope.algorithm, "AES-GCM");
        assert_eq!(envelope.key_id, "k1");
        assert_eq!(svc.decrypt(&envelope).unwrap(), "s3cr3t-client-secret");
    }

    #[test]
    fn distinct_calls_use_distinct_nonces() {
        let svc = service();
        let a = svc.encrypt("same plaintext").unwrap();
        let b = svc.encrypt("same plaintext").unwrap();
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn rejects_mismatched_key_id() {
        let svc = service();
        let other = EncryptionService::new("k2", &[7u8; 32]).unwrap();
        let envelope = svc.encrypt("x").unwrap();
        assert!(matches!(
            other.decrypt(&envelope),
            Err(EncryptionError::KeyIdMismatch { .. })
        ));
    }

    #[test]
    fn rejects_wrong_key_length() {
        assert!(matches!(
            EncryptionService::new("k1", &[0u8; 16]),
            Err(EncryptionError::InvalidKeyLength(16))
        ));
    }
}
