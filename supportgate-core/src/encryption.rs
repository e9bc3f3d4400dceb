//! CRM config encryption — AES-256-GCM for tenant `crm_config` at rest.
//!
//! Grounded on the teacher's `SessionEncryptor`, but keyed from the
//! process-wide `ENCRYPTION_KEY` environment variable rather than the OS
//! keyring: this process serves many tenants concurrently, so the key must
//! be available to every worker without per-user keyring prompts.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::TenantError;

/// Encrypts and decrypts tenant CRM config using AES-256-GCM.
pub struct ConfigEncryptor {
    cipher: Aes256Gcm,
}

impl ConfigEncryptor {
    /// Create an encryptor from a raw 32-byte key (from
    /// [`crate::config::GatewayProcessConfig::encryption_key_bytes`]).
    pub fn from_key(key: &[u8; 32]) -> Self {
        let cipher = Aes256Gcm::new_from_slice(key).expect("32-byte key is always valid");
        Self { cipher }
    }

    /// Encrypt plaintext CRM config JSON. Returns nonce (12 bytes) prepended
    /// to ciphertext, matching the registry's opaque-bytes storage contract.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, TenantError> {
        let mut nonce_bytes = [0u8; 12];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| TenantError::ConfigDecryptFailed {
                message: e.to_string(),
            })?;

        let mut result = Vec::with_capacity(12 + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Decrypt ciphertext produced by [`Self::encrypt`]. Fails with
    /// `ConfigDecryptFailed` on truncated input or authentication failure
    /// (§4.1): the registry never logs the decrypted credentials on error.
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, TenantError> {
        if ciphertext.len() < 12 {
            return Err(TenantError::ConfigDecryptFailed {
                message: "ciphertext too short to contain a nonce".into(),
            });
        }
        let (nonce_bytes, body) = ciphertext.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, body)
            .map_err(|_| TenantError::ConfigDecryptFailed {
                message: "authentication failed".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let key = [3u8; 32];
        let encryptor = ConfigEncryptor::from_key(&key);
        let plaintext = br#"{"webhook_secret":"s3cr3t"}"#;
        let ciphertext = encryptor.encrypt(plaintext).unwrap();
        assert_ne!(ciphertext, plaintext);
        let decrypted = encryptor.decrypt(&ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_decrypt_with_wrong_key_fails() {
        let encryptor_a = ConfigEncryptor::from_key(&[1u8; 32]);
        let encryptor_b = ConfigEncryptor::from_key(&[2u8; 32]);
        let ciphertext = encryptor_a.encrypt(b"secret").unwrap();
        assert!(encryptor_b.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn test_decrypt_truncated_fails() {
        let encryptor = ConfigEncryptor::from_key(&[1u8; 32]);
        assert!(encryptor.decrypt(&[1, 2, 3]).is_err());
    }
}
