//! Credential Vault
//!
//! Seals tenant database credentials at rest with AES-256-GCM. Each call
//! draws a fresh 96-bit nonce, and the stored form is
//! `base64(nonce || ciphertext || tag)`. One key serves the whole process.

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

/// Environment variable holding the 32-byte key
pub const KEY_ENV: &str = "TENANT_ENCRYPTION_KEY";

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("TENANT_ENCRYPTION_KEY is not set")]
    MissingKey,
    #[error("encryption key must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("encryption failed")]
    Encrypt,
    #[error("decryption failed: {0}")]
    Decrypt(&'static str),
}

/// Process-wide symmetric cipher for tenant credentials
#[derive(Clone)]
pub struct Vault {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for Vault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Vault(..)")
    }
}

impl Vault {
    /// Build a vault from raw key material
    pub fn from_secret(secret: &[u8]) -> Result<Self, VaultError> {
        if secret.is_empty() {
            return Err(VaultError::MissingKey);
        }
        if secret.len() != KEY_LEN {
            return Err(VaultError::InvalidKeyLength(secret.len()));
        }
        let key = Key::<Aes256Gcm>::from_slice(secret);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Build a vault from `TENANT_ENCRYPTION_KEY`
    pub fn from_env() -> Result<Self, VaultError> {
        let secret = std::env::var(KEY_ENV).map_err(|_| VaultError::MissingKey)?;
        Self::from_secret(secret.as_bytes())
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| VaultError::Encrypt)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(combined))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, VaultError> {
        let combined = STANDARD
            .decode(encoded.trim())
            .map_err(|_| VaultError::Decrypt("invalid base64"))?;

        // nonce plus at least the 16-byte tag
        if combined.len() < NONCE_LEN + 16 {
            return Err(VaultError::Decrypt("ciphertext too short"));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| VaultError::Decrypt("authentication failed"))?;

        String::from_utf8(plaintext).map_err(|_| VaultError::Decrypt("plaintext is not UTF-8"))
    }
}
