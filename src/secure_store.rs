use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;
use std::fs;
use std::path::Path;

use crate::store::StoreError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// AES-256-GCM cipher for credentials persisted in the settings file
pub struct TokenCipher {
    key: [u8; KEY_LEN],
}

impl TokenCipher {
    pub fn from_key(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Load the key file, creating a fresh random key on first run
    pub fn load_or_create(key_path: &Path) -> Result<Self, StoreError> {
        if key_path.exists() {
            let encoded = fs::read_to_string(key_path)?;
            let mut key = [0u8; KEY_LEN];
            hex::decode_to_slice(encoded.trim(), &mut key)
                .map_err(|_| StoreError::Crypto("Failed to decode key file".to_string()))?;
            log::debug!("Loaded settings encryption key from {:?}", key_path);
            return Ok(Self { key });
        }

        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill(&mut key);

        if let Some(parent) = key_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(key_path, hex::encode(key))?;
        restrict_permissions(key_path)?;

        log::info!("Generated new settings encryption key");
        Ok(Self { key })
    }

    /// Encrypt a string value
    pub fn encrypt_value(&self, value: &str) -> Result<String, StoreError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| StoreError::Crypto("Failed to create cipher".to_string()))?;

        // Generate random nonce
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, value.as_bytes())
            .map_err(|_| StoreError::Crypto("Encryption failed".to_string()))?;

        // Combine nonce and ciphertext
        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(combined))
    }

    /// Decrypt a string value
    pub fn decrypt_value(&self, encrypted: &str) -> Result<String, StoreError> {
        let combined = general_purpose::STANDARD
            .decode(encrypted)
            .map_err(|_| StoreError::Crypto("Failed to decode encrypted value".to_string()))?;

        if combined.len() < NONCE_LEN {
            return Err(StoreError::Crypto("Invalid encrypted value".to_string()));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| StoreError::Crypto("Failed to create cipher".to_string()))?;

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| StoreError::Crypto("Decryption failed".to_string()))?;

        String::from_utf8(plaintext)
            .map_err(|_| StoreError::Crypto("Invalid UTF-8 in decrypted value".to_string()))
    }

    /// Decrypt a stored value, treating corruption as a missing value.
    pub fn decrypt_or_drop(&self, field: &str, encrypted: Option<&str>) -> Option<String> {
        let encrypted = encrypted?;
        match self.decrypt_value(encrypted) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("Decryption failed for '{}': {}. Data may be corrupted.", field, e);
                None
            }
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}
