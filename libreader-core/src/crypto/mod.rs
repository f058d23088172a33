//! Password-sealed blobs
//!
//! AES-256-GCM with a PBKDF2-derived key. Used to keep account credentials
//! encrypted at rest. Deriving the key is the expensive part, so a
//! [`SealingKey`] is derived once and reused for every write of a store.

mod versions;

pub use versions::{pbkdf2_iterations, CURRENT_SEAL_VERSION};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use pbkdf2::pbkdf2_hmac_array;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{CoreError, CoreResult};

const SALT_LENGTH: usize = 16;
const NONCE_LENGTH: usize = 12;
const KEY_LENGTH: usize = 32; // AES-256

/// Encrypted payload plus everything needed to open it again, except the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedBlob {
    pub version: u32,
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
}

/// AES key derived from a password and salt.
pub struct SealingKey {
    version: u32,
    salt: Vec<u8>,
    key: [u8; KEY_LENGTH],
}

impl SealingKey {
    /// Derive a key for a fresh random salt at the current version.
    pub fn generate(password: &str) -> Self {
        let mut salt = vec![0u8; SALT_LENGTH];
        rand::rng().fill_bytes(&mut salt);
        Self {
            version: CURRENT_SEAL_VERSION,
            key: derive_key(password, &salt, versions::CURRENT_ITERATIONS),
            salt,
        }
    }

    /// Re-derive the key that sealed `blob`.
    pub fn for_blob(password: &str, blob: &SealedBlob) -> CoreResult<Self> {
        let iterations = pbkdf2_iterations(blob.version).ok_or_else(|| {
            CoreError::CredentialError(format!("Unsupported sealed blob version: {}", blob.version))
        })?;
        let salt = BASE64
            .decode(&blob.salt)
            .map_err(|e| CoreError::SerializationError(format!("Invalid salt: {e}")))?;
        Ok(Self {
            version: blob.version,
            key: derive_key(password, &salt, iterations),
            salt,
        })
    }

    /// Encrypt `plaintext` under a fresh nonce.
    pub fn seal(&self, plaintext: &[u8]) -> CoreResult<SealedBlob> {
        let mut nonce_bytes = [0u8; NONCE_LENGTH];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CoreError::CredentialError(format!("Failed to create cipher: {e}")))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CoreError::CredentialError(format!("Encryption failed: {e}")))?;

        Ok(SealedBlob {
            version: self.version,
            salt: BASE64.encode(&self.salt),
            nonce: BASE64.encode(nonce_bytes),
            ciphertext: BASE64.encode(ciphertext),
        })
    }

    /// Decrypt a blob sealed with this key.
    pub fn open(&self, blob: &SealedBlob) -> CoreResult<Vec<u8>> {
        let nonce_bytes = BASE64
            .decode(&blob.nonce)
            .map_err(|e| CoreError::SerializationError(format!("Invalid nonce: {e}")))?;
        if nonce_bytes.len() != NONCE_LENGTH {
            return Err(CoreError::SerializationError(format!(
                "Invalid nonce length: {}",
                nonce_bytes.len()
            )));
        }
        let ciphertext = BASE64
            .decode(&blob.ciphertext)
            .map_err(|e| CoreError::SerializationError(format!("Invalid ciphertext: {e}")))?;

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| CoreError::CredentialError(format!("Failed to create cipher: {e}")))?;
        cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
            .map_err(|_| {
                CoreError::CredentialError(
                    "Decryption failed: invalid password or corrupted data".to_string(),
                )
            })
    }
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; KEY_LENGTH] {
    pbkdf2_hmac_array::<Sha256, KEY_LENGTH>(password.as_bytes(), salt, iterations)
}

/// One-shot convenience: derive a fresh key and seal.
pub fn seal(plaintext: &[u8], password: &str) -> CoreResult<SealedBlob> {
    SealingKey::generate(password).seal(plaintext)
}

/// One-shot convenience: derive the blob's key and open.
pub fn open(blob: &SealedBlob, password: &str) -> CoreResult<Vec<u8>> {
    SealingKey::for_blob(password, blob)?.open(blob)
}
