//! Password-sealed credential file.
//!
//! All credentials are kept as one JSON map, sealed with AES-256-GCM
//! (see [`libreader_core::crypto`]) and written atomically.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use libreader_core::crypto::{SealedBlob, SealingKey};
use libreader_core::error::{CoreError, CoreResult};
use libreader_core::traits::{CredentialStore, CredentialsMap};
use libreader_core::types::{AccountId, Credentials};

use super::fs::io::{read_json, write_json_atomic};

/// Decrypted file contents and the key to seal them again.
struct Unsealed {
    key: Arc<SealingKey>,
    credentials: CredentialsMap,
}

/// Credential store backed by a sealed JSON file.
///
/// The key is derived on first access and kept for the lifetime of the store.
pub struct FileCredentialStore {
    path: PathBuf,
    password: String,
    state: Mutex<Option<Unsealed>>,
}

impl FileCredentialStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            password: password.into(),
            state: Mutex::new(None),
        }
    }

    /// Read and decrypt the file, or start empty when there is none.
    async fn unseal(&self) -> CoreResult<Unsealed> {
        let blob: Option<SealedBlob> = read_json(&self.path).await?;
        let password = self.password.clone();

        let unsealed = tokio::task::spawn_blocking(move || -> CoreResult<Unsealed> {
            let Some(blob) = blob else {
                return Ok(Unsealed {
                    key: Arc::new(SealingKey::generate(&password)),
                    credentials: CredentialsMap::new(),
                });
            };
            let key = SealingKey::for_blob(&password, &blob)?;
            let plaintext = key.open(&blob)?;
            let credentials = serde_json::from_slice(&plaintext)
                .map_err(|e| CoreError::SerializationError(e.to_string()))?;
            Ok(Unsealed {
                key: Arc::new(key),
                credentials,
            })
        })
        .await
        .map_err(|e| CoreError::CredentialError(format!("Task join error: {e}")))??;

        log::info!(
            "Loaded {} credentials from {}",
            unsealed.credentials.len(),
            self.path.display()
        );
        Ok(unsealed)
    }

    async fn write(&self, key: &SealingKey, credentials: &CredentialsMap) -> CoreResult<()> {
        let plaintext = serde_json::to_vec(credentials)
            .map_err(|e| CoreError::SerializationError(e.to_string()))?;
        let blob = key.seal(&plaintext)?;
        write_json_atomic(&self.path, &blob).await
    }

    /// Apply `change` to the stored map and persist it.
    ///
    /// The in-memory copy is only updated once the file is written.
    async fn update(&self, change: impl FnOnce(&mut CredentialsMap)) -> CoreResult<()> {
        let mut state = self.state.lock().await;
        if state.is_none() {
            *state = Some(self.unseal().await?);
        }
        let Some(unsealed) = state.as_mut() else {
            return Err(CoreError::CredentialError("Credential store unavailable".to_string()));
        };

        let mut credentials = unsealed.credentials.clone();
        change(&mut credentials);
        if credentials == unsealed.credentials {
            return Ok(());
        }
        self.write(&unsealed.key, &credentials).await?;
        unsealed.credentials = credentials;
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load_all(&self) -> CoreResult<CredentialsMap> {
        let mut state = self.state.lock().await;
        if let Some(unsealed) = state.as_ref() {
            return Ok(unsealed.credentials.clone());
        }
        let unsealed = self.unseal().await?;
        let credentials = unsealed.credentials.clone();
        *state = Some(unsealed);
        Ok(credentials)
    }

    async fn get(&self, account_id: &AccountId) -> CoreResult<Option<Credentials>> {
        Ok(self.load_all().await?.remove(account_id))
    }

    async fn set(&self, account_id: &AccountId, credentials: &Credentials) -> CoreResult<()> {
        self.update(|all| {
            all.insert(*account_id, credentials.clone());
        })
        .await?;
        log::info!("Credentials saved for account: {account_id}");
        Ok(())
    }

    async fn remove(&self, account_id: &AccountId) -> CoreResult<()> {
        self.update(|all| {
            all.remove(account_id);
        })
        .await?;
        log::info!("Credentials deleted for account: {account_id}");
        Ok(())
    }
}
