//! Keyring-based credential store.
//!
//! Uses the system keychain (macOS Keychain, Windows Credential Manager,
//! Linux Secret Service) via the `keyring` crate.

use async_trait::async_trait;
use keyring::Entry;
use tokio::sync::RwLock;

use libreader_core::error::{CoreError, CoreResult};
use libreader_core::traits::{CredentialStore, CredentialsMap};
use libreader_core::types::{AccountId, Credentials};

const SERVICE_NAME: &str = "libreader";
const CREDENTIALS_KEY: &str = "account-credentials";

fn join_error(e: tokio::task::JoinError) -> CoreError {
    CoreError::CredentialError(format!("Task join error: {e}"))
}

/// Keyring-based credential store.
///
/// Stores the credentials of every account as a single JSON map in the
/// system keychain, cached after the first read.
pub struct KeyringCredentialStore {
    cache: RwLock<Option<CredentialsMap>>,
}

impl KeyringCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(None),
        }
    }

    fn get_entry() -> CoreResult<Entry> {
        Entry::new(SERVICE_NAME, CREDENTIALS_KEY)
            .map_err(|e| CoreError::CredentialError(e.to_string()))
    }

    fn read_all_sync() -> CoreResult<CredentialsMap> {
        let json = match Self::get_entry()?.get_password() {
            Ok(json) => json,
            Err(keyring::Error::NoEntry) => return Ok(CredentialsMap::new()),
            Err(e) => return Err(CoreError::CredentialError(e.to_string())),
        };
        if json.trim().is_empty() {
            return Ok(CredentialsMap::new());
        }
        serde_json::from_str(&json).map_err(|e| CoreError::SerializationError(e.to_string()))
    }

    fn write_all_sync(credentials: &CredentialsMap) -> CoreResult<()> {
        let json = serde_json::to_string(credentials)
            .map_err(|e| CoreError::SerializationError(e.to_string()))?;
        Self::get_entry()?
            .set_password(&json)
            .map_err(|e| CoreError::CredentialError(e.to_string()))
    }

    /// Apply `change` to the stored map and write it back to the keychain.
    async fn update(&self, change: impl FnOnce(&mut CredentialsMap)) -> CoreResult<()> {
        let mut cache = self.cache.write().await;

        let mut all_creds = match cache.clone() {
            Some(creds) => creds,
            None => tokio::task::spawn_blocking(Self::read_all_sync)
                .await
                .map_err(join_error)??,
        };
        change(&mut all_creds);

        let creds_for_save = all_creds.clone();
        tokio::task::spawn_blocking(move || Self::write_all_sync(&creds_for_save))
            .await
            .map_err(join_error)??;

        *cache = Some(all_creds);
        Ok(())
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for KeyringCredentialStore {
    async fn load_all(&self) -> CoreResult<CredentialsMap> {
        {
            let cache = self.cache.read().await;
            if let Some(ref creds) = *cache {
                return Ok(creds.clone());
            }
        }

        let mut cache = self.cache.write().await;
        if let Some(ref creds) = *cache {
            return Ok(creds.clone());
        }

        let credentials = tokio::task::spawn_blocking(|| {
            log::debug!("Loading all credentials from Keychain");
            Self::read_all_sync()
        })
        .await
        .map_err(join_error)??;

        *cache = Some(credentials.clone());
        log::info!("Loaded {} accounts from Keychain", credentials.len());
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
