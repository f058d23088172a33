//! Credential storage abstraction

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreResult;
use crate::types::{AccountId, Credentials};

/// Credentials of every account, keyed by account id.
pub type CredentialsMap = HashMap<AccountId, Credentials>;

/// Credential store trait
///
/// Implementations:
/// - `InMemoryCredentialStore` (this crate, tests and ephemeral profiles)
/// - `FileCredentialStore` (app crate, AES-256-GCM sealed file)
/// - `KeyringCredentialStore` (app crate, system keyring)
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load every stored credential.
    ///
    /// Used once at startup to rebuild login states.
    async fn load_all(&self) -> CoreResult<CredentialsMap>;

    /// # Returns
    /// * `Ok(Some(credentials))` - stored
    /// * `Ok(None)` - nothing stored for this account
    async fn get(&self, account_id: &AccountId) -> CoreResult<Option<Credentials>>;

    /// Store credentials, replacing any previous value.
    async fn set(&self, account_id: &AccountId, credentials: &Credentials) -> CoreResult<()>;

    /// Remove credentials. Removing a missing entry is not an error.
    async fn remove(&self, account_id: &AccountId) -> CoreResult<()>;
}

/// In-memory credential store
#[derive(Clone, Default)]
pub struct InMemoryCredentialStore {
    credentials: Arc<RwLock<CredentialsMap>>,
}

impl InMemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `credentials`.
    #[must_use]
    pub fn with_credentials(credentials: CredentialsMap) -> Self {
        Self {
            credentials: Arc::new(RwLock::new(credentials)),
        }
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load_all(&self) -> CoreResult<CredentialsMap> {
        Ok(self.credentials.read().await.clone())
    }

    async fn get(&self, account_id: &AccountId) -> CoreResult<Option<Credentials>> {
        Ok(self.credentials.read().await.get(account_id).cloned())
    }

    async fn set(&self, account_id: &AccountId, credentials: &Credentials) -> CoreResult<()> {
        self.credentials
            .write()
            .await
            .insert(*account_id, credentials.clone());
        Ok(())
    }

    async fn remove(&self, account_id: &AccountId) -> CoreResult<()> {
        self.credentials.write().await.remove(account_id);
        Ok(())
    }
}
