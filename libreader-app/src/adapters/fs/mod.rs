//! Filesystem accounts database.
//!
//! Layout below the database directory:
//!
//! ```text
//! <dir>/<account uuid>/account.json                         descriptor
//! <dir>/<account uuid>/books/<book id>/entry.json           book entry
//! <dir>/<account uuid>/books/<book id>/rights-<format>.json DRM loan
//! ```
//!
//! Credentials are not written to the descriptor; they go to the injected
//! [`CredentialStore`] and decide the login state on reopen.

mod books;
pub(crate) mod io;
mod profiles;

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use libreader_core::error::{CoreError, CoreResult};
use libreader_core::traits::{AccountsDatabase, CredentialStore};
use libreader_core::types::{Account, AccountDescriptor, AccountId, AccountProvider, LoginState};

use io::{
    ensure_directory, read_json, remove_dir_if_exists, storage_error, write_json_atomic, TMP_SUFFIX,
};

pub use profiles::FsProfilesDatabase;

const DESCRIPTOR_FILE: &str = "account.json";

/// Accounts database stored as one directory per account.
///
/// Implements both [`AccountsDatabase`] and
/// [`BookDatabase`](libreader_core::traits::BookDatabase).
pub struct FsAccountsDatabase {
    directory: PathBuf,
    credentials: Arc<dyn CredentialStore>,
    accounts: RwLock<BTreeMap<AccountId, Account>>,
}

impl FsAccountsDatabase {
    /// Open the database at `directory`, creating it when missing.
    ///
    /// # Errors
    /// `CoreError::AccountsDatabaseOpen` listing every problem found when the
    /// path is not a directory or any account directory cannot be parsed.
    pub async fn open(
        directory: impl Into<PathBuf>,
        credentials: Arc<dyn CredentialStore>,
    ) -> CoreResult<Self> {
        let directory = directory.into();
        let open_error = |causes: Vec<String>| CoreError::AccountsDatabaseOpen {
            path: directory.display().to_string(),
            causes,
        };

        ensure_directory(&directory)
            .await
            .map_err(|cause| open_error(vec![cause]))?;

        let (descriptors, causes) = Self::scan(&directory)
            .await
            .map_err(|e| open_error(vec![e.to_string()]))?;
        if !causes.is_empty() {
            return Err(open_error(causes));
        }

        let mut stored = credentials.load_all().await?;
        let accounts: BTreeMap<_, _> = descriptors
            .into_iter()
            .map(|descriptor| {
                let id = descriptor.id;
                let account = descriptor.into_account(
                    directory.join(id.to_string()),
                    LoginState::restored(stored.remove(&id)),
                );
                (id, account)
            })
            .collect();
        if !stored.is_empty() {
            log::debug!(
                "Ignoring credentials of {} unknown accounts",
                stored.len()
            );
        }

        log::info!(
            "Opened accounts database {} with {} accounts",
            directory.display(),
            accounts.len()
        );
        Ok(Self {
            directory,
            credentials,
            accounts: RwLock::new(accounts),
        })
    }

    /// Read every account descriptor, collecting parse problems.
    async fn scan(directory: &Path) -> std::io::Result<(Vec<AccountDescriptor>, Vec<String>)> {
        let mut descriptors = Vec::new();
        let mut causes = Vec::new();
        let mut providers = HashSet::new();

        let mut dir = fs::read_dir(directory).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.file_type().await?.is_dir() || name.ends_with(TMP_SUFFIX) {
                log::debug!("Ignoring {name} in accounts database");
                continue;
            }
            match Self::parse_account(&entry.path(), &name).await {
                Ok(descriptor) => {
                    if providers.insert(descriptor.provider.id.clone()) {
                        descriptors.push(descriptor);
                    } else {
                        causes.push(format!(
                            "Could not parse account: {name}: duplicate provider {}",
                            descriptor.provider.id
                        ));
                    }
                }
                Err(reason) => causes.push(format!("Could not parse account: {name}: {reason}")),
            }
        }
        Ok((descriptors, causes))
    }

    async fn parse_account(path: &Path, name: &str) -> Result<AccountDescriptor, String> {
        let id: AccountId = name.parse().map_err(|_| "not a UUID".to_string())?;
        let descriptor: AccountDescriptor = read_json(&path.join(DESCRIPTOR_FILE))
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("missing {DESCRIPTOR_FILE}"))?;
        if descriptor.id != id {
            return Err(format!("descriptor id {} does not match", descriptor.id));
        }
        Ok(descriptor)
    }

    fn account_directory(&self, id: &AccountId) -> PathBuf {
        self.directory.join(id.to_string())
    }

    /// Directory of an existing account.
    pub(crate) async fn require_account_directory(&self, id: &AccountId) -> CoreResult<PathBuf> {
        self.accounts
            .read()
            .await
            .get(id)
            .map(|account| account.directory.clone())
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))
    }
}

#[async_trait]
impl AccountsDatabase for FsAccountsDatabase {
    fn directory(&self) -> &Path {
        &self.directory
    }

    async fn accounts(&self) -> CoreResult<Vec<Account>> {
        Ok(self.accounts.read().await.values().cloned().collect())
    }

    async fn find(&self, id: &AccountId) -> CoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn find_by_provider(&self, provider_id: &str) -> CoreResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|account| account.provider.id_str() == provider_id)
            .cloned())
    }

    async fn create_account(&self, provider: &AccountProvider) -> CoreResult<Account> {
        let mut accounts = self.accounts.write().await;
        if accounts
            .values()
            .any(|account| account.provider.id == provider.id)
        {
            return Err(CoreError::DuplicateProvider(provider.id.to_string()));
        }

        let id = AccountId::new();
        let directory = self.account_directory(&id);
        let account = Account {
            id,
            provider: provider.clone(),
            directory: directory.clone(),
            login_state: LoginState::NotLoggedIn,
            created_at: chrono::Utc::now(),
        };

        fs::create_dir_all(&directory)
            .await
            .map_err(|e| storage_error(&directory, e))?;
        if let Err(e) =
            write_json_atomic(&directory.join(DESCRIPTOR_FILE), &account.descriptor()).await
        {
            if let Err(cleanup) = remove_dir_if_exists(&directory).await {
                log::warn!("Cleanup: failed to remove {}: {cleanup}", directory.display());
            }
            return Err(e);
        }

        log::debug!("Created account directory {}", directory.display());
        accounts.insert(id, account.clone());
        Ok(account)
    }

    async fn delete_account(&self, id: &AccountId) -> CoreResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get(id)
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;

        remove_dir_if_exists(&account.directory).await?;
        accounts.remove(id);

        if let Err(e) = self.credentials.remove(id).await {
            log::warn!("Cleanup: failed to remove credentials of {id}: {e}");
        }
        Ok(())
    }

    async fn set_login_state(&self, id: &AccountId, state: LoginState) -> CoreResult<LoginState> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;

        match state.persistent_credentials() {
            Some(credentials) => self.credentials.set(id, credentials).await?,
            None => self.credentials.remove(id).await?,
        }

        Ok(std::mem::replace(&mut account.login_state, state))
    }

    async fn set_account_provider(
        &self,
        id: &AccountId,
        provider: &AccountProvider,
    ) -> CoreResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;
        if account.provider.id != provider.id {
            return Err(CoreError::ProviderMismatch {
                expected: account.provider.id.to_string(),
                actual: provider.id.to_string(),
            });
        }

        let mut descriptor = account.descriptor();
        descriptor.provider = provider.clone();
        write_json_atomic(&account.directory.join(DESCRIPTOR_FILE), &descriptor).await?;

        account.provider = provider.clone();
        Ok(())
    }
}
