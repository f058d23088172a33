//! Accounts database abstraction

use std::path::Path;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{Account, AccountId, AccountProvider, LoginState};

/// Per-profile accounts database
///
/// At most one account exists per provider id. Each account owns a directory
/// below [`AccountsDatabase::directory`].
///
/// Implementations:
/// - `FsAccountsDatabase` (app crate, JSON descriptors on disk)
#[async_trait]
pub trait AccountsDatabase: Send + Sync {
    /// Root directory of the database.
    fn directory(&self) -> &Path;

    /// All accounts, ordered by id.
    async fn accounts(&self) -> CoreResult<Vec<Account>>;

    async fn find(&self, id: &AccountId) -> CoreResult<Option<Account>>;

    async fn find_by_provider(&self, provider_id: &str) -> CoreResult<Option<Account>>;

    /// Create an account for `provider` in state `NotLoggedIn`.
    ///
    /// Fails with `DuplicateProvider` when an account for the provider exists.
    async fn create_account(&self, provider: &AccountProvider) -> CoreResult<Account>;

    /// Delete the account, its directory and its stored credentials.
    async fn delete_account(&self, id: &AccountId) -> CoreResult<()>;

    /// Persist and apply a new login state, returning the previous one.
    ///
    /// On failure the previous state remains in effect.
    async fn set_login_state(&self, id: &AccountId, state: LoginState) -> CoreResult<LoginState>;

    /// Replace the provider description of an account.
    ///
    /// Fails with `ProviderMismatch` when the provider id differs.
    async fn set_account_provider(
        &self,
        id: &AccountId,
        provider: &AccountProvider,
    ) -> CoreResult<()>;
}
