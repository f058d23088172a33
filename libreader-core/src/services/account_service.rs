//! Account lifecycle service
//!
//! Enrollment, removal and provider-description refresh of accounts. Login
//! and logout run as tasks, see [`crate::services::TaskController`].

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::events::AccountEvent;
use crate::services::ServiceContext;
use crate::types::{Account, AccountId, AccountProvider, ProviderRefreshReport};

/// Account service
pub struct AccountService {
    ctx: Arc<ServiceContext>,
}

impl AccountService {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    // ===== Queries =====

    /// List all accounts
    pub async fn list_accounts(&self) -> CoreResult<Vec<Account>> {
        self.ctx.accounts_database().accounts().await
    }

    pub async fn get_account(&self, account_id: &AccountId) -> CoreResult<Option<Account>> {
        self.ctx.accounts_database().find(account_id).await
    }

    /// Like [`AccountService::get_account`], failing with `AccountNotFound`.
    pub async fn require_account(&self, account_id: &AccountId) -> CoreResult<Account> {
        self.get_account(account_id)
            .await?
            .ok_or_else(|| CoreError::AccountNotFound(account_id.to_string()))
    }

    // ===== Life cycle operations =====

    /// Enroll the provider `provider_id` as a new account.
    ///
    /// Publishes `CreationSucceeded` or `CreationFailed`.
    pub async fn create_account(&self, provider_id: &str) -> CoreResult<Account> {
        let result = self.create_account_inner(provider_id).await;
        match &result {
            Ok(account) => {
                log::info!("Created account {} for provider {provider_id}", account.id);
                self.ctx
                    .account_events()
                    .publish(AccountEvent::CreationSucceeded {
                        account_id: account.id,
                        provider_id: provider_id.to_string(),
                    });
            }
            Err(e) => {
                e.log(&format!("Failed to create account for {provider_id}"));
                self.ctx
                    .account_events()
                    .publish(AccountEvent::CreationFailed {
                        provider_id: provider_id.to_string(),
                        message: e.to_string(),
                    });
            }
        }
        result
    }

    async fn create_account_inner(&self, provider_id: &str) -> CoreResult<Account> {
        let provider = self
            .ctx
            .provider_registry()
            .find(provider_id)
            .await
            .ok_or_else(|| CoreError::ProviderNotFound(provider_id.to_string()))?;
        self.ctx.accounts_database().create_account(&provider).await
    }

    /// Delete an account with its books, directory and credentials.
    ///
    /// Failing to delete books is logged and does not stop the deletion.
    /// Publishes `DeletionSucceeded` or `DeletionFailed`.
    pub async fn delete_account(&self, account_id: &AccountId) -> CoreResult<()> {
        let result = self.delete_account_inner(account_id).await;
        match &result {
            Ok(provider_id) => {
                log::info!("Deleted account {account_id}");
                self.ctx
                    .account_events()
                    .publish(AccountEvent::DeletionSucceeded {
                        account_id: *account_id,
                        provider_id: provider_id.clone(),
                    });
            }
            Err(e) => {
                e.log(&format!("Failed to delete account {account_id}"));
                self.ctx
                    .account_events()
                    .publish(AccountEvent::DeletionFailed {
                        account_id: *account_id,
                        message: e.to_string(),
                    });
            }
        }
        result.map(|_| ())
    }

    async fn delete_account_inner(&self, account_id: &AccountId) -> CoreResult<String> {
        let account = self.require_account(account_id).await?;
        if let Err(e) = self.ctx.book_database().delete_all(account_id).await {
            log::warn!("Cleanup: failed to delete books of {account_id}: {e}");
        }
        self.ctx.accounts_database().delete_account(account_id).await?;
        Ok(account.provider.id.to_string())
    }

    /// Replace an account's provider description with a newer one of the
    /// same provider.
    pub async fn update_account_provider(
        &self,
        account_id: &AccountId,
        provider: &AccountProvider,
    ) -> CoreResult<()> {
        self.ctx
            .accounts_database()
            .set_account_provider(account_id, provider)
            .await
    }

    /// Bring every account's provider description up to date with the
    /// registry. Called at startup.
    pub async fn refresh_providers(&self) -> CoreResult<ProviderRefreshReport> {
        let mut report = ProviderRefreshReport::default();
        for account in self.list_accounts().await? {
            let Some(latest) = self
                .ctx
                .provider_registry()
                .find(account.provider.id.as_str())
                .await
            else {
                log::warn!(
                    "Provider {} of account {} is no longer registered",
                    account.provider.id,
                    account.id
                );
                report.missing += 1;
                continue;
            };
            if !latest.is_newer_than(&account.provider) {
                continue;
            }
            match self.update_account_provider(&account.id, &latest).await {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    e.log(&format!("Failed to refresh provider of account {}", account.id));
                    report.failed += 1;
                }
            }
        }
        log::info!(
            "Provider refresh: {} updated, {} missing, {} failed",
            report.updated,
            report.missing,
            report.failed
        );
        Ok(report)
    }
}
