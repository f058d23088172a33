//! Account types

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, AccountProvider, Credentials, LoginState};

/// An enrolled library account.
///
/// Snapshot of the accounts database; mutations go through
/// [`crate::traits::AccountsDatabase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: AccountId,
    pub provider: AccountProvider,
    /// Directory owned by this account (book database lives below it)
    pub directory: PathBuf,
    pub login_state: LoginState,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Credentials held by the current login state.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.login_state.credentials()
    }

    #[must_use]
    pub fn descriptor(&self) -> AccountDescriptor {
        AccountDescriptor {
            id: self.id,
            provider: self.provider.clone(),
            created_at: self.created_at,
        }
    }
}

/// The persisted, secret-free part of an account (`account.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDescriptor {
    pub id: AccountId,
    pub provider: AccountProvider,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: DateTime<Utc>,
}

impl AccountDescriptor {
    /// Rebuild the runtime account from its descriptor and stored state.
    #[must_use]
    pub fn into_account(self, directory: PathBuf, login_state: LoginState) -> Account {
        Account {
            id: self.id,
            provider: self.provider,
            directory,
            login_state,
            created_at: self.created_at,
        }
    }
}

/// Summary returned when account provider descriptions are refreshed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRefreshReport {
    /// Accounts whose provider description was replaced
    pub updated: usize,
    /// Accounts whose provider is no longer in the registry
    pub missing: usize,
    pub failed: usize,
}
