//! Platform-agnostic application bootstrap for libreader.
//!
//! Provides `AppState` (service container), `AppStateBuilder` (adapter
//! injection), the `AppConfig` file and the filesystem/keyring storage
//! adapters. Accounts live either directly in the data directory or, when a
//! profiles database is used, in the selected profile's directory.

pub mod adapters;
pub mod config;

use std::sync::Arc;

use libreader_core::error::{CoreError, CoreResult};
use libreader_core::services::{
    AccountService, ProfileService, ServiceContext, TaskController, TaskSettings,
};
use libreader_core::traits::{
    AccountsDatabase, BookDatabase, CredentialStore, DrmConnector, FeedLoader,
    InMemoryProviderRegistry, PatronClient, ProfilesDatabase, ProviderRegistry, TaskStrings,
};
use libreader_core::types::{Profile, ProviderRefreshReport};

use adapters::{FileCredentialStore, FsAccountsDatabase, FsProfilesDatabase};
pub use config::{AppConfig, CredentialStoreKind};

/// Platform-agnostic application state.
///
/// Holds the services and the `ServiceContext`. Every frontend constructs this
/// once at startup via `AppStateBuilder`.
pub struct AppState {
    /// Service context (holds all adapters and the event buses)
    pub ctx: Arc<ServiceContext>,
    /// Account service
    pub account_service: Arc<AccountService>,
    /// Runs login, logout and revoke tasks
    pub controller: TaskController,
    /// Present when the builder was given a profiles database
    pub profile_service: Option<Arc<ProfileService>>,
}

impl AppState {
    /// Run the startup sequence: refresh the provider description of every
    /// account from the registry.
    ///
    /// A failed refresh is logged and does not prevent startup.
    pub async fn run_startup(&self) -> ProviderRefreshReport {
        match self.account_service.refresh_providers().await {
            Ok(report) => report,
            Err(e) => {
                e.log("Failed to refresh account providers");
                ProviderRefreshReport::default()
            }
        }
    }
}

/// Open the credential store selected by `config`.
///
/// # Errors
/// `CoreError::ValidationError` when the file store has no password or the
/// keyring store is not compiled in.
pub fn open_credential_store(
    config: &AppConfig,
    password: Option<String>,
) -> CoreResult<Arc<dyn CredentialStore>> {
    match config.credential_store {
        CredentialStoreKind::File => {
            let password = password.ok_or_else(|| {
                CoreError::ValidationError("The credential file requires a password".to_string())
            })?;
            Ok(Arc::new(FileCredentialStore::new(
                config.credentials_file(),
                password,
            )))
        }
        #[cfg(feature = "keyring-store")]
        CredentialStoreKind::Keyring => Ok(Arc::new(adapters::KeyringCredentialStore::new())),
        #[cfg(not(feature = "keyring-store"))]
        CredentialStoreKind::Keyring => Err(CoreError::ValidationError(
            "Keyring support is not enabled in this build".to_string(),
        )),
    }
}

/// Open the accounts database kept directly in the data directory of `config`.
pub async fn open_accounts_database(
    config: &AppConfig,
    password: Option<String>,
) -> CoreResult<Arc<FsAccountsDatabase>> {
    let credentials = open_credential_store(config, password)?;
    let database = FsAccountsDatabase::open(config.accounts_dir(), credentials).await?;
    Ok(Arc::new(database))
}

/// Open the profiles database below the data directory of `config`.
pub async fn open_profiles_database(config: &AppConfig) -> CoreResult<Arc<FsProfilesDatabase>> {
    Ok(Arc::new(FsProfilesDatabase::open(config.profiles_dir()).await?))
}

/// Open the accounts database owned by `profile`.
pub async fn open_profile_accounts_database(
    config: &AppConfig,
    profile: &Profile,
    password: Option<String>,
) -> CoreResult<Arc<FsAccountsDatabase>> {
    let credentials = open_credential_store(config, password)?;
    let database = FsAccountsDatabase::open(profile.accounts_directory(), credentials).await?;
    Ok(Arc::new(database))
}

/// Builder for constructing `AppState` with platform-specific adapters.
///
/// # Required adapters
/// - `accounts_database`: how accounts are stored
/// - `book_database`: how book entries are stored
/// - `patron_client`: network login
/// - `feed_loader`: server-side loan revocation
///
/// # Optional
/// - `provider_registry`: defaults to `InMemoryProviderRegistry`
/// - `drm_connector`: no DRM support when absent
/// - `settings`: defaults to `TaskSettings::default()`
/// - `strings`: defaults to English step descriptions
/// - `profiles_database`: enables `AppState::profile_service`
#[derive(Default)]
pub struct AppStateBuilder {
    accounts_database: Option<Arc<dyn AccountsDatabase>>,
    book_database: Option<Arc<dyn BookDatabase>>,
    provider_registry: Option<Arc<dyn ProviderRegistry>>,
    patron_client: Option<Arc<dyn PatronClient>>,
    feed_loader: Option<Arc<dyn FeedLoader>>,
    drm_connector: Option<Arc<dyn DrmConnector>>,
    settings: Option<TaskSettings>,
    strings: Option<Arc<dyn TaskStrings>>,
    profiles_database: Option<Arc<dyn ProfilesDatabase>>,
}

impl AppStateBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn accounts_database(mut self, database: Arc<dyn AccountsDatabase>) -> Self {
        self.accounts_database = Some(database);
        self
    }

    #[must_use]
    pub fn book_database(mut self, database: Arc<dyn BookDatabase>) -> Self {
        self.book_database = Some(database);
        self
    }

    /// Use the filesystem database for both accounts and books.
    #[must_use]
    pub fn fs_database(self, database: &Arc<FsAccountsDatabase>) -> Self {
        self.accounts_database(database.clone())
            .book_database(database.clone())
    }

    #[must_use]
    pub fn provider_registry(mut self, registry: Arc<dyn ProviderRegistry>) -> Self {
        self.provider_registry = Some(registry);
        self
    }

    #[must_use]
    pub fn patron_client(mut self, client: Arc<dyn PatronClient>) -> Self {
        self.patron_client = Some(client);
        self
    }

    #[must_use]
    pub fn feed_loader(mut self, loader: Arc<dyn FeedLoader>) -> Self {
        self.feed_loader = Some(loader);
        self
    }

    #[must_use]
    pub fn drm_connector(mut self, connector: Arc<dyn DrmConnector>) -> Self {
        self.drm_connector = Some(connector);
        self
    }

    #[must_use]
    pub fn settings(mut self, settings: TaskSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    #[must_use]
    pub fn strings(mut self, strings: Arc<dyn TaskStrings>) -> Self {
        self.strings = Some(strings);
        self
    }

    #[must_use]
    pub fn profiles_database(mut self, database: Arc<dyn ProfilesDatabase>) -> Self {
        self.profiles_database = Some(database);
        self
    }

    /// Build the `AppState`.
    ///
    /// Must be called within a tokio runtime for tasks to be spawned.
    ///
    /// # Errors
    /// Returns `CoreError::ValidationError` if required adapters are missing.
    pub fn build(self) -> CoreResult<AppState> {
        let accounts_database = self.accounts_database.ok_or_else(|| {
            CoreError::ValidationError("accounts_database is required".to_string())
        })?;
        let book_database = self
            .book_database
            .ok_or_else(|| CoreError::ValidationError("book_database is required".to_string()))?;
        let patron_client = self
            .patron_client
            .ok_or_else(|| CoreError::ValidationError("patron_client is required".to_string()))?;
        let feed_loader = self
            .feed_loader
            .ok_or_else(|| CoreError::ValidationError("feed_loader is required".to_string()))?;
        let provider_registry = self
            .provider_registry
            .unwrap_or_else(|| Arc::new(InMemoryProviderRegistry::new()));

        let settings = self.settings.unwrap_or_default();
        let profile_service = self
            .profiles_database
            .map(|database| Arc::new(ProfileService::new(database, settings.event_capacity)));

        let mut ctx = ServiceContext::new(
            accounts_database,
            book_database,
            provider_registry,
            patron_client,
            feed_loader,
            settings,
        );
        if let Some(connector) = self.drm_connector {
            ctx = ctx.with_drm(connector);
        }
        if let Some(strings) = self.strings {
            ctx = ctx.with_strings(strings);
        }
        let ctx = Arc::new(ctx);

        Ok(AppState {
            account_service: Arc::new(AccountService::new(Arc::clone(&ctx))),
            controller: TaskController::new(Arc::clone(&ctx)),
            profile_service,
            ctx,
        })
    }
}
