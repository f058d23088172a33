//! Business services and account tasks

mod account_service;
mod controller;
mod login_task;
mod logout_task;
mod profile_service;
mod profile_update_task;
mod revoke_task;

pub use account_service::AccountService;
pub use controller::TaskController;
pub use login_task::AccountLoginTask;
pub use logout_task::AccountLogoutTask;
pub use profile_service::ProfileService;
pub use profile_update_task::{ProfileDisplayNameUpdateTask, ProfilePreferencesUpdateTask};
pub use revoke_task::BookRevokeTask;

use std::sync::Arc;
use std::time::Duration;

use crate::events::{AccountEvent, BookEvent, EventBus};
use crate::taskrecorder::TaskRecorder;
use crate::traits::{
    AccountsDatabase, BookDatabase, DrmConnector, EnglishTaskStrings, FeedLoader, PatronClient,
    ProviderRegistry, StepText, TaskStrings,
};
use crate::types::{Account, AccountId, LoginState};

/// Tunables for task execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSettings {
    /// How long a loan return waits for the DRM connector's answer
    pub drm_response_timeout: Duration,
    /// Upper bound on tasks running at once
    pub max_concurrent_tasks: usize,
    /// Events buffered per subscriber before it lags
    pub event_capacity: usize,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            drm_response_timeout: Duration::from_secs(60),
            max_concurrent_tasks: 4,
            event_capacity: 256,
        }
    }
}

/// Service context - holds every dependency
///
/// The platform layer creates this context and injects its storage and
/// network implementations.
pub struct ServiceContext {
    accounts_database: Arc<dyn AccountsDatabase>,
    book_database: Arc<dyn BookDatabase>,
    provider_registry: Arc<dyn ProviderRegistry>,
    patron_client: Arc<dyn PatronClient>,
    feed_loader: Arc<dyn FeedLoader>,
    /// Absent when the build has no DRM support
    drm_connector: Option<Arc<dyn DrmConnector>>,
    strings: Arc<dyn TaskStrings>,
    account_events: EventBus<AccountEvent>,
    book_events: EventBus<BookEvent>,
    settings: TaskSettings,
}

impl ServiceContext {
    #[must_use]
    pub fn new(
        accounts_database: Arc<dyn AccountsDatabase>,
        book_database: Arc<dyn BookDatabase>,
        provider_registry: Arc<dyn ProviderRegistry>,
        patron_client: Arc<dyn PatronClient>,
        feed_loader: Arc<dyn FeedLoader>,
        settings: TaskSettings,
    ) -> Self {
        Self {
            accounts_database,
            book_database,
            provider_registry,
            patron_client,
            feed_loader,
            drm_connector: None,
            strings: Arc::new(EnglishTaskStrings),
            account_events: EventBus::new(settings.event_capacity),
            book_events: EventBus::new(settings.event_capacity),
            settings,
        }
    }

    #[must_use]
    pub fn with_drm(mut self, connector: Arc<dyn DrmConnector>) -> Self {
        self.drm_connector = Some(connector);
        self
    }

    #[must_use]
    pub fn with_strings(mut self, strings: Arc<dyn TaskStrings>) -> Self {
        self.strings = strings;
        self
    }

    #[must_use]
    pub fn accounts_database(&self) -> &dyn AccountsDatabase {
        self.accounts_database.as_ref()
    }

    #[must_use]
    pub fn book_database(&self) -> &dyn BookDatabase {
        self.book_database.as_ref()
    }

    #[must_use]
    pub fn provider_registry(&self) -> &dyn ProviderRegistry {
        self.provider_registry.as_ref()
    }

    #[must_use]
    pub fn patron_client(&self) -> &dyn PatronClient {
        self.patron_client.as_ref()
    }

    #[must_use]
    pub fn feed_loader(&self) -> &dyn FeedLoader {
        self.feed_loader.as_ref()
    }

    #[must_use]
    pub fn drm_connector(&self) -> Option<&dyn DrmConnector> {
        self.drm_connector.as_deref()
    }

    #[must_use]
    pub fn account_events(&self) -> &EventBus<AccountEvent> {
        &self.account_events
    }

    #[must_use]
    pub fn book_events(&self) -> &EventBus<BookEvent> {
        &self.book_events
    }

    #[must_use]
    pub fn settings(&self) -> &TaskSettings {
        &self.settings
    }

    pub(crate) fn text(&self, key: StepText) -> String {
        self.strings.text(key)
    }
}

/// Marker returned by task bodies once a failure has been recorded.
#[derive(Debug)]
pub(crate) struct Recorded;

/// Record a failed step from a collaborator error, keeping it as the cause.
pub(crate) fn record_failure<E, C>(recorder: &mut TaskRecorder<E>, error: E, cause: C) -> Recorded
where
    E: Clone + std::fmt::Display,
    C: std::error::Error + Send + Sync + 'static,
{
    recorder.current_step_failed(error.to_string(), error, Some(Arc::new(cause)));
    Recorded
}

/// First step shared by every account task: resolve the account.
pub(crate) async fn lookup_account<E>(
    ctx: &ServiceContext,
    recorder: &mut TaskRecorder<E>,
    account_id: &AccountId,
    not_found: impl FnOnce(String) -> E,
    storage: impl FnOnce(String) -> E,
) -> Result<Account, Recorded>
where
    E: Clone + std::fmt::Display,
{
    recorder.begin_new_step(ctx.text(StepText::AccountLookup));
    match ctx.accounts_database().find(account_id).await {
        Ok(Some(account)) => {
            recorder.current_step_succeeded(ctx.text(StepText::AccountFound));
            Ok(account)
        }
        Ok(None) => {
            let error = not_found(account_id.to_string());
            recorder.current_step_failed(ctx.text(StepText::AccountMissing), error, None);
            Err(Recorded)
        }
        Err(e) => {
            e.log("Account lookup failed");
            Err(record_failure(recorder, storage(e.to_string()), e))
        }
    }
}

/// Put back a login state after a failed task. Errors are only logged.
pub(crate) async fn restore_login_state(
    ctx: &ServiceContext,
    account_id: &AccountId,
    state: LoginState,
) {
    if let Err(e) = ctx
        .accounts_database()
        .set_login_state(account_id, state)
        .await
    {
        e.log(&format!("Failed to restore login state of account {account_id}"));
    }
}
