//! Account logout task

use std::sync::Arc;

use crate::events::AccountEvent;
use crate::services::{lookup_account, record_failure, restore_login_state, Recorded, ServiceContext};
use crate::taskrecorder::{TaskRecorder, TaskResult};
use crate::traits::StepText;
use crate::types::{AccountId, Credentials, LoginState, LogoutError};

/// Logs an account out: deactivates the DRM device, forgets the credentials
/// and then deletes local books.
///
/// A failure to delete books is reported, but the account stays logged out.
pub struct AccountLogoutTask {
    ctx: Arc<ServiceContext>,
    account_id: AccountId,
}

impl AccountLogoutTask {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, account_id: AccountId) -> Self {
        Self { ctx, account_id }
    }

    #[must_use]
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Run the task, publishing one terminal account event.
    pub async fn run(self) -> TaskResult<LogoutError, ()> {
        log::info!("Logging out account {}", self.account_id);
        let mut recorder = TaskRecorder::new();
        let result = match self.execute(&mut recorder).await {
            Ok(()) => recorder.finish_success(()),
            Err(Recorded) => recorder.finish_failure(),
        };

        let event = if result.is_success() {
            log::info!("Account {} logged out", self.account_id);
            AccountEvent::LogoutSucceeded {
                account_id: self.account_id,
            }
        } else {
            AccountEvent::LogoutFailed {
                account_id: self.account_id,
                error: result.last_error().cloned(),
                message: result.last_failure_message().unwrap_or_default().to_string(),
            }
        };
        self.ctx.account_events().publish(event);
        result
    }

    async fn execute(&self, recorder: &mut TaskRecorder<LogoutError>) -> Result<(), Recorded> {
        let account = lookup_account(
            &self.ctx,
            recorder,
            &self.account_id,
            LogoutError::AccountNotFound,
            LogoutError::Persistence,
        )
        .await?;

        let Some(credentials) = account.credentials().cloned() else {
            recorder.begin_new_step(self.ctx.text(StepText::LogoutSaveState));
            self.save_not_logged_in(recorder).await?;
            recorder.current_step_succeeded(self.ctx.text(StepText::LogoutNotLoggedIn));
            return Ok(());
        };

        if let Err(e) = self
            .ctx
            .accounts_database()
            .set_login_state(
                &self.account_id,
                LoginState::LoggingOut {
                    credentials: credentials.clone(),
                },
            )
            .await
        {
            e.log("Failed to enter logging-out state");
            return Err(record_failure(recorder, LogoutError::Persistence(e.to_string()), e));
        }

        if let Err(Recorded) = self.logout_with(&credentials, recorder).await {
            restore_login_state(&self.ctx, &self.account_id, LoginState::logged_in(credentials))
                .await;
            return Err(Recorded);
        }
        // The account stays logged out even if some books cannot be deleted.
        self.delete_books(recorder).await
    }

    async fn logout_with(
        &self,
        credentials: &Credentials,
        recorder: &mut TaskRecorder<LogoutError>,
    ) -> Result<(), Recorded> {
        if let (Some(connector), Some(drm), Some(activation)) = (
            self.ctx.drm_connector(),
            credentials.drm(),
            credentials.drm_post_activation(),
        ) {
            recorder.begin_new_step(self.ctx.text(StepText::LogoutDeactivateDevice));
            if let Err(e) = connector.deactivate_device(drm, activation).await {
                log::error!("DRM deactivation with {} failed: {e}", connector.system());
                let error = LogoutError::DrmDeactivationFailed {
                    system: connector.system().to_string(),
                    code: e.code().map_or_else(|| e.to_string(), str::to_string),
                };
                return Err(record_failure(recorder, error, e));
            }
            recorder.current_step_succeeded(self.ctx.text(StepText::LogoutDeviceDeactivated));
        }

        recorder.begin_new_step(self.ctx.text(StepText::LogoutSaveState));
        self.save_not_logged_in(recorder).await?;
        recorder.current_step_succeeded(self.ctx.text(StepText::LogoutStateSaved));
        Ok(())
    }

    async fn delete_books(&self, recorder: &mut TaskRecorder<LogoutError>) -> Result<(), Recorded> {
        recorder.begin_new_step(self.ctx.text(StepText::LogoutDeleteBooks));
        match self.ctx.book_database().delete_all(&self.account_id).await {
            Ok(count) => {
                log::debug!("Deleted {count} books of account {}", self.account_id);
                recorder.current_step_succeeded(self.ctx.text(StepText::LogoutBooksDeleted));
                Ok(())
            }
            Err(e) => {
                e.log("Logged out, but failed to delete local books");
                let error = LogoutError::Persistence(e.to_string());
                recorder.current_step_failed(
                    self.ctx.text(StepText::LogoutBooksRemain),
                    error,
                    Some(Arc::new(e)),
                );
                Err(Recorded)
            }
        }
    }

    async fn save_not_logged_in(
        &self,
        recorder: &mut TaskRecorder<LogoutError>,
    ) -> Result<(), Recorded> {
        match self
            .ctx
            .accounts_database()
            .set_login_state(&self.account_id, LoginState::NotLoggedIn)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                e.log("Failed to save logout state");
                Err(record_failure(recorder, LogoutError::Persistence(e.to_string()), e))
            }
        }
    }
}
