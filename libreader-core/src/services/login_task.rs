//! Account login task

use std::sync::Arc;

use crate::events::AccountEvent;
use crate::services::{lookup_account, record_failure, restore_login_state, Recorded, ServiceContext};
use crate::taskrecorder::{TaskRecorder, TaskResult};
use crate::traits::{PatronError, StepText};
use crate::types::{
    Account, AccountId, AccountProvider, Credentials, LoginError, LoginState,
    ProviderAuthentication,
};

/// Logs an account in with patron-supplied credentials.
///
/// On success the account is `LoggedIn` with the credentials (plus any DRM
/// activation data). On failure the login state held before the task is
/// restored.
pub struct AccountLoginTask {
    ctx: Arc<ServiceContext>,
    account_id: AccountId,
    credentials: Credentials,
}

impl AccountLoginTask {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, account_id: AccountId, credentials: Credentials) -> Self {
        Self {
            ctx,
            account_id,
            credentials,
        }
    }

    #[must_use]
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Run the task, publishing one terminal account event.
    pub async fn run(self) -> TaskResult<LoginError, Credentials> {
        log::info!("Logging in account {}", self.account_id);
        let mut recorder = TaskRecorder::new();
        let result = match self.execute(&mut recorder).await {
            Ok(credentials) => recorder.finish_success(credentials),
            Err(Recorded) => recorder.finish_failure(),
        };

        let event = if result.is_success() {
            log::info!("Account {} logged in", self.account_id);
            AccountEvent::LoginSucceeded {
                account_id: self.account_id,
            }
        } else {
            log::warn!(
                "Login of account {} failed: {}",
                self.account_id,
                result.last_failure_message().unwrap_or_default()
            );
            AccountEvent::LoginFailed {
                account_id: self.account_id,
                error: result.last_error().cloned(),
                message: result.last_failure_message().unwrap_or_default().to_string(),
            }
        };
        self.ctx.account_events().publish(event);
        result
    }

    async fn execute(
        &self,
        recorder: &mut TaskRecorder<LoginError>,
    ) -> Result<Credentials, Recorded> {
        let account = lookup_account(
            &self.ctx,
            recorder,
            &self.account_id,
            LoginError::AccountNotFound,
            LoginError::Persistence,
        )
        .await?;

        recorder.begin_new_step(self.ctx.text(StepText::LoginValidate));
        if let Err(error) = validate_credentials(&account.provider, &self.credentials) {
            recorder.current_step_failed(error.to_string(), error, None);
            return Err(Recorded);
        }
        recorder.current_step_succeeded(self.ctx.text(StepText::LoginValidated));

        let previous = match self
            .ctx
            .accounts_database()
            .set_login_state(&self.account_id, LoginState::LoggingIn)
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                e.log("Failed to enter logging-in state");
                return Err(record_failure(recorder, LoginError::Persistence(e.to_string()), e));
            }
        };

        match self.authenticate_and_save(&account, recorder).await {
            Ok(credentials) => Ok(credentials),
            Err(Recorded) => {
                restore_login_state(&self.ctx, &self.account_id, previous).await;
                Err(Recorded)
            }
        }
    }

    async fn authenticate_and_save(
        &self,
        account: &Account,
        recorder: &mut TaskRecorder<LoginError>,
    ) -> Result<Credentials, Recorded> {
        recorder.begin_new_step(self.ctx.text(StepText::LoginAuthenticate));
        let profile = match self
            .ctx
            .patron_client()
            .authenticate(&account.provider, &self.credentials)
            .await
        {
            Ok(profile) => profile,
            Err(e) => {
                log::warn!("Authentication against {} failed: {e}", account.provider.id);
                let error = match &e {
                    PatronError::InvalidCredentials => LoginError::InvalidCredentials,
                    PatronError::Server { status, message } => LoginError::ServerError {
                        status: *status,
                        message: message.clone(),
                    },
                    PatronError::Connection(message) => {
                        LoginError::ConnectionFailed(message.clone())
                    }
                };
                return Err(record_failure(recorder, error, e));
            }
        };
        recorder.current_step_succeeded(self.ctx.text(StepText::LoginAuthenticated));

        let mut drm = profile.drm.or_else(|| self.credentials.drm().cloned());
        if let Some(pre) = drm.as_mut().filter(|d| !d.is_device_active()) {
            recorder.begin_new_step(self.ctx.text(StepText::LoginActivateDevice));
            if let Some(connector) = self.ctx.drm_connector() {
                match connector.activate_device(pre).await {
                    Ok(post) => {
                        pre.post_activation = Some(post);
                        recorder.current_step_succeeded(self.ctx.text(StepText::LoginDeviceActivated));
                    }
                    Err(e) => {
                        log::error!("DRM activation with {} failed: {e}", connector.system());
                        let error = LoginError::DrmActivationFailed {
                            system: connector.system().to_string(),
                            code: e.code().map_or_else(|| e.to_string(), str::to_string),
                        };
                        return Err(record_failure(recorder, error, e));
                    }
                }
            } else {
                log::warn!(
                    "Account {} has DRM credentials but no DRM connector is configured",
                    self.account_id
                );
                recorder.current_step_succeeded(self.ctx.text(StepText::LoginNoDrmConnector));
            }
        }

        let credentials = self.credentials.with_drm(drm);
        recorder.begin_new_step(self.ctx.text(StepText::LoginSaveState));
        if let Err(e) = self
            .ctx
            .accounts_database()
            .set_login_state(&self.account_id, LoginState::logged_in(credentials.clone()))
            .await
        {
            e.log("Failed to save login state");
            return Err(record_failure(recorder, LoginError::Persistence(e.to_string()), e));
        }
        recorder.current_step_succeeded(self.ctx.text(StepText::LoginStateSaved));
        Ok(credentials)
    }
}

/// Check credentials against what the provider accepts, without side effects.
fn validate_credentials(
    provider: &AccountProvider,
    credentials: &Credentials,
) -> Result<(), LoginError> {
    let incomplete = |field: &str| LoginError::CredentialsIncomplete {
        field: field.to_string(),
    };
    match (&provider.authentication, credentials) {
        (
            ProviderAuthentication::Basic { pin_required, .. },
            Credentials::Basic {
                username, password, ..
            },
        ) => {
            if username.trim().is_empty() {
                return Err(incomplete("username"));
            }
            if *pin_required && password.is_empty() {
                return Err(incomplete("password"));
            }
            Ok(())
        }
        (
            ProviderAuthentication::OAuthWithIntermediary { .. },
            Credentials::OAuthWithIntermediary { access_token, .. },
        ) => {
            if access_token.is_empty() {
                return Err(incomplete("access_token"));
            }
            Ok(())
        }
        (ProviderAuthentication::Anonymous, _) => Err(LoginError::UnsupportedAuthentication(
            format!("{} does not require login", provider.id),
        )),
        (_, credentials) => Err(LoginError::UnsupportedAuthentication(format!(
            "{} does not accept {} credentials",
            provider.id,
            credentials.kind()
        ))),
    }
}
