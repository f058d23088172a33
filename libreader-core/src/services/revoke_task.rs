//! Book revocation task

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;

use crate::events::BookEvent;
use crate::services::{lookup_account, record_failure, Recorded, ServiceContext};
use crate::taskrecorder::{TaskRecorder, TaskResult};
use crate::traits::{DrmError, LoanReturnOutcome, LoanReturnReply, StepText};
use crate::types::{Account, AccountId, BookEntry, BookId, DrmLoan, RevokeError};

/// A DRM connector panicked while handling a request.
#[derive(Error, Debug)]
#[error("DRM connector panicked: {0}")]
struct ConnectorPanic(String);

/// Returns a book: gives the DRM loan back, notifies the library and deletes
/// the local copy.
pub struct BookRevokeTask {
    ctx: Arc<ServiceContext>,
    account_id: AccountId,
    book_id: BookId,
}

impl BookRevokeTask {
    #[must_use]
    pub fn new(ctx: Arc<ServiceContext>, account_id: AccountId, book_id: BookId) -> Self {
        Self {
            ctx,
            account_id,
            book_id,
        }
    }

    #[must_use]
    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    /// Run the task, publishing one terminal book event.
    pub async fn run(self) -> TaskResult<RevokeError, ()> {
        log::info!("Revoking book {} of account {}", self.book_id, self.account_id);
        let mut recorder = TaskRecorder::new();
        let result = match self.execute(&mut recorder).await {
            Ok(()) => recorder.finish_success(()),
            Err(Recorded) => recorder.finish_failure(),
        };

        let event = if result.is_success() {
            log::info!("Book {} revoked", self.book_id);
            BookEvent::RevokeSucceeded {
                account_id: self.account_id,
                book_id: self.book_id.clone(),
            }
        } else {
            log::warn!(
                "Revocation of book {} failed: {}",
                self.book_id,
                result.last_failure_message().unwrap_or_default()
            );
            BookEvent::RevokeFailed {
                account_id: self.account_id,
                book_id: self.book_id.clone(),
                error: result.last_error().cloned(),
                message: result.last_failure_message().unwrap_or_default().to_string(),
            }
        };
        self.ctx.book_events().publish(event);
        result
    }

    async fn execute(&self, recorder: &mut TaskRecorder<RevokeError>) -> Result<(), Recorded> {
        let account = lookup_account(
            &self.ctx,
            recorder,
            &self.account_id,
            RevokeError::AccountNotFound,
            RevokeError::Persistence,
        )
        .await?;
        let entry = self.lookup_entry(recorder).await?;

        if let Some(loan) = entry.drm_rights() {
            self.return_loan(&account, loan, recorder).await?;
            self.clear_rights(recorder).await?;
        }

        if let Some(uri) = &entry.revoke_uri {
            recorder.begin_new_step(self.ctx.text(StepText::RevokeNotifyServer));
            if let Err(e) = self.ctx.feed_loader().revoke(&account, uri).await {
                log::warn!("Server revocation at {uri} failed: {e}");
                let error = RevokeError::ServerRevokeFailed {
                    message: e.to_string(),
                };
                return Err(record_failure(recorder, error, e));
            }
            recorder.current_step_succeeded(self.ctx.text(StepText::RevokeServerNotified));
        }

        recorder.begin_new_step(self.ctx.text(StepText::RevokeDeleteBook));
        if let Err(e) = self
            .ctx
            .book_database()
            .delete_entry(&self.account_id, &self.book_id)
            .await
        {
            e.log("Failed to delete revoked book");
            return Err(record_failure(recorder, RevokeError::Persistence(e.to_string()), e));
        }
        recorder.current_step_succeeded(self.ctx.text(StepText::RevokeBookDeleted));
        Ok(())
    }

    async fn lookup_entry(
        &self,
        recorder: &mut TaskRecorder<RevokeError>,
    ) -> Result<BookEntry, Recorded> {
        recorder.begin_new_step(self.ctx.text(StepText::RevokeBookLookup));
        match self
            .ctx
            .book_database()
            .entry(&self.account_id, &self.book_id)
            .await
        {
            Ok(Some(entry)) => {
                recorder.current_step_succeeded(self.ctx.text(StepText::RevokeBookFound));
                Ok(entry)
            }
            Ok(None) => {
                let error = RevokeError::BookNotFound(self.book_id.to_string());
                recorder.current_step_failed(self.ctx.text(StepText::RevokeBookMissing), error, None);
                Err(Recorded)
            }
            Err(e) => {
                e.log("Book lookup failed");
                Err(record_failure(recorder, RevokeError::Persistence(e.to_string()), e))
            }
        }
    }

    /// Give a DRM loan back to the vendor.
    ///
    /// Skipped when the loan is not returnable or no connector is configured.
    async fn return_loan(
        &self,
        account: &Account,
        loan: &DrmLoan,
        recorder: &mut TaskRecorder<RevokeError>,
    ) -> Result<(), Recorded> {
        recorder.begin_new_step(self.ctx.text(StepText::RevokeReturnLoan));
        if !loan.returnable {
            recorder.current_step_succeeded(self.ctx.text(StepText::RevokeLoanNotReturnable));
            return Ok(());
        }
        let Some(connector) = self.ctx.drm_connector() else {
            log::warn!("Book {} has a DRM loan but no DRM connector is configured", self.book_id);
            recorder.current_step_succeeded(self.ctx.text(StepText::RevokeNoDrmConnector));
            return Ok(());
        };
        let system = connector.system().to_string();

        let Some(credentials) = account.credentials() else {
            recorder.current_step_failed(
                RevokeError::NoCredentialsAvailable.to_string(),
                RevokeError::NoCredentialsAvailable,
                None,
            );
            return Err(Recorded);
        };
        let (Some(drm), Some(activation)) = (credentials.drm(), credentials.drm_post_activation())
        else {
            let error = RevokeError::DrmDeviceNotActive { system };
            recorder.current_step_failed(error.to_string(), error, None);
            return Err(Recorded);
        };

        let (reply, answer) = LoanReturnReply::channel();
        let submitted = AssertUnwindSafe(connector.return_loan(drm, activation, loan, reply))
            .catch_unwind()
            .await;
        match submitted {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(record_connector_error(recorder, &system, e)),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                log::error!("DRM connector {system} panicked returning loan {}: {message}", loan.loan_id);
                let error = RevokeError::DrmUnexpectedException {
                    system,
                    message: message.clone(),
                };
                return Err(record_failure(recorder, error, ConnectorPanic(message)));
            }
        }

        let timeout = self.ctx.settings().drm_response_timeout;
        match tokio::time::timeout(timeout, answer).await {
            Ok(Ok(LoanReturnOutcome::Returned)) => {
                recorder.current_step_succeeded(self.ctx.text(StepText::RevokeLoanReturned));
                Ok(())
            }
            Ok(Ok(LoanReturnOutcome::Failed { code })) => {
                log::warn!("DRM connector {system} refused loan return: {code}");
                let error = RevokeError::DrmFailure { system, code };
                recorder.current_step_failed(error.to_string(), error, None);
                Err(Recorded)
            }
            Ok(Err(_)) | Err(_) => {
                log::error!(
                    "DRM connector {system} gave no answer for loan {} within {timeout:?}",
                    loan.loan_id
                );
                let error = RevokeError::DrmNoResponse { system };
                recorder.current_step_failed(error.to_string(), error, None);
                Err(Recorded)
            }
        }
    }

    async fn clear_rights(&self, recorder: &mut TaskRecorder<RevokeError>) -> Result<(), Recorded> {
        recorder.begin_new_step(self.ctx.text(StepText::RevokeClearRights));
        if let Err(e) = self
            .ctx
            .book_database()
            .set_drm_rights(&self.account_id, &self.book_id, None)
            .await
        {
            e.log("Failed to clear DRM rights");
            return Err(record_failure(recorder, RevokeError::Persistence(e.to_string()), e));
        }
        recorder.current_step_succeeded(self.ctx.text(StepText::RevokeRightsCleared));
        Ok(())
    }
}

fn record_connector_error(
    recorder: &mut TaskRecorder<RevokeError>,
    system: &str,
    e: DrmError,
) -> Recorded {
    log::error!("DRM connector {system} failed to return loan: {e}");
    let error = match &e {
        DrmError::Failed { code } => RevokeError::DrmFailure {
            system: system.to_string(),
            code: code.clone(),
        },
        DrmError::Io(_) | DrmError::Connector(_) => RevokeError::DrmUnexpectedException {
            system: system.to_string(),
            message: e.to_string(),
        },
    };
    record_failure(recorder, error, e)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
