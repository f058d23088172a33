//! DRM vendor connector abstraction

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::types::{DrmLoan, DrmPostActivationCredentials, DrmPreActivationCredentials};

/// Errors raised by a DRM connector call itself.
#[derive(Error, Debug)]
pub enum DrmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connector error: {0}")]
    Connector(String),

    /// The vendor rejected the request with an error code
    #[error("DRM failure: {code}")]
    Failed { code: String },
}

impl DrmError {
    /// Vendor error code, when the vendor answered with one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Failed { code } => Some(code),
            Self::Io(_) | Self::Connector(_) => None,
        }
    }
}

/// Answer of a loan return request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanReturnOutcome {
    Returned,
    Failed { code: String },
}

/// One-shot reply handle given to [`DrmConnector::return_loan`].
///
/// The connector answers at most once. Dropping the handle without answering
/// is reported as "no response".
#[derive(Debug)]
pub struct LoanReturnReply {
    sender: oneshot::Sender<LoanReturnOutcome>,
}

impl LoanReturnReply {
    /// A reply handle and the receiver its answer arrives on.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<LoanReturnOutcome>) {
        let (sender, receiver) = oneshot::channel();
        (Self { sender }, receiver)
    }

    pub fn succeeded(self) {
        self.send(LoanReturnOutcome::Returned);
    }

    pub fn failed(self, code: impl Into<String>) {
        self.send(LoanReturnOutcome::Failed { code: code.into() });
    }

    fn send(self, outcome: LoanReturnOutcome) {
        if self.sender.send(outcome).is_err() {
            log::debug!("loan return answered after the requester stopped waiting");
        }
    }
}

/// Vendor DRM connector
///
/// A connector is optional: without one, DRM-protected operations are skipped.
#[async_trait]
pub trait DrmConnector: Send + Sync {
    /// Name of the DRM system, used in error reports.
    fn system(&self) -> &str;

    /// Activate this device for the patron.
    async fn activate_device(
        &self,
        drm: &DrmPreActivationCredentials,
    ) -> Result<DrmPostActivationCredentials, DrmError>;

    /// Deactivate this device.
    async fn deactivate_device(
        &self,
        drm: &DrmPreActivationCredentials,
        activation: &DrmPostActivationCredentials,
    ) -> Result<(), DrmError>;

    /// Submit a loan return. The outcome is delivered through `reply`,
    /// possibly after this call returns.
    async fn return_loan(
        &self,
        drm: &DrmPreActivationCredentials,
        activation: &DrmPostActivationCredentials,
        loan: &DrmLoan,
        reply: LoanReturnReply,
    ) -> Result<(), DrmError>;
}
