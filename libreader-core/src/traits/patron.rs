//! Patron authentication abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{AccountProvider, Credentials, DrmPreActivationCredentials};

/// Patron profile returned by a successful authentication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatronProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    /// DRM credentials issued to the patron, if the library uses DRM
    #[serde(default)]
    pub drm: Option<DrmPreActivationCredentials>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatronError {
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Connection failed: {0}")]
    Connection(String),
}

/// Network client that authenticates patrons against a provider.
#[async_trait]
pub trait PatronClient: Send + Sync {
    async fn authenticate(
        &self,
        provider: &AccountProvider,
        credentials: &Credentials,
    ) -> Result<PatronProfile, PatronError>;
}
