//! Server-side feed operations

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::types::Account;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    #[error("Server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Unparseable response: {0}")]
    Parse(String),
}

/// Loader for the provider's OPDS endpoints.
#[async_trait]
pub trait FeedLoader: Send + Sync {
    /// Notify the server that a loan has been returned.
    async fn revoke(&self, account: &Account, revoke_uri: &Url) -> Result<(), FeedError>;
}
