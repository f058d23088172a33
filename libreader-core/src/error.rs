//! Unified error type definition

use serde::Serialize;
use thiserror::Error;

/// Core layer error type
#[derive(Error, Debug, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum CoreError {
    /// Provider not found in the registry
    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    /// Account not found
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Book not found in an account's book database
    #[error("Book not found: {0}")]
    BookNotFound(String),

    /// An account already exists for this provider
    #[error("An account already exists for provider: {0}")]
    DuplicateProvider(String),

    /// Attempt to replace an account provider with a different provider id
    #[error("Provider mismatch: account uses {expected}, got {actual}")]
    ProviderMismatch { expected: String, actual: String },

    /// Profile not found
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    /// No profile has been selected yet
    #[error("No profile is selected")]
    NoCurrentProfile,

    /// Another profile already uses this display name
    #[error("Display name already used: {0}")]
    DuplicateDisplayName(String),

    /// The profiles directory could not be opened
    #[error("Could not open profiles database at {path}: {}", causes.join("; "))]
    ProfilesDatabaseOpen { path: String, causes: Vec<String> },

    /// The accounts database directory could not be opened
    #[error("Could not open accounts database at {path}: {}", causes.join("; "))]
    AccountsDatabaseOpen { path: String, causes: Vec<String> },

    /// Credential storage error
    #[error("Credential error: {0}")]
    CredentialError(String),

    /// serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl CoreError {
    /// Whether it is expected behavior (user input, resource does not exist, etc.) is used for log classification.
    ///
    /// Level `warn` should be used when returning `true` and level `error` when returning `false`.
    /// **Please update this method simultaneously when new variants are added. **
    #[must_use]
    pub fn is_expected(&self) -> bool {
        match self {
            Self::AccountNotFound(_)
            | Self::BookNotFound(_)
            | Self::ProviderNotFound(_)
            | Self::DuplicateProvider(_)
            | Self::ProviderMismatch { .. }
            | Self::ProfileNotFound(_)
            | Self::NoCurrentProfile
            | Self::DuplicateDisplayName(_)
            | Self::ValidationError(_) => true,
            Self::AccountsDatabaseOpen { .. }
            | Self::ProfilesDatabaseOpen { .. }
            | Self::CredentialError(_)
            | Self::SerializationError(_)
            | Self::StorageError(_) => false,
        }
    }

    /// Log this error at the level picked by [`CoreError::is_expected`].
    pub fn log(&self, context: &str) {
        if self.is_expected() {
            log::warn!("{context}: {self}");
        } else {
            log::error!("{context}: {self}");
        }
    }
}

/// Core layer Result type alias
pub type CoreResult<T> = std::result::Result<T, CoreError>;
