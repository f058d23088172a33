//! Task failure codes
//!
//! Each task records a closed set of errors; the underlying cause (if any)
//! is kept on the failed step.

use serde::Serialize;
use thiserror::Error;

use crate::error::CoreError;

/// Failure of an account login task.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum LoginError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Authentication method not supported by this provider: {0}")]
    UnsupportedAuthentication(String),

    #[error("Credentials incomplete: missing {field}")]
    CredentialsIncomplete { field: String },

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("DRM activation failed ({system}): {code}")]
    DrmActivationFailed { system: String, code: String },

    #[error("Could not save login state: {0}")]
    Persistence(String),
}

/// Failure of an account logout task.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum LogoutError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("DRM deactivation failed ({system}): {code}")]
    DrmDeactivationFailed { system: String, code: String },

    #[error("Could not save logout state: {0}")]
    Persistence(String),
}

/// Failure of a book revocation task.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum RevokeError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Book not found: {0}")]
    BookNotFound(String),

    #[error("No credentials available to return the loan")]
    NoCredentialsAvailable,

    #[error("DRM device is not activated ({system})")]
    DrmDeviceNotActive { system: String },

    #[error("DRM loan return failed ({system}): {code}")]
    DrmFailure { system: String, code: String },

    #[error("DRM connector raised an unexpected error ({system}): {message}")]
    DrmUnexpectedException { system: String, message: String },

    #[error("DRM connector did not respond ({system})")]
    DrmNoResponse { system: String },

    #[error("Server refused the revocation: {message}")]
    ServerRevokeFailed { message: String },

    #[error("Could not update the book database: {0}")]
    Persistence(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revoke_error_serializes_code() {
        let err = RevokeError::DrmFailure {
            system: "ACS".to_string(),
            code: "E_LIC_ALREADY_RETURNED".to_string(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "DrmFailure");
        assert_eq!(json["details"]["code"], "E_LIC_ALREADY_RETURNED");
        assert!(err.to_string().contains("E_LIC_ALREADY_RETURNED"));
    }

    #[test]
    fn unit_variants_serialize_without_details() {
        let json = serde_json::to_value(LoginError::InvalidCredentials).unwrap();
        assert_eq!(json["code"], "InvalidCredentials");
    }
}

/// Failure of a profile creation or update.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "details")]
pub enum ProfileError {
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("No profile is selected")]
    NoCurrentProfile,

    #[error("Display name already used: {0}")]
    DisplayNameAlreadyUsed(String),

    #[error("Invalid display name: {0}")]
    InvalidDisplayName(String),

    #[error("Could not save profile: {0}")]
    Persistence(String),
}

impl From<&CoreError> for ProfileError {
    fn from(e: &CoreError) -> Self {
        match e {
            CoreError::ProfileNotFound(id) => Self::ProfileNotFound(id.clone()),
            CoreError::NoCurrentProfile => Self::NoCurrentProfile,
            CoreError::DuplicateDisplayName(name) => Self::DisplayNameAlreadyUsed(name.clone()),
            CoreError::ValidationError(message) => Self::InvalidDisplayName(message.clone()),
            other => Self::Persistence(other.to_string()),
        }
    }
}
