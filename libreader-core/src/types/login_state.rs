//! Account login state machine

use serde::Serialize;

use super::Credentials;

/// Login state of an account.
///
/// `LoggingIn` and `LoggingOut` are the in-flight states held while a task runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoginState {
    #[default]
    NotLoggedIn,
    LoggingIn,
    LoggedIn { credentials: Credentials },
    LoggingOut { credentials: Credentials },
}

impl LoginState {
    #[must_use]
    pub fn logged_in(credentials: Credentials) -> Self {
        Self::LoggedIn { credentials }
    }

    /// Credentials currently held by the account, if any.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::LoggedIn { credentials } | Self::LoggingOut { credentials } => Some(credentials),
            Self::NotLoggedIn | Self::LoggingIn => None,
        }
    }

    /// Credentials that must be kept by the credential store for this state.
    ///
    /// `None` means any stored credentials have to be removed.
    #[must_use]
    pub fn persistent_credentials(&self) -> Option<&Credentials> {
        self.credentials()
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn { .. })
    }

    /// Whether a login or logout is in progress.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::LoggingIn | Self::LoggingOut { .. })
    }

    /// State an account returns to after a restart with `stored` credentials.
    #[must_use]
    pub fn restored(stored: Option<Credentials>) -> Self {
        stored.map_or(Self::NotLoggedIn, Self::logged_in)
    }
}
