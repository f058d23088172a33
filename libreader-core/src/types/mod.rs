//! Type definitions

mod account;
mod book;
mod credentials;
mod errors;
mod ids;
mod login_state;
mod profile;
mod provider;

pub use account::{Account, AccountDescriptor, ProviderRefreshReport};
pub use book::{BookEntry, BookFormat, DrmLoan};
pub use credentials::{
    Credentials, DrmClientToken, DrmPostActivationCredentials, DrmPreActivationCredentials, Secret,
};
pub use errors::{LoginError, LogoutError, ProfileError, RevokeError};
pub use ids::{AccountId, BookId};
pub use login_state::LoginState;
pub use profile::{
    normalize_display_name, Profile, ProfileDescriptor, ProfileId, ProfilePreferences,
    ReaderColorScheme, ReaderFont, ReaderPreferences,
};
pub use provider::{AccountProvider, ProviderAuthentication};
