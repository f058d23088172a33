//! Storage adapters for the core traits.

mod file_credential_store;
pub(crate) mod fs;

#[cfg(feature = "keyring-store")]
mod keyring_credential_store;

pub use file_credential_store::FileCredentialStore;
pub use fs::{FsAccountsDatabase, FsProfilesDatabase};

#[cfg(feature = "keyring-store")]
pub use keyring_credential_store::KeyringCredentialStore;
