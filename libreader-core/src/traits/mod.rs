//! Storage and collaborator trait definitions

mod accounts_database;
mod book_database;
mod credential_store;
mod drm;
mod feed_loader;
mod patron;
mod profiles_database;
mod provider_registry;
mod strings;

pub use accounts_database::AccountsDatabase;
pub use book_database::BookDatabase;
pub use credential_store::{CredentialStore, CredentialsMap, InMemoryCredentialStore};
pub use drm::{DrmConnector, DrmError, LoanReturnOutcome, LoanReturnReply};
pub use feed_loader::{FeedError, FeedLoader};
pub use patron::{PatronClient, PatronError, PatronProfile};
pub use profiles_database::ProfilesDatabase;
pub use provider_registry::{InMemoryProviderRegistry, ProviderRegistry};
pub use strings::{EnglishTaskStrings, StepText, TaskStrings};
