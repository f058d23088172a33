//! libreader core library
//!
//! Business logic for a library e-book lending client:
//! - accounts, credentials and the login-state lifecycle
//! - login, logout and book revocation tasks with step-by-step results
//! - local profiles with their own preferences and accounts
//! - the account, book and profile event bus
//!
//! The library is platform-independent. Storage, networking and DRM are
//! abstracted through traits that the application layer implements.

pub mod crypto;
pub mod error;
pub mod events;
pub mod services;
pub mod taskrecorder;
pub mod traits;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_utils;

// Re-export common types
pub use error::{CoreError, CoreResult};
pub use events::{
    AccountEvent, BookEvent, EventBus, EventSubscription, ProfileEvent, ProfileUpdated,
};
pub use services::{ProfileService, ServiceContext, TaskController, TaskSettings};
pub use taskrecorder::{TaskRecorder, TaskResult, TaskStep, TaskStepResolution};
pub use traits::{
    AccountsDatabase, BookDatabase, CredentialStore, DrmConnector, FeedLoader, PatronClient,
    ProfilesDatabase, ProviderRegistry,
};
