//! Profiles database abstraction

use std::path::Path;

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{Profile, ProfileId, ProfilePreferences};

/// The set of local profiles and the selected one.
///
/// Display names are unique across profiles. Each profile owns a directory
/// below [`ProfilesDatabase::directory`] holding its accounts database.
///
/// Implementations:
/// - `FsProfilesDatabase` (app crate)
#[async_trait]
pub trait ProfilesDatabase: Send + Sync {
    fn directory(&self) -> &Path;

    /// All profiles, ordered by id.
    async fn profiles(&self) -> CoreResult<Vec<Profile>>;

    async fn find(&self, id: &ProfileId) -> CoreResult<Option<Profile>>;

    /// The selected profile, or `NoCurrentProfile`.
    async fn current(&self) -> CoreResult<Profile>;

    /// Make `id` the selected profile and persist the choice.
    async fn select(&self, id: &ProfileId) -> CoreResult<Profile>;

    /// Create a profile. Fails with `DuplicateDisplayName` when the name is taken.
    async fn create(
        &self,
        display_name: &str,
        preferences: ProfilePreferences,
    ) -> CoreResult<Profile>;

    /// Rename a profile, returning the previous display name.
    async fn set_display_name(&self, id: &ProfileId, display_name: &str) -> CoreResult<String>;

    /// Replace the preferences of a profile, returning the previous ones.
    async fn set_preferences(
        &self,
        id: &ProfileId,
        preferences: ProfilePreferences,
    ) -> CoreResult<ProfilePreferences>;
}
