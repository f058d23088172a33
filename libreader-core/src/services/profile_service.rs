//! Profile service
//!
//! Creation, selection and updates of local profiles. Every operation that
//! changes a profile publishes one [`ProfileEvent`].

use std::sync::Arc;

use crate::error::CoreResult;
use crate::events::{EventBus, ProfileEvent, ProfileUpdated};
use crate::services::{ProfileDisplayNameUpdateTask, ProfilePreferencesUpdateTask};
use crate::traits::ProfilesDatabase;
use crate::types::{Profile, ProfileError, ProfileId, ProfilePreferences};

pub struct ProfileService {
    profiles: Arc<dyn ProfilesDatabase>,
    events: EventBus<ProfileEvent>,
}

impl ProfileService {
    #[must_use]
    pub fn new(profiles: Arc<dyn ProfilesDatabase>, event_capacity: usize) -> Self {
        Self {
            profiles,
            events: EventBus::new(event_capacity),
        }
    }

    #[must_use]
    pub fn events(&self) -> &EventBus<ProfileEvent> {
        &self.events
    }

    #[must_use]
    pub fn profiles_database(&self) -> &Arc<dyn ProfilesDatabase> {
        &self.profiles
    }

    pub async fn list_profiles(&self) -> CoreResult<Vec<Profile>> {
        self.profiles.profiles().await
    }

    /// The selected profile; `NoCurrentProfile` before any selection.
    pub async fn current(&self) -> CoreResult<Profile> {
        self.profiles.current().await
    }

    /// Publishes `CreationSucceeded` or `CreationFailed`.
    pub async fn create(
        &self,
        display_name: &str,
        preferences: ProfilePreferences,
    ) -> CoreResult<Profile> {
        let result = self.profiles.create(display_name, preferences).await;
        match &result {
            Ok(profile) => {
                log::info!("Created profile {} ({})", profile.id, profile.display_name);
                self.events.publish(ProfileEvent::CreationSucceeded {
                    profile_id: profile.id,
                    display_name: profile.display_name.clone(),
                });
            }
            Err(e) => {
                e.log(&format!("Failed to create profile {display_name}"));
                self.events.publish(ProfileEvent::CreationFailed {
                    display_name: display_name.to_string(),
                    error: ProfileError::from(e),
                });
            }
        }
        result
    }

    /// Select a profile. Publishes `Selected` on success.
    pub async fn select(&self, profile_id: &ProfileId) -> CoreResult<Profile> {
        let profile = self.profiles.select(profile_id).await.inspect_err(|e| {
            e.log(&format!("Failed to select profile {profile_id}"));
        })?;
        log::info!("Selected profile {profile_id}");
        self.events.publish(ProfileEvent::Selected {
            profile_id: profile.id,
        });
        Ok(profile)
    }

    /// Rename `profile_id`, or the selected profile when `None`.
    pub async fn update_display_name(
        &self,
        profile_id: Option<ProfileId>,
        display_name: &str,
    ) -> ProfileUpdated {
        ProfileDisplayNameUpdateTask::new(
            Arc::clone(&self.profiles),
            self.events.clone(),
            profile_id,
            display_name,
        )
        .run()
        .await
    }

    /// Change the preferences of `profile_id`, or of the selected profile.
    pub async fn update_preferences<F>(
        &self,
        profile_id: Option<ProfileId>,
        update: F,
    ) -> ProfileUpdated
    where
        F: FnOnce(&ProfilePreferences) -> ProfilePreferences + Send,
    {
        ProfilePreferencesUpdateTask::new(
            Arc::clone(&self.profiles),
            self.events.clone(),
            profile_id,
            update,
        )
        .run()
        .await
    }
}
