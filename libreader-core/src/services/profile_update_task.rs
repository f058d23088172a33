//! Profile display name and preferences updates
//!
//! Both tasks target the requested profile, or the selected one when none is
//! given, and publish exactly one `ProfileEvent::Updated`.

use std::sync::Arc;

use crate::error::{CoreError, CoreResult};
use crate::events::{EventBus, ProfileEvent, ProfileUpdated};
use crate::traits::ProfilesDatabase;
use crate::types::{normalize_display_name, Profile, ProfileError, ProfileId, ProfilePreferences};

async fn resolve_profile(
    profiles: &dyn ProfilesDatabase,
    requested: Option<ProfileId>,
) -> CoreResult<Profile> {
    match requested {
        Some(id) => profiles
            .find(&id)
            .await?
            .ok_or_else(|| CoreError::ProfileNotFound(id.to_string())),
        None => profiles.current().await,
    }
}

fn publish(
    events: &EventBus<ProfileEvent>,
    result: Result<ProfileUpdated, (Option<ProfileId>, CoreError)>,
    context: &str,
) -> ProfileUpdated {
    let update = match result {
        Ok(update) => update,
        Err((profile_id, e)) => {
            e.log(context);
            ProfileUpdated::Failed {
                profile_id,
                error: ProfileError::from(&e),
            }
        }
    };
    events.publish(ProfileEvent::Updated(update.clone()));
    update
}

/// Renames a profile.
pub struct ProfileDisplayNameUpdateTask {
    profiles: Arc<dyn ProfilesDatabase>,
    events: EventBus<ProfileEvent>,
    profile_id: Option<ProfileId>,
    display_name: String,
}

impl ProfileDisplayNameUpdateTask {
    #[must_use]
    pub fn new(
        profiles: Arc<dyn ProfilesDatabase>,
        events: EventBus<ProfileEvent>,
        profile_id: Option<ProfileId>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            profiles,
            events,
            profile_id,
            display_name: display_name.into(),
        }
    }

    pub async fn run(self) -> ProfileUpdated {
        let result = self.execute().await;
        publish(&self.events, result, "Could not update display name")
    }

    async fn execute(&self) -> Result<ProfileUpdated, (Option<ProfileId>, CoreError)> {
        let profile = resolve_profile(self.profiles.as_ref(), self.profile_id)
            .await
            .map_err(|e| (self.profile_id, e))?;
        let failed = |e: CoreError| (Some(profile.id), e);

        let new_display_name = normalize_display_name(&self.display_name).map_err(failed)?;
        let old_display_name = self
            .profiles
            .set_display_name(&profile.id, &new_display_name)
            .await
            .map_err(failed)?;
        log::info!("Renamed profile {} to {new_display_name}", profile.id);

        Ok(ProfileUpdated::Succeeded {
            profile_id: profile.id,
            old_display_name,
            new_display_name,
            old_preferences: profile.preferences.clone(),
            new_preferences: profile.preferences,
        })
    }
}

/// Applies a change to a profile's preferences.
pub struct ProfilePreferencesUpdateTask<F> {
    profiles: Arc<dyn ProfilesDatabase>,
    events: EventBus<ProfileEvent>,
    profile_id: Option<ProfileId>,
    update: F,
}

impl<F> ProfilePreferencesUpdateTask<F>
where
    F: FnOnce(&ProfilePreferences) -> ProfilePreferences + Send,
{
    /// `update` receives the current preferences and returns the new ones.
    #[must_use]
    pub fn new(
        profiles: Arc<dyn ProfilesDatabase>,
        events: EventBus<ProfileEvent>,
        profile_id: Option<ProfileId>,
        update: F,
    ) -> Self {
        Self {
            profiles,
            events,
            profile_id,
            update,
        }
    }

    pub async fn run(self) -> ProfileUpdated {
        let Self {
            profiles,
            events,
            profile_id,
            update,
        } = self;
        let result = Self::execute(profiles.as_ref(), profile_id, update).await;
        publish(&events, result, "Could not update preferences")
    }

    async fn execute(
        profiles: &dyn ProfilesDatabase,
        profile_id: Option<ProfileId>,
        update: F,
    ) -> Result<ProfileUpdated, (Option<ProfileId>, CoreError)> {
        let profile = resolve_profile(profiles, profile_id)
            .await
            .map_err(|e| (profile_id, e))?;

        let new_preferences = update(&profile.preferences);
        let old_preferences = profiles
            .set_preferences(&profile.id, new_preferences.clone())
            .await
            .map_err(|e| (Some(profile.id), e))?;
        log::debug!("Updated preferences of profile {}", profile.id);

        Ok(ProfileUpdated::Succeeded {
            profile_id: profile.id,
            old_display_name: profile.display_name.clone(),
            new_display_name: profile.display_name,
            old_preferences,
            new_preferences,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockProfilesDatabase;
    use crate::types::ReaderColorScheme;

    async fn database_with(names: &[&str]) -> (Arc<MockProfilesDatabase>, Vec<Profile>) {
        let database = Arc::new(MockProfilesDatabase::new());
        let mut created = Vec::new();
        for name in names {
            created.push(
                database
                    .create(name, ProfilePreferences::default())
                    .await
                    .unwrap(),
            );
        }
        (database, created)
    }

    #[tokio::test]
    async fn rename_selected_profile() {
        let (database, created) = database_with(&["Kermit"]).await;
        database.select(&created[0].id).await.unwrap();
        let events = EventBus::new(8);
        let mut subscription = events.subscribe();

        let update =
            ProfileDisplayNameUpdateTask::new(database.clone(), events, None, " Gonzo ").run().await;

        assert!(matches!(
            &update,
            ProfileUpdated::Succeeded { old_display_name, new_display_name, .. }
                if old_display_name == "Kermit" && new_display_name == "Gonzo"
        ));
        assert_eq!(database.current().await.unwrap().display_name, "Gonzo");
        assert_eq!(subscription.drain(), vec![ProfileEvent::Updated(update)]);
    }

    #[tokio::test]
    async fn rename_to_taken_name_fails_once() {
        let (database, created) = database_with(&["Kermit", "Piggy"]).await;
        let events = EventBus::new(8);
        let mut subscription = events.subscribe();

        let update = ProfileDisplayNameUpdateTask::new(
            database.clone(),
            events,
            Some(created[1].id),
            "Kermit",
        )
        .run()
        .await;

        assert_eq!(
            update,
            ProfileUpdated::Failed {
                profile_id: Some(created[1].id),
                error: ProfileError::DisplayNameAlreadyUsed("Kermit".to_string()),
            }
        );
        assert_eq!(subscription.drain().len(), 1);
        let piggy = database.find(&created[1].id).await.unwrap().unwrap();
        assert_eq!(piggy.display_name, "Piggy");
    }

    #[tokio::test]
    async fn update_without_selection_fails() {
        let (database, _) = database_with(&["Kermit"]).await;
        let events = EventBus::new(8);
        let mut subscription = events.subscribe();

        let update =
            ProfilePreferencesUpdateTask::new(database, events, None, ProfilePreferences::clone)
                .run()
                .await;

        assert_eq!(
            update,
            ProfileUpdated::Failed {
                profile_id: None,
                error: ProfileError::NoCurrentProfile,
            }
        );
        assert_eq!(subscription.drain(), vec![ProfileEvent::Updated(update)]);
    }

    #[tokio::test]
    async fn unchanged_preferences_are_reported_unchanged() {
        let (database, created) = database_with(&["Kermit"]).await;
        database.select(&created[0].id).await.unwrap();
        let events = EventBus::new(8);

        let update = ProfilePreferencesUpdateTask::new(
            database.clone(),
            events.clone(),
            None,
            ProfilePreferences::clone,
        )
        .run()
        .await;
        assert!(update.is_success());
        assert!(!update.changed_reader_preferences());

        let update = ProfilePreferencesUpdateTask::new(database.clone(), events, None, |old| {
            let mut new = old.clone();
            new.reader.color_scheme = ReaderColorScheme::WhiteOnBlack;
            new.reader.font_scale = 2.0;
            new
        })
        .run()
        .await;
        assert!(update.changed_reader_preferences());
        let current = database.current().await.unwrap();
        assert_eq!(current.preferences.reader.color_scheme, ReaderColorScheme::WhiteOnBlack);
    }

    #[tokio::test]
    async fn storage_failure_is_persistence_error() {
        let (database, created) = database_with(&["Kermit"]).await;
        database.fail_writes(true);
        let events = EventBus::new(8);

        let update = ProfilePreferencesUpdateTask::new(
            database,
            events,
            Some(created[0].id),
            ProfilePreferences::clone,
        )
        .run()
        .await;

        assert!(matches!(
            update,
            ProfileUpdated::Failed {
                error: ProfileError::Persistence(_),
                ..
            }
        ));
    }
}
