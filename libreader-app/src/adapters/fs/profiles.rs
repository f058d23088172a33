//! Filesystem profiles database.
//!
//! ```text
//! <dir>/current.json                 selected profile
//! <dir>/<profile uuid>/profile.json  descriptor
//! <dir>/<profile uuid>/accounts/     accounts database of the profile
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::RwLock;

use libreader_core::error::{CoreError, CoreResult};
use libreader_core::traits::ProfilesDatabase;
use libreader_core::types::{
    normalize_display_name, Profile, ProfileDescriptor, ProfileId, ProfilePreferences,
};

use super::io::{
    ensure_directory, read_json, remove_dir_if_exists, storage_error, write_json_atomic,
    TMP_SUFFIX,
};

const DESCRIPTOR_FILE: &str = "profile.json";
const CURRENT_FILE: &str = "current.json";

#[derive(Debug, Serialize, Deserialize)]
struct CurrentProfile {
    profile: ProfileId,
}

struct Profiles {
    by_id: BTreeMap<ProfileId, Profile>,
    current: Option<ProfileId>,
}

impl Profiles {
    fn require(&self, id: &ProfileId) -> CoreResult<&Profile> {
        self.by_id
            .get(id)
            .ok_or_else(|| CoreError::ProfileNotFound(id.to_string()))
    }

    fn check_name_free(&self, display_name: &str, except: Option<&ProfileId>) -> CoreResult<()> {
        if self
            .by_id
            .values()
            .any(|p| p.display_name == display_name && Some(&p.id) != except)
        {
            return Err(CoreError::DuplicateDisplayName(display_name.to_string()));
        }
        Ok(())
    }
}

/// Profiles stored as one directory per profile.
pub struct FsProfilesDatabase {
    directory: PathBuf,
    profiles: RwLock<Profiles>,
}

impl FsProfilesDatabase {
    /// Open the database at `directory`, creating it when missing.
    ///
    /// # Errors
    /// `CoreError::ProfilesDatabaseOpen` listing every profile directory that
    /// cannot be parsed, duplicate display names and an unreadable selection.
    pub async fn open(directory: impl Into<PathBuf>) -> CoreResult<Self> {
        let directory = directory.into();
        let open_error = |causes: Vec<String>| CoreError::ProfilesDatabaseOpen {
            path: directory.display().to_string(),
            causes,
        };

        ensure_directory(&directory)
            .await
            .map_err(|cause| open_error(vec![cause]))?;

        let (profiles, mut causes) = Self::scan(&directory)
            .await
            .map_err(|e| open_error(vec![e.to_string()]))?;

        let current = match read_json::<CurrentProfile>(&directory.join(CURRENT_FILE)).await {
            Ok(Some(CurrentProfile { profile })) if profiles.contains_key(&profile) => {
                Some(profile)
            }
            Ok(Some(CurrentProfile { profile })) => {
                log::warn!("Selected profile {profile} no longer exists");
                None
            }
            Ok(None) => None,
            Err(e) => {
                causes.push(format!("Could not read {CURRENT_FILE}: {e}"));
                None
            }
        };
        if !causes.is_empty() {
            return Err(open_error(causes));
        }

        log::info!(
            "Opened profiles database {} with {} profiles",
            directory.display(),
            profiles.len()
        );
        Ok(Self {
            directory,
            profiles: RwLock::new(Profiles {
                by_id: profiles,
                current,
            }),
        })
    }

    async fn scan(directory: &Path) -> std::io::Result<(BTreeMap<ProfileId, Profile>, Vec<String>)> {
        let mut profiles = BTreeMap::new();
        let mut causes = Vec::new();
        let mut names = HashSet::new();

        let mut dir = fs::read_dir(directory).await?;
        while let Some(entry) = dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if !entry.file_type().await?.is_dir() || name.ends_with(TMP_SUFFIX) {
                continue;
            }
            let path = entry.path();
            match Self::parse_profile(&path, &name).await {
                Ok(descriptor) if !names.insert(descriptor.display_name.clone()) => {
                    causes.push(format!(
                        "Could not parse profile: {name}: duplicate display name {}",
                        descriptor.display_name
                    ));
                }
                Ok(descriptor) => {
                    profiles.insert(descriptor.id, descriptor.into_profile(&path));
                }
                Err(reason) => causes.push(format!("Could not parse profile: {name}: {reason}")),
            }
        }
        Ok((profiles, causes))
    }

    async fn parse_profile(path: &Path, name: &str) -> Result<ProfileDescriptor, String> {
        let id: ProfileId = name.parse().map_err(|_| "not a UUID".to_string())?;
        let descriptor: ProfileDescriptor = read_json(&path.join(DESCRIPTOR_FILE))
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| format!("missing {DESCRIPTOR_FILE}"))?;
        if descriptor.id != id {
            return Err(format!("descriptor id {} does not match", descriptor.id));
        }
        Ok(descriptor)
    }
}

#[async_trait]
impl ProfilesDatabase for FsProfilesDatabase {
    fn directory(&self) -> &Path {
        &self.directory
    }

    async fn profiles(&self) -> CoreResult<Vec<Profile>> {
        Ok(self.profiles.read().await.by_id.values().cloned().collect())
    }

    async fn find(&self, id: &ProfileId) -> CoreResult<Option<Profile>> {
        Ok(self.profiles.read().await.by_id.get(id).cloned())
    }

    async fn current(&self) -> CoreResult<Profile> {
        let profiles = self.profiles.read().await;
        profiles
            .current
            .and_then(|id| profiles.by_id.get(&id).cloned())
            .ok_or(CoreError::NoCurrentProfile)
    }

    async fn select(&self, id: &ProfileId) -> CoreResult<Profile> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles.require(id)?.clone();
        write_json_atomic(
            &self.directory.join(CURRENT_FILE),
            &CurrentProfile { profile: *id },
        )
        .await?;
        profiles.current = Some(*id);
        Ok(profile)
    }

    async fn create(
        &self,
        display_name: &str,
        preferences: ProfilePreferences,
    ) -> CoreResult<Profile> {
        let display_name = normalize_display_name(display_name)?;
        let mut profiles = self.profiles.write().await;
        profiles.check_name_free(&display_name, None)?;

        let id = ProfileId::new();
        let profile = Profile {
            id,
            display_name,
            preferences,
            directory: self.directory.join(id.to_string()),
            created_at: chrono::Utc::now(),
        };

        let accounts = profile.accounts_directory();
        fs::create_dir_all(&accounts)
            .await
            .map_err(|e| storage_error(&accounts, e))?;
        if let Err(e) =
            write_json_atomic(&profile.directory.join(DESCRIPTOR_FILE), &profile.descriptor())
                .await
        {
            if let Err(cleanup) = remove_dir_if_exists(&profile.directory).await {
                log::warn!(
                    "Cleanup: failed to remove {}: {cleanup}",
                    profile.directory.display()
                );
            }
            return Err(e);
        }

        log::debug!("Created profile directory {}", profile.directory.display());
        profiles.by_id.insert(id, profile.clone());
        Ok(profile)
    }

    async fn set_display_name(&self, id: &ProfileId, display_name: &str) -> CoreResult<String> {
        let display_name = normalize_display_name(display_name)?;
        let mut profiles = self.profiles.write().await;
        profiles.check_name_free(&display_name, Some(id))?;
        let profile = profiles
            .by_id
            .get_mut(id)
            .ok_or_else(|| CoreError::ProfileNotFound(id.to_string()))?;

        let mut descriptor = profile.descriptor();
        descriptor.display_name.clone_from(&display_name);
        write_json_atomic(&profile.directory.join(DESCRIPTOR_FILE), &descriptor).await?;

        Ok(std::mem::replace(&mut profile.display_name, display_name))
    }

    async fn set_preferences(
        &self,
        id: &ProfileId,
        preferences: ProfilePreferences,
    ) -> CoreResult<ProfilePreferences> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles
            .by_id
            .get_mut(id)
            .ok_or_else(|| CoreError::ProfileNotFound(id.to_string()))?;

        let mut descriptor = profile.descriptor();
        descriptor.preferences = preferences.clone();
        write_json_atomic(&profile.directory.join(DESCRIPTOR_FILE), &descriptor).await?;

        Ok(std::mem::replace(&mut profile.preferences, preferences))
    }
}
