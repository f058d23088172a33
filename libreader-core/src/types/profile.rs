//! Profile types

use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Identifier of a profile; it also names the profile's directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(Uuid);

impl ProfileId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ProfileId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for ProfileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProfileId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| CoreError::ValidationError(format!("Invalid profile id '{s}': {e}")))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReaderColorScheme {
    #[default]
    BlackOnWhite,
    BlackOnBeige,
    WhiteOnBlack,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReaderFont {
    #[default]
    Publisher,
    Serif,
    SansSerif,
    OpenDyslexic,
}

/// Reading settings shared by every book of a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaderPreferences {
    pub font_family: ReaderFont,
    /// Multiplier of the default font size
    pub font_scale: f64,
    /// Screen brightness in `0.0..=1.0`
    pub brightness: f64,
    pub color_scheme: ReaderColorScheme,
}

impl Default for ReaderPreferences {
    fn default() -> Self {
        Self {
            font_family: ReaderFont::default(),
            font_scale: 1.0,
            brightness: 0.5,
            color_scheme: ReaderColorScheme::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProfilePreferences {
    pub gender: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub reader: ReaderPreferences,
}

/// A local user profile. Each profile owns its own accounts database.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: ProfileId,
    pub display_name: String,
    pub preferences: ProfilePreferences,
    pub directory: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// Directory of this profile's accounts database.
    #[must_use]
    pub fn accounts_directory(&self) -> PathBuf {
        self.directory.join("accounts")
    }

    #[must_use]
    pub fn descriptor(&self) -> ProfileDescriptor {
        ProfileDescriptor {
            id: self.id,
            display_name: self.display_name.clone(),
            preferences: self.preferences.clone(),
            created_at: self.created_at,
        }
    }
}

/// The persisted part of a profile (`profile.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDescriptor {
    pub id: ProfileId,
    pub display_name: String,
    #[serde(default)]
    pub preferences: ProfilePreferences,
    #[serde(with = "crate::utils::datetime")]
    pub created_at: DateTime<Utc>,
}

impl ProfileDescriptor {
    #[must_use]
    pub fn into_profile(self, directory: &Path) -> Profile {
        Profile {
            id: self.id,
            display_name: self.display_name,
            preferences: self.preferences,
            directory: directory.to_path_buf(),
            created_at: self.created_at,
        }
    }
}

/// Trim a display name and reject empty ones.
pub fn normalize_display_name(display_name: &str) -> Result<String, CoreError> {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return Err(CoreError::ValidationError(
            "Profile display name must not be empty".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
