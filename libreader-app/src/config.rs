//! Application configuration
//!
//! Read from `<config dir>/libreader/config.json`. A missing file means
//! defaults; a present but invalid file is an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use libreader_core::error::{CoreError, CoreResult};
use libreader_core::TaskSettings;

const APP_DIR: &str = "libreader";

/// Where account credentials are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialStoreKind {
    /// Password-sealed JSON file in the data directory
    File,
    /// System keyring (requires the `keyring-store` feature)
    Keyring,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Root of the profile data (accounts database, credential file)
    pub data_dir: PathBuf,
    pub drm_response_timeout_secs: u64,
    pub max_concurrent_tasks: usize,
    pub event_capacity: usize,
    pub credential_store: CredentialStoreKind,
}

impl Default for AppConfig {
    fn default() -> Self {
        let defaults = TaskSettings::default();
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_DIR),
            drm_response_timeout_secs: defaults.drm_response_timeout.as_secs(),
            max_concurrent_tasks: defaults.max_concurrent_tasks,
            event_capacity: defaults.event_capacity,
            credential_store: CredentialStoreKind::File,
        }
    }
}

impl AppConfig {
    /// Platform default location of the configuration file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.json")
    }

    /// Load the configuration at `path`, or defaults if it does not exist.
    pub async fn load(path: &Path) -> CoreResult<Self> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No configuration at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(CoreError::StorageError(format!("{}: {e}", path.display()))),
        };
        let config: Self = serde_json::from_str(&content).map_err(|e| {
            CoreError::SerializationError(format!("Invalid configuration {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> CoreResult<()> {
        if self.drm_response_timeout_secs == 0 {
            return Err(CoreError::ValidationError(
                "drmResponseTimeoutSecs must be positive".to_string(),
            ));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(CoreError::ValidationError(
                "maxConcurrentTasks must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Directory of the accounts database used without profiles.
    #[must_use]
    pub fn accounts_dir(&self) -> PathBuf {
        self.data_dir.join("accounts")
    }

    /// Directory of the profiles database.
    #[must_use]
    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir.join("profiles")
    }

    /// Sealed credential file used by the `file` store.
    #[must_use]
    pub fn credentials_file(&self) -> PathBuf {
        self.data_dir.join("credentials.json")
    }

    #[must_use]
    pub fn task_settings(&self) -> TaskSettings {
        TaskSettings {
            drm_response_timeout: Duration::from_secs(self.drm_response_timeout_secs),
            max_concurrent_tasks: self.max_concurrent_tasks,
            event_capacity: self.event_capacity,
        }
    }
}
