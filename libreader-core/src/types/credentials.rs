//! Account authentication credentials

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, CoreResult};

/// A secret string (password, PIN, token) that never prints its value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value, for handing to a network or DRM collaborator.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Vendor DRM client token, `<user name>|<password>` split at the last `|`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmClientToken {
    pub user_name: String,
    pub password: Secret,
    pub raw: Secret,
}

impl DrmClientToken {
    /// Parse a raw token such as `NYNYPL|536818535|b54b...|TWFu...`.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let (user_name, password) = raw.rsplit_once('|').ok_or_else(|| {
            CoreError::ValidationError("DRM client token has no '|' separator".to_string())
        })?;
        if user_name.is_empty() || password.is_empty() {
            return Err(CoreError::ValidationError(
                "DRM client token has an empty segment".to_string(),
            ));
        }
        Ok(Self {
            user_name: user_name.to_string(),
            password: Secret::new(password),
            raw: Secret::new(raw),
        })
    }
}

/// Credentials obtained once a device has been activated with the DRM vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmPostActivationCredentials {
    pub device_id: String,
    pub user_id: String,
}

/// DRM credentials issued by the library, before and after device activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrmPreActivationCredentials {
    pub vendor_id: String,
    pub client_token: DrmClientToken,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_manager_uri: Option<Url>,
    /// Present only once the device is activated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_activation: Option<DrmPostActivationCredentials>,
}

impl DrmPreActivationCredentials {
    /// Whether this device has completed DRM activation.
    #[must_use]
    pub fn is_device_active(&self) -> bool {
        self.post_activation.is_some()
    }
}

/// Stored authentication secrets of an account.
///
/// Immutable: updates replace the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credentials {
    /// Barcode/username and PIN/password
    Basic {
        username: String,
        password: Secret,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        drm: Option<DrmPreActivationCredentials>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth_description: Option<String>,
    },
    /// Token obtained through an OAuth intermediary
    OAuthWithIntermediary {
        access_token: Secret,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        drm: Option<DrmPreActivationCredentials>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth_description: Option<String>,
    },
}

impl Credentials {
    /// Basic credentials without DRM data.
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: Secret::new(password),
            drm: None,
            auth_description: None,
        }
    }

    #[must_use]
    pub fn drm(&self) -> Option<&DrmPreActivationCredentials> {
        match self {
            Self::Basic { drm, .. } | Self::OAuthWithIntermediary { drm, .. } => drm.as_ref(),
        }
    }

    /// Post-activation DRM credentials, if the device is activated.
    #[must_use]
    pub fn drm_post_activation(&self) -> Option<&DrmPostActivationCredentials> {
        self.drm().and_then(|d| d.post_activation.as_ref())
    }

    /// Copy of these credentials with the DRM data replaced.
    #[must_use]
    pub fn with_drm(&self, new_drm: Option<DrmPreActivationCredentials>) -> Self {
        let mut copy = self.clone();
        match &mut copy {
            Self::Basic { drm, .. } | Self::OAuthWithIntermediary { drm, .. } => *drm = new_drm,
        }
        copy
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::Basic { username, .. } => Some(username),
            Self::OAuthWithIntermediary { .. } => None,
        }
    }

    /// Short name of the credential kind, for logs and step messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Basic { .. } => "basic",
            Self::OAuthWithIntermediary { .. } => "oauth_with_intermediary",
        }
    }
}
