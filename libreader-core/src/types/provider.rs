//! Account provider (library) descriptors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// How patrons of a provider authenticate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderAuthentication {
    /// No login; catalog is public
    Anonymous,
    /// Barcode and PIN
    Basic {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        login_uri: Url,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        barcode_format: Option<String>,
        #[serde(default = "default_pin_required")]
        pin_required: bool,
    },
    /// Login delegated to an OAuth intermediary
    OAuthWithIntermediary {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        authenticate_uri: Url,
    },
}

fn default_pin_required() -> bool {
    true
}

impl ProviderAuthentication {
    #[must_use]
    pub fn requires_login(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Basic { description, .. } | Self::OAuthWithIntermediary { description, .. } => {
                description.as_deref()
            }
        }
    }
}

/// Descriptor of a library that accounts can be created for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProvider {
    /// Provider URI, unique across the registry
    pub id: Url,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    pub catalog_uri: Url,
    pub authentication: ProviderAuthentication,
    #[serde(with = "crate::utils::datetime")]
    pub updated: DateTime<Utc>,
}

impl AccountProvider {
    /// Whether this description supersedes `other`.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.updated > other.updated
    }

    #[must_use]
    pub fn id_str(&self) -> &str {
        self.id.as_str()
    }
}
