//! Book database types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use super::{AccountId, BookId};

/// A DRM loan held for a book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrmLoan {
    pub loan_id: String,
    /// Opaque vendor rights blob
    #[serde(with = "crate::utils::bytes")]
    pub data: Vec<u8>,
    /// Whether the vendor allows the loan to be returned early
    pub returnable: bool,
}

/// Format-specific state of a downloaded book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum BookFormat {
    Epub {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        drm_rights: Option<DrmLoan>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
    },
    Pdf {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file: Option<PathBuf>,
    },
    Audiobook {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        manifest_uri: Option<Url>,
    },
}

impl BookFormat {
    #[must_use]
    pub fn drm_rights(&self) -> Option<&DrmLoan> {
        match self {
            Self::Epub { drm_rights, .. } => drm_rights.as_ref(),
            Self::Pdf { .. } | Self::Audiobook { .. } => None,
        }
    }

    /// Name used for the format's rights sub-file.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Epub { .. } => "epub",
            Self::Pdf { .. } => "pdf",
            Self::Audiobook { .. } => "audiobook",
        }
    }

    /// Whether the format can carry DRM rights at all.
    #[must_use]
    pub fn supports_drm(&self) -> bool {
        matches!(self, Self::Epub { .. })
    }
}

/// A book held by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookEntry {
    pub id: BookId,
    pub account_id: AccountId,
    pub title: String,
    /// Server endpoint to notify when the loan is returned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoke_uri: Option<Url>,
    pub format: BookFormat,
}

impl BookEntry {
    #[must_use]
    pub fn drm_rights(&self) -> Option<&DrmLoan> {
        self.format.drm_rights()
    }
}
