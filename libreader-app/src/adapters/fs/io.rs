//! JSON file helpers shared by the filesystem adapters.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use libreader_core::error::{CoreError, CoreResult};

/// Suffix of files being written; leftovers are ignored when reading.
pub(crate) const TMP_SUFFIX: &str = ".tmp";

pub(crate) fn storage_error(path: &Path, e: impl std::fmt::Display) -> CoreError {
    CoreError::StorageError(format!("{}: {e}", path.display()))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(TMP_SUFFIX);
    path.with_file_name(name)
}

/// Check that `directory` is a directory, creating it when missing.
///
/// Failures are returned as open-error causes.
pub(crate) async fn ensure_directory(directory: &Path) -> Result<(), String> {
    match fs::metadata(directory).await {
        Ok(meta) if !meta.is_dir() => Err("Not a directory".to_string()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::create_dir_all(directory).await.map_err(|e| e.to_string())
        }
        Err(e) => Err(e.to_string()),
    }
}

/// Write `value` as JSON to `path` via a temporary file and a rename.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> CoreResult<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| CoreError::SerializationError(e.to_string()))?;
    write_atomic(path, &bytes).await
}

pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| storage_error(parent, e))?;
    }
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).await.map_err(|e| storage_error(&tmp, e))?;
    if let Err(e) = fs::rename(&tmp, path).await {
        if let Err(cleanup) = fs::remove_file(&tmp).await {
            log::warn!("Cleanup: failed to remove {}: {cleanup}", tmp.display());
        }
        return Err(storage_error(path, e));
    }
    Ok(())
}

/// Read JSON from `path`; `Ok(None)` when the file does not exist.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> CoreResult<Option<T>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(storage_error(path, e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| CoreError::SerializationError(format!("{}: {e}", path.display())))
}

/// Remove a file; a missing file is not an error.
pub(crate) async fn remove_file_if_exists(path: &Path) -> CoreResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_error(path, e)),
    }
}

/// Remove a directory tree; a missing directory is not an error.
pub(crate) async fn remove_dir_if_exists(path: &Path) -> CoreResult<()> {
    match fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(storage_error(path, e)),
    }
}
