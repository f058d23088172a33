//! `BookDatabase` implementation for `FsAccountsDatabase`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use libreader_core::error::{CoreError, CoreResult};
use libreader_core::traits::BookDatabase;
use libreader_core::types::{AccountId, BookEntry, BookFormat, BookId, DrmLoan};

use super::io::{
    read_json, remove_dir_if_exists, remove_file_if_exists, storage_error, write_json_atomic,
};
use super::FsAccountsDatabase;

const BOOKS_DIR: &str = "books";
const ENTRY_FILE: &str = "entry.json";

fn rights_file(book_dir: &Path, format: &BookFormat) -> PathBuf {
    book_dir.join(format!("rights-{}.json", format.name()))
}

/// Split an entry into what goes to `entry.json` and its rights sub-file.
fn split_rights(entry: &BookEntry) -> (BookEntry, Option<DrmLoan>) {
    let mut stored = entry.clone();
    let rights = match &mut stored.format {
        BookFormat::Epub { drm_rights, .. } => drm_rights.take(),
        BookFormat::Pdf { .. } | BookFormat::Audiobook { .. } => None,
    };
    (stored, rights)
}

fn attach_rights(entry: &mut BookEntry, rights: Option<DrmLoan>) {
    if let BookFormat::Epub { drm_rights, .. } = &mut entry.format {
        *drm_rights = rights;
    }
}

impl FsAccountsDatabase {
    async fn books_directory(&self, account_id: &AccountId) -> CoreResult<PathBuf> {
        Ok(self
            .require_account_directory(account_id)
            .await?
            .join(BOOKS_DIR))
    }

    async fn load_entry(book_dir: &Path) -> CoreResult<Option<BookEntry>> {
        let Some(mut entry) = read_json::<BookEntry>(&book_dir.join(ENTRY_FILE)).await? else {
            return Ok(None);
        };
        if entry.format.supports_drm() {
            let rights = read_json(&rights_file(book_dir, &entry.format)).await?;
            attach_rights(&mut entry, rights);
        }
        Ok(Some(entry))
    }
}

#[async_trait]
impl BookDatabase for FsAccountsDatabase {
    async fn entry(
        &self,
        account_id: &AccountId,
        book_id: &BookId,
    ) -> CoreResult<Option<BookEntry>> {
        let Ok(books) = self.books_directory(account_id).await else {
            return Ok(None);
        };
        Self::load_entry(&books.join(book_id.as_str())).await
    }

    async fn entries(&self, account_id: &AccountId) -> CoreResult<Vec<BookEntry>> {
        let Ok(books) = self.books_directory(account_id).await else {
            return Ok(Vec::new());
        };
        let mut dir = match fs::read_dir(&books).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error(&books, e)),
        };

        let mut entries = Vec::new();
        while let Some(item) = dir.next_entry().await.map_err(|e| storage_error(&books, e))? {
            let name = item.file_name().to_string_lossy().into_owned();
            if BookId::new(name.as_str()).is_err() {
                log::debug!("Ignoring {name} in {}", books.display());
                continue;
            }
            if let Some(entry) = Self::load_entry(&item.path()).await? {
                entries.push(entry);
            }
        }
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    async fn save_entry(&self, entry: &BookEntry) -> CoreResult<()> {
        let book_dir = self
            .books_directory(&entry.account_id)
            .await?
            .join(entry.id.as_str());
        let (stored, rights) = split_rights(entry);

        write_json_atomic(&book_dir.join(ENTRY_FILE), &stored).await?;
        let rights_path = rights_file(&book_dir, &entry.format);
        match rights {
            Some(rights) => write_json_atomic(&rights_path, &rights).await,
            None => remove_file_if_exists(&rights_path).await,
        }
    }

    async fn set_drm_rights(
        &self,
        account_id: &AccountId,
        book_id: &BookId,
        rights: Option<&DrmLoan>,
    ) -> CoreResult<()> {
        let book_dir = self.books_directory(account_id).await?.join(book_id.as_str());
        let entry = Self::load_entry(&book_dir)
            .await?
            .ok_or_else(|| CoreError::BookNotFound(book_id.to_string()))?;

        let rights_path = rights_file(&book_dir, &entry.format);
        match rights {
            Some(_) if !entry.format.supports_drm() => Err(CoreError::ValidationError(format!(
                "Format {} of book {book_id} cannot hold DRM rights",
                entry.format.name()
            ))),
            Some(rights) => write_json_atomic(&rights_path, rights).await,
            None => remove_file_if_exists(&rights_path).await,
        }
    }

    async fn delete_entry(&self, account_id: &AccountId, book_id: &BookId) -> CoreResult<()> {
        let book_dir = self.books_directory(account_id).await?.join(book_id.as_str());
        remove_dir_if_exists(&book_dir).await
    }

    async fn delete_all(&self, account_id: &AccountId) -> CoreResult<usize> {
        let books = self.books_directory(account_id).await?;
        let count = self.entries(account_id).await?.len();
        remove_dir_if_exists(&books).await?;
        log::debug!("Deleted {count} books of account {account_id}");
        Ok(count)
    }
}
