//! Book database abstraction

use async_trait::async_trait;

use crate::error::CoreResult;
use crate::types::{AccountId, BookEntry, BookId, DrmLoan};

/// Books held by each account
///
/// Implementations:
/// - `FsAccountsDatabase` (app crate, stored below each account directory)
#[async_trait]
pub trait BookDatabase: Send + Sync {
    async fn entry(&self, account_id: &AccountId, book_id: &BookId)
        -> CoreResult<Option<BookEntry>>;

    /// All entries of an account, ordered by book id.
    async fn entries(&self, account_id: &AccountId) -> CoreResult<Vec<BookEntry>>;

    /// Create or replace an entry.
    async fn save_entry(&self, entry: &BookEntry) -> CoreResult<()>;

    /// Set or clear the DRM rights of an entry's format.
    async fn set_drm_rights(
        &self,
        account_id: &AccountId,
        book_id: &BookId,
        rights: Option<&DrmLoan>,
    ) -> CoreResult<()>;

    /// Delete an entry and everything stored with it.
    async fn delete_entry(&self, account_id: &AccountId, book_id: &BookId) -> CoreResult<()>;

    /// Delete every entry of an account, returning how many were removed.
    async fn delete_all(&self, account_id: &AccountId) -> CoreResult<usize>;
}
