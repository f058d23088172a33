#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for `FsAccountsDatabase`.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use libreader_app::adapters::FsAccountsDatabase;
use libreader_core::error::CoreError;
use libreader_core::traits::{AccountsDatabase, BookDatabase, CredentialStore, InMemoryCredentialStore};
use libreader_core::types::{
    AccountId, AccountProvider, BookEntry, BookFormat, BookId, Credentials, DrmLoan, LoginState,
    ProviderAuthentication,
};
use url::Url;

fn provider(n: u32) -> AccountProvider {
    AccountProvider {
        id: Url::parse(&format!("urn:fake:{n}")).unwrap(),
        display_name: format!("Fake Library {n}"),
        subtitle: None,
        catalog_uri: Url::parse(&format!("https://example.com/{n}/catalog")).unwrap(),
        authentication: ProviderAuthentication::Anonymous,
        updated: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
    }
}

fn epub(account_id: AccountId, book: &str, rights: Option<DrmLoan>) -> BookEntry {
    BookEntry {
        id: BookId::new(book).unwrap(),
        account_id,
        title: format!("Book {book}"),
        revoke_uri: None,
        format: BookFormat::Epub {
            drm_rights: rights,
            file: None,
        },
    }
}

fn loan() -> DrmLoan {
    DrmLoan {
        loan_id: "loan-1".to_string(),
        data: vec![1, 2, 3],
        returnable: true,
    }
}

async fn open(
    dir: &std::path::Path,
    credentials: &Arc<InMemoryCredentialStore>,
) -> Result<FsAccountsDatabase, CoreError> {
    FsAccountsDatabase::open(dir.join("accounts"), credentials.clone()).await
}

fn open_causes(result: Result<FsAccountsDatabase, CoreError>) -> Vec<String> {
    match result {
        Err(CoreError::AccountsDatabaseOpen { causes, .. }) => causes,
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("database opened"),
    }
}

// ===== Opening =====

#[tokio::test]
async fn open_creates_missing_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());

    let db = open(tmp.path(), &credentials).await.unwrap();

    assert!(db.directory().is_dir());
    assert!(db.accounts().await.unwrap().is_empty());
}

#[tokio::test]
async fn open_rejects_plain_file() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("accounts"), b"x").unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());

    let causes = open_causes(open(tmp.path(), &credentials).await);

    assert_eq!(causes, vec!["Not a directory".to_string()]);
}

#[tokio::test]
async fn open_reports_every_unparseable_account() {
    let tmp = tempfile::tempdir().unwrap();
    let accounts = tmp.path().join("accounts");
    std::fs::create_dir_all(accounts.join("not-a-uuid")).unwrap();
    let missing = AccountId::new();
    std::fs::create_dir_all(accounts.join(missing.to_string())).unwrap();
    let garbled = AccountId::new();
    std::fs::create_dir_all(accounts.join(garbled.to_string())).unwrap();
    std::fs::write(accounts.join(garbled.to_string()).join("account.json"), b"{").unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());

    let causes = open_causes(open(tmp.path(), &credentials).await);

    assert_eq!(causes.len(), 3);
    assert!(causes.iter().all(|c| c.starts_with("Could not parse account: ")));
}

#[tokio::test]
async fn open_rejects_mismatched_descriptor() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let account = {
        let db = open(tmp.path(), &credentials).await.unwrap();
        db.create_account(&provider(0)).await.unwrap()
    };
    let moved = tmp.path().join("accounts").join(AccountId::new().to_string());
    std::fs::rename(&account.directory, &moved).unwrap();

    let causes = open_causes(open(tmp.path(), &credentials).await);

    assert_eq!(causes.len(), 1);
    assert!(causes[0].contains("does not match"));
}

#[tokio::test]
async fn open_ignores_stray_files_and_leftovers() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    {
        let db = open(tmp.path(), &credentials).await.unwrap();
        db.create_account(&provider(0)).await.unwrap();
    }
    let accounts = tmp.path().join("accounts");
    std::fs::write(accounts.join("notes.txt"), b"hello").unwrap();
    std::fs::create_dir_all(accounts.join(format!("{}.tmp", AccountId::new()))).unwrap();

    let db = open(tmp.path(), &credentials).await.unwrap();

    assert_eq!(db.accounts().await.unwrap().len(), 1);
}

// ===== Accounts =====

#[tokio::test]
async fn duplicate_provider_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let db = open(tmp.path(), &credentials).await.unwrap();

    db.create_account(&provider(0)).await.unwrap();
    let result = db.create_account(&provider(0)).await;

    assert!(matches!(result, Err(CoreError::DuplicateProvider(_))));
    assert_eq!(db.accounts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn distinct_providers_get_distinct_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let db = open(tmp.path(), &credentials).await.unwrap();

    let a = db.create_account(&provider(0)).await.unwrap();
    let b = db.create_account(&provider(1)).await.unwrap();

    assert_ne!(a.id, b.id);
    assert_ne!(a.directory, b.directory);
    assert!(a.directory.join("account.json").is_file());
    assert_eq!(
        db.find_by_provider("urn:fake:1").await.unwrap().map(|a| a.id),
        Some(b.id)
    );
}

#[tokio::test]
async fn reopen_restores_accounts() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let created = {
        let db = open(tmp.path(), &credentials).await.unwrap();
        let mut created = vec![
            db.create_account(&provider(0)).await.unwrap(),
            db.create_account(&provider(1)).await.unwrap(),
            db.create_account(&provider(2)).await.unwrap(),
        ];
        created.sort_by_key(|a| a.id);
        created
    };

    let db = open(tmp.path(), &credentials).await.unwrap();
    let reopened = db.accounts().await.unwrap();

    assert_eq!(reopened.len(), 3);
    for (before, after) in created.iter().zip(&reopened) {
        assert_eq!(before.id, after.id);
        assert_eq!(before.directory, after.directory);
        assert_eq!(before.provider.id, after.provider.id);
    }
}

#[tokio::test]
async fn login_state_survives_reopen_through_credentials() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let creds = Credentials::basic("abcd", "1234");
    let (logged_in, logged_out) = {
        let db = open(tmp.path(), &credentials).await.unwrap();
        let a = db.create_account(&provider(0)).await.unwrap();
        let b = db.create_account(&provider(1)).await.unwrap();
        let previous = db
            .set_login_state(&a.id, LoginState::logged_in(creds.clone()))
            .await
            .unwrap();
        assert_eq!(previous, LoginState::NotLoggedIn);
        db.set_login_state(&b.id, LoginState::LoggingIn).await.unwrap();
        (a.id, b.id)
    };

    assert_eq!(credentials.get(&logged_in).await.unwrap(), Some(creds.clone()));
    assert!(credentials.get(&logged_out).await.unwrap().is_none());

    let db = open(tmp.path(), &credentials).await.unwrap();
    assert_eq!(
        db.find(&logged_in).await.unwrap().unwrap().login_state,
        LoginState::logged_in(creds)
    );
    assert_eq!(
        db.find(&logged_out).await.unwrap().unwrap().login_state,
        LoginState::NotLoggedIn
    );
}

#[tokio::test]
async fn logging_out_keeps_credentials_until_done() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let db = open(tmp.path(), &credentials).await.unwrap();
    let account = db.create_account(&provider(0)).await.unwrap();
    let creds = Credentials::basic("abcd", "1234");

    db.set_login_state(&account.id, LoginState::logged_in(creds.clone()))
        .await
        .unwrap();
    db.set_login_state(
        &account.id,
        LoginState::LoggingOut {
            credentials: creds.clone(),
        },
    )
    .await
    .unwrap();
    assert_eq!(credentials.get(&account.id).await.unwrap(), Some(creds));

    db.set_login_state(&account.id, LoginState::NotLoggedIn)
        .await
        .unwrap();
    assert!(credentials.get(&account.id).await.unwrap().is_none());
}

#[tokio::test]
async fn set_login_state_of_unknown_account() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let db = open(tmp.path(), &credentials).await.unwrap();

    let result = db
        .set_login_state(&AccountId::new(), LoginState::LoggingIn)
        .await;

    assert!(matches!(result, Err(CoreError::AccountNotFound(_))));
}

#[tokio::test]
async fn delete_account_removes_directory_and_credentials() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let db = open(tmp.path(), &credentials).await.unwrap();
    let account = db.create_account(&provider(0)).await.unwrap();
    db.set_login_state(
        &account.id,
        LoginState::logged_in(Credentials::basic("abcd", "1234")),
    )
    .await
    .unwrap();

    db.delete_account(&account.id).await.unwrap();

    assert!(!account.directory.exists());
    assert!(db.find(&account.id).await.unwrap().is_none());
    assert!(credentials.get(&account.id).await.unwrap().is_none());
    // The provider can be enrolled again.
    db.create_account(&provider(0)).await.unwrap();
}

#[tokio::test]
async fn provider_description_is_replaced_and_persisted() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let account_id = {
        let db = open(tmp.path(), &credentials).await.unwrap();
        let account = db.create_account(&provider(0)).await.unwrap();
        let mut renamed = provider(0);
        renamed.display_name = "Renamed".to_string();
        db.set_account_provider(&account.id, &renamed).await.unwrap();

        let mismatch = db.set_account_provider(&account.id, &provider(1)).await;
        assert!(matches!(mismatch, Err(CoreError::ProviderMismatch { .. })));
        account.id
    };

    let db = open(tmp.path(), &credentials).await.unwrap();
    let account = db.find(&account_id).await.unwrap().unwrap();
    assert_eq!(account.provider.display_name, "Renamed");
}

// ===== Books =====

#[tokio::test]
async fn book_rights_live_in_a_sub_file() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let db = open(tmp.path(), &credentials).await.unwrap();
    let account = db.create_account(&provider(0)).await.unwrap();
    let entry = epub(account.id, "a", Some(loan()));

    db.save_entry(&entry).await.unwrap();

    let book_dir = account.directory.join("books").join("a");
    assert!(book_dir.join("entry.json").is_file());
    assert!(book_dir.join("rights-epub.json").is_file());
    let stored = db.entry(&account.id, &entry.id).await.unwrap().unwrap();
    assert_eq!(stored, entry);

    db.set_drm_rights(&account.id, &entry.id, None).await.unwrap();
    assert!(!book_dir.join("rights-epub.json").exists());
    let stored = db.entry(&account.id, &entry.id).await.unwrap().unwrap();
    assert!(stored.drm_rights().is_none());
}

#[tokio::test]
async fn rights_on_unknown_book_or_pdf_fail() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let db = open(tmp.path(), &credentials).await.unwrap();
    let account = db.create_account(&provider(0)).await.unwrap();
    let pdf = BookEntry {
        id: BookId::new("p").unwrap(),
        account_id: account.id,
        title: "PDF".to_string(),
        revoke_uri: None,
        format: BookFormat::Pdf { file: None },
    };
    db.save_entry(&pdf).await.unwrap();

    let missing = db
        .set_drm_rights(&account.id, &BookId::new("x").unwrap(), Some(&loan()))
        .await;
    assert!(matches!(missing, Err(CoreError::BookNotFound(_))));

    let unsupported = db.set_drm_rights(&account.id, &pdf.id, Some(&loan())).await;
    assert!(matches!(unsupported, Err(CoreError::ValidationError(_))));
}

#[tokio::test]
async fn entries_are_sorted_and_deleted() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let db = open(tmp.path(), &credentials).await.unwrap();
    let account = db.create_account(&provider(0)).await.unwrap();
    for book in ["c", "a", "b"] {
        db.save_entry(&epub(account.id, book, None)).await.unwrap();
    }

    let ids: Vec<_> = db
        .entries(&account.id)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.id.to_string())
        .collect();
    assert_eq!(ids, ["a", "b", "c"]);

    db.delete_entry(&account.id, &BookId::new("b").unwrap())
        .await
        .unwrap();
    db.delete_entry(&account.id, &BookId::new("b").unwrap())
        .await
        .unwrap();
    assert_eq!(db.entries(&account.id).await.unwrap().len(), 2);

    assert_eq!(db.delete_all(&account.id).await.unwrap(), 2);
    assert!(db.entries(&account.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn books_of_unknown_account() {
    let tmp = tempfile::tempdir().unwrap();
    let credentials = Arc::new(InMemoryCredentialStore::new());
    let db = open(tmp.path(), &credentials).await.unwrap();
    let stranger = AccountId::new();

    assert!(db.entries(&stranger).await.unwrap().is_empty());
    let result = db.save_entry(&epub(stranger, "a", None)).await;
    assert!(matches!(result, Err(CoreError::AccountNotFound(_))));
}
