//! Test helpers
//!
//! Mock implementations and factory methods for tests.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::RwLock;
use url::Url;

use crate::error::{CoreError, CoreResult};
use crate::services::{ServiceContext, TaskSettings};
use crate::traits::{
    AccountsDatabase, BookDatabase, DrmConnector, DrmError, FeedError, FeedLoader,
    InMemoryProviderRegistry, LoanReturnReply, PatronClient, PatronError, PatronProfile,
    ProfilesDatabase,
};
use crate::types::{
    Account, AccountId, AccountProvider, BookEntry, BookFormat, BookId, DrmClientToken, DrmLoan,
    DrmPostActivationCredentials, DrmPreActivationCredentials, Credentials, LoginState,
    normalize_display_name, Profile, ProfileId, ProfilePreferences, ProviderAuthentication,
};

// ===== Fixtures =====

/// Provider `urn:fake:<n>` with barcode/PIN authentication.
pub fn fake_provider(n: u32) -> AccountProvider {
    fake_provider_with_auth(
        n,
        ProviderAuthentication::Basic {
            description: Some("Library card".to_string()),
            login_uri: Url::parse("https://example.com/patrons/me").unwrap(),
            barcode_format: None,
            pin_required: true,
        },
    )
}

pub fn fake_provider_with_auth(n: u32, authentication: ProviderAuthentication) -> AccountProvider {
    AccountProvider {
        id: Url::parse(&format!("urn:fake:{n}")).unwrap(),
        display_name: format!("Fake Library {n}"),
        subtitle: None,
        catalog_uri: Url::parse(&format!("https://example.com/{n}/catalog")).unwrap(),
        authentication,
        updated: Utc.timestamp_opt(1_600_000_000, 0).unwrap(),
    }
}

pub fn drm_credentials(activated: bool) -> DrmPreActivationCredentials {
    DrmPreActivationCredentials {
        vendor_id: "NYPL".to_string(),
        client_token: DrmClientToken::parse(
            "NYNYPL|536818535|b54be3a5-385b-42eb-9496-3879cb3ac3cc|TWFuIHN1ZmZlcnMK",
        )
        .unwrap(),
        device_manager_uri: None,
        post_activation: activated.then(|| DrmPostActivationCredentials {
            device_id: "4361a1f6-aea8-4681-ad8b-df7e6923049f".to_string(),
            user_id: "2bb42d71-42aa-4eb7-b8af-366171adcae8".to_string(),
        }),
    }
}

pub fn epub_entry(account_id: AccountId, book: &str, rights: Option<DrmLoan>) -> BookEntry {
    BookEntry {
        id: BookId::new(book).unwrap(),
        account_id,
        title: format!("Title {book}"),
        revoke_uri: None,
        format: BookFormat::Epub {
            drm_rights: rights,
            file: None,
        },
    }
}

pub fn pdf_entry(account_id: AccountId, book: &str) -> BookEntry {
    BookEntry {
        id: BookId::new(book).unwrap(),
        account_id,
        title: format!("Title {book}"),
        revoke_uri: None,
        format: BookFormat::Pdf { file: None },
    }
}

// ===== MockAccountsDatabase =====

pub struct MockAccountsDatabase {
    directory: PathBuf,
    accounts: RwLock<BTreeMap<AccountId, Account>>,
    /// Successfully applied login states, in order
    history: RwLock<Vec<LoginState>>,
    login_state_calls: AtomicUsize,
    /// If set, that `set_login_state` call (0-based) fails
    fail_login_state_call: Mutex<Option<usize>>,
}

impl MockAccountsDatabase {
    pub fn new() -> Self {
        Self {
            directory: PathBuf::from("/nonexistent/accounts"),
            accounts: RwLock::new(BTreeMap::new()),
            history: RwLock::new(Vec::new()),
            login_state_calls: AtomicUsize::new(0),
            fail_login_state_call: Mutex::new(None),
        }
    }

    /// Add an account directly, bypassing history.
    pub async fn insert(&self, provider: AccountProvider, login_state: LoginState) -> Account {
        let id = AccountId::new();
        let account = Account {
            id,
            provider,
            directory: self.directory.join(id.to_string()),
            login_state,
            created_at: Utc::now(),
        };
        self.accounts.write().await.insert(id, account.clone());
        account
    }

    pub async fn login_state_history(&self) -> Vec<LoginState> {
        self.history.read().await.clone()
    }

    pub fn fail_login_state_call(&self, call: usize) {
        *self.fail_login_state_call.lock().unwrap() = Some(call);
    }
}

#[async_trait]
impl AccountsDatabase for MockAccountsDatabase {
    fn directory(&self) -> &Path {
        &self.directory
    }

    async fn accounts(&self) -> CoreResult<Vec<Account>> {
        Ok(self.accounts.read().await.values().cloned().collect())
    }

    async fn find(&self, id: &AccountId) -> CoreResult<Option<Account>> {
        Ok(self.accounts.read().await.get(id).cloned())
    }

    async fn find_by_provider(&self, provider_id: &str) -> CoreResult<Option<Account>> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.provider.id.as_str() == provider_id)
            .cloned())
    }

    async fn create_account(&self, provider: &AccountProvider) -> CoreResult<Account> {
        if self.find_by_provider(provider.id.as_str()).await?.is_some() {
            return Err(CoreError::DuplicateProvider(provider.id.to_string()));
        }
        Ok(self.insert(provider.clone(), LoginState::NotLoggedIn).await)
    }

    async fn delete_account(&self, id: &AccountId) -> CoreResult<()> {
        self.accounts
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))
    }

    async fn set_login_state(&self, id: &AccountId, state: LoginState) -> CoreResult<LoginState> {
        let call = self.login_state_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_login_state_call.lock().unwrap() == Some(call) {
            return Err(CoreError::StorageError("disk full".to_string()));
        }
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;
        let previous = std::mem::replace(&mut account.login_state, state.clone());
        self.history.write().await.push(state);
        Ok(previous)
    }

    async fn set_account_provider(
        &self,
        id: &AccountId,
        provider: &AccountProvider,
    ) -> CoreResult<()> {
        let mut accounts = self.accounts.write().await;
        let account = accounts
            .get_mut(id)
            .ok_or_else(|| CoreError::AccountNotFound(id.to_string()))?;
        if account.provider.id != provider.id {
            return Err(CoreError::ProviderMismatch {
                expected: account.provider.id.to_string(),
                actual: provider.id.to_string(),
            });
        }
        account.provider = provider.clone();
        Ok(())
    }
}

// ===== MockBookDatabase =====

pub struct MockBookDatabase {
    entries: RwLock<HashMap<(AccountId, BookId), BookEntry>>,
    delete_calls: AtomicUsize,
    delete_all_calls: AtomicUsize,
    rights_calls: AtomicUsize,
    fail_deletes: AtomicBool,
    fail_rights: AtomicBool,
}

impl MockBookDatabase {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            delete_calls: AtomicUsize::new(0),
            delete_all_calls: AtomicUsize::new(0),
            rights_calls: AtomicUsize::new(0),
            fail_deletes: AtomicBool::new(false),
            fail_rights: AtomicBool::new(false),
        }
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub fn delete_all_calls(&self) -> usize {
        self.delete_all_calls.load(Ordering::SeqCst)
    }

    pub fn rights_calls(&self) -> usize {
        self.rights_calls.load(Ordering::SeqCst)
    }

    /// Make `delete_entry` and `delete_all` fail with an I/O error.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_rights(&self, fail: bool) {
        self.fail_rights.store(fail, Ordering::SeqCst);
    }

    fn io_error() -> CoreError {
        CoreError::StorageError("I/O error".to_string())
    }
}

#[async_trait]
impl BookDatabase for MockBookDatabase {
    async fn entry(
        &self,
        account_id: &AccountId,
        book_id: &BookId,
    ) -> CoreResult<Option<BookEntry>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(*account_id, book_id.clone()))
            .cloned())
    }

    async fn entries(&self, account_id: &AccountId) -> CoreResult<Vec<BookEntry>> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .await
            .values()
            .filter(|e| e.account_id == *account_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    async fn save_entry(&self, entry: &BookEntry) -> CoreResult<()> {
        self.entries
            .write()
            .await
            .insert((entry.account_id, entry.id.clone()), entry.clone());
        Ok(())
    }

    async fn set_drm_rights(
        &self,
        account_id: &AccountId,
        book_id: &BookId,
        rights: Option<&DrmLoan>,
    ) -> CoreResult<()> {
        self.rights_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_rights.load(Ordering::SeqCst) {
            return Err(Self::io_error());
        }
        let mut entries = self.entries.write().await;
        let entry = entries
            .get_mut(&(*account_id, book_id.clone()))
            .ok_or_else(|| CoreError::BookNotFound(book_id.to_string()))?;
        if let BookFormat::Epub { drm_rights, .. } = &mut entry.format {
            *drm_rights = rights.cloned();
        }
        Ok(())
    }

    async fn delete_entry(&self, account_id: &AccountId, book_id: &BookId) -> CoreResult<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::io_error());
        }
        self.entries
            .write()
            .await
            .remove(&(*account_id, book_id.clone()));
        Ok(())
    }

    async fn delete_all(&self, account_id: &AccountId) -> CoreResult<usize> {
        self.delete_all_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::io_error());
        }
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|(owner, _), _| owner != account_id);
        Ok(before - entries.len())
    }
}

// ===== MockDrmConnector =====

/// How the mock connector handles a loan return.
#[derive(Debug, Clone)]
pub enum LoanBehaviour {
    Succeed,
    Fail(String),
    /// Drop the reply without answering
    Drop,
    /// Keep the reply and never answer
    Hold,
    Error(String),
    Panic,
}

pub struct MockDrmConnector {
    loan_behaviour: LoanBehaviour,
    activation_failure: Option<String>,
    deactivation_failure: Option<String>,
    held: Mutex<Vec<LoanReturnReply>>,
    activation_calls: AtomicUsize,
    deactivation_calls: AtomicUsize,
    return_calls: AtomicUsize,
}

impl MockDrmConnector {
    pub fn new() -> Self {
        Self {
            loan_behaviour: LoanBehaviour::Succeed,
            activation_failure: None,
            deactivation_failure: None,
            held: Mutex::new(Vec::new()),
            activation_calls: AtomicUsize::new(0),
            deactivation_calls: AtomicUsize::new(0),
            return_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_loan_behaviour(mut self, behaviour: LoanBehaviour) -> Self {
        self.loan_behaviour = behaviour;
        self
    }

    pub fn with_activation_failure(mut self, code: &str) -> Self {
        self.activation_failure = Some(code.to_string());
        self
    }

    pub fn with_deactivation_failure(mut self, code: &str) -> Self {
        self.deactivation_failure = Some(code.to_string());
        self
    }

    pub fn activation_calls(&self) -> usize {
        self.activation_calls.load(Ordering::SeqCst)
    }

    pub fn deactivation_calls(&self) -> usize {
        self.deactivation_calls.load(Ordering::SeqCst)
    }

    pub fn return_calls(&self) -> usize {
        self.return_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DrmConnector for MockDrmConnector {
    fn system(&self) -> &str {
        "MockDRM"
    }

    async fn activate_device(
        &self,
        _drm: &DrmPreActivationCredentials,
    ) -> Result<DrmPostActivationCredentials, DrmError> {
        self.activation_calls.fetch_add(1, Ordering::SeqCst);
        match &self.activation_failure {
            Some(code) => Err(DrmError::Failed { code: code.clone() }),
            None => Ok(DrmPostActivationCredentials {
                device_id: "device-0".to_string(),
                user_id: "user-0".to_string(),
            }),
        }
    }

    async fn deactivate_device(
        &self,
        _drm: &DrmPreActivationCredentials,
        _activation: &DrmPostActivationCredentials,
    ) -> Result<(), DrmError> {
        self.deactivation_calls.fetch_add(1, Ordering::SeqCst);
        match &self.deactivation_failure {
            Some(code) => Err(DrmError::Failed { code: code.clone() }),
            None => Ok(()),
        }
    }

    async fn return_loan(
        &self,
        _drm: &DrmPreActivationCredentials,
        _activation: &DrmPostActivationCredentials,
        _loan: &DrmLoan,
        reply: LoanReturnReply,
    ) -> Result<(), DrmError> {
        self.return_calls.fetch_add(1, Ordering::SeqCst);
        match &self.loan_behaviour {
            LoanBehaviour::Succeed => reply.succeeded(),
            LoanBehaviour::Fail(code) => reply.failed(code.clone()),
            LoanBehaviour::Drop => drop(reply),
            LoanBehaviour::Hold => {
                self.held.lock().unwrap().push(reply);
            }
            LoanBehaviour::Error(message) => {
                return Err(DrmError::Io(std::io::Error::other(message.clone())));
            }
            LoanBehaviour::Panic => panic!("connector exploded"),
        }
        Ok(())
    }
}

// ===== MockPatronClient =====

pub struct MockPatronClient {
    response: RwLock<Result<PatronProfile, PatronError>>,
    calls: AtomicUsize,
}

impl MockPatronClient {
    pub fn new() -> Self {
        Self {
            response: RwLock::new(Ok(PatronProfile::default())),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn respond(&self, response: Result<PatronProfile, PatronError>) {
        *self.response.write().await = response;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PatronClient for MockPatronClient {
    async fn authenticate(
        &self,
        _provider: &AccountProvider,
        _credentials: &Credentials,
    ) -> Result<PatronProfile, PatronError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response.read().await.clone()
    }
}

// ===== MockFeedLoader =====

pub struct MockFeedLoader {
    failure: RwLock<Option<FeedError>>,
    calls: AtomicUsize,
}

impl MockFeedLoader {
    pub fn new() -> Self {
        Self {
            failure: RwLock::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub async fn fail_with(&self, failure: Option<FeedError>) {
        *self.failure.write().await = failure;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedLoader for MockFeedLoader {
    async fn revoke(&self, _account: &Account, _revoke_uri: &Url) -> Result<(), FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.read().await.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// ===== MockProfilesDatabase =====

#[derive(Default)]
struct ProfilesState {
    profiles: BTreeMap<ProfileId, Profile>,
    current: Option<ProfileId>,
}

pub struct MockProfilesDatabase {
    directory: PathBuf,
    state: RwLock<ProfilesState>,
    fail_writes: AtomicBool,
}

impl MockProfilesDatabase {
    pub fn new() -> Self {
        Self {
            directory: PathBuf::from("/nonexistent/profiles"),
            state: RwLock::new(ProfilesState::default()),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every later write fail with a storage error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> CoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CoreError::StorageError("read-only profiles".to_string()));
        }
        Ok(())
    }
}

fn name_taken(state: &ProfilesState, display_name: &str, except: Option<ProfileId>) -> bool {
    state
        .profiles
        .values()
        .any(|p| p.display_name == display_name && Some(p.id) != except)
}

#[async_trait]
impl ProfilesDatabase for MockProfilesDatabase {
    fn directory(&self) -> &Path {
        &self.directory
    }

    async fn profiles(&self) -> CoreResult<Vec<Profile>> {
        Ok(self.state.read().await.profiles.values().cloned().collect())
    }

    async fn find(&self, id: &ProfileId) -> CoreResult<Option<Profile>> {
        Ok(self.state.read().await.profiles.get(id).cloned())
    }

    async fn current(&self) -> CoreResult<Profile> {
        let state = self.state.read().await;
        state
            .current
            .and_then(|id| state.profiles.get(&id).cloned())
            .ok_or(CoreError::NoCurrentProfile)
    }

    async fn select(&self, id: &ProfileId) -> CoreResult<Profile> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::ProfileNotFound(id.to_string()))?;
        state.current = Some(*id);
        Ok(profile)
    }

    async fn create(
        &self,
        display_name: &str,
        preferences: ProfilePreferences,
    ) -> CoreResult<Profile> {
        let display_name = normalize_display_name(display_name)?;
        self.check_writable()?;
        let mut state = self.state.write().await;
        if name_taken(&state, &display_name, None) {
            return Err(CoreError::DuplicateDisplayName(display_name));
        }
        let id = ProfileId::new();
        let profile = Profile {
            id,
            display_name,
            preferences,
            directory: self.directory.join(id.to_string()),
            created_at: Utc::now(),
        };
        state.profiles.insert(id, profile.clone());
        Ok(profile)
    }

    async fn set_display_name(&self, id: &ProfileId, display_name: &str) -> CoreResult<String> {
        let display_name = normalize_display_name(display_name)?;
        self.check_writable()?;
        let mut state = self.state.write().await;
        if name_taken(&state, &display_name, Some(*id)) {
            return Err(CoreError::DuplicateDisplayName(display_name));
        }
        let profile = state
            .profiles
            .get_mut(id)
            .ok_or_else(|| CoreError::ProfileNotFound(id.to_string()))?;
        Ok(std::mem::replace(&mut profile.display_name, display_name))
    }

    async fn set_preferences(
        &self,
        id: &ProfileId,
        preferences: ProfilePreferences,
    ) -> CoreResult<ProfilePreferences> {
        self.check_writable()?;
        let mut state = self.state.write().await;
        let profile = state
            .profiles
            .get_mut(id)
            .ok_or_else(|| CoreError::ProfileNotFound(id.to_string()))?;
        Ok(std::mem::replace(&mut profile.preferences, preferences))
    }
}

// ===== Factory methods =====

/// A `ServiceContext` wired to mocks, with handles on each mock.
pub struct TestContext {
    pub ctx: Arc<ServiceContext>,
    pub accounts: Arc<MockAccountsDatabase>,
    pub books: Arc<MockBookDatabase>,
    pub registry: Arc<InMemoryProviderRegistry>,
    pub patron: Arc<MockPatronClient>,
    pub feed: Arc<MockFeedLoader>,
}

fn build_context(settings: TaskSettings, drm: Option<Arc<dyn DrmConnector>>) -> TestContext {
    let accounts = Arc::new(MockAccountsDatabase::new());
    let books = Arc::new(MockBookDatabase::new());
    let registry = Arc::new(InMemoryProviderRegistry::new());
    let patron = Arc::new(MockPatronClient::new());
    let feed = Arc::new(MockFeedLoader::new());

    let mut ctx = ServiceContext::new(
        accounts.clone(),
        books.clone(),
        registry.clone(),
        patron.clone(),
        feed.clone(),
        settings,
    );
    if let Some(connector) = drm {
        ctx = ctx.with_drm(connector);
    }

    TestContext {
        ctx: Arc::new(ctx),
        accounts,
        books,
        registry,
        patron,
        feed,
    }
}

/// Test context without DRM support
pub fn create_test_context() -> TestContext {
    build_context(TaskSettings::default(), None)
}

pub fn create_test_context_with_drm(connector: Arc<MockDrmConnector>) -> TestContext {
    build_context(TaskSettings::default(), Some(connector))
}

pub fn create_test_context_with_settings(settings: TaskSettings) -> TestContext {
    build_context(settings, None)
}
