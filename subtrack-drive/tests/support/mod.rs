//! Shared fakes and harness for engine tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use subtrack_drive::codec::{FileMetadata, MultipartBody};
use subtrack_drive::drive_client::DriveTransport;
use subtrack_drive::identity::IdentityProvider;
use subtrack_drive::readiness::Readiness;
use subtrack_drive::{
    APP_DATA_FOLDER, AccessRequest, DriveConfig, DriveError, DriveResult, FileQuery, RemoteFile,
    SyncEngine, TokenGrant,
};
use subtrack_store::{KeyValueStore, MemoryStore, StoreError, StoreResult};

// ── Fake Drive ──────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub content: String,
    pub modified_time: DateTime<Utc>,
    pub parents: Vec<String>,
    pub trashed: bool,
}

#[derive(Default)]
struct DriveState {
    token: Option<String>,
    files: Vec<StoredFile>,
    next_id: u64,
    calls: Vec<String>,
    uploads: Vec<MultipartBody>,
    fail_transfers: bool,
    fail_lists: bool,
    delay: Option<Duration>,
}

/// In-memory stand-in for the Drive app folder.
#[derive(Default)]
pub struct FakeDrive {
    state: Mutex<DriveState>,
}

impl FakeDrive {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DriveState> {
        self.state.lock().unwrap()
    }

    /// Seeds a file directly, bypassing the API.
    pub fn put_file(&self, name: &str, content: &serde_json::Value, modified: DateTime<Utc>) -> String {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("file-{}", state.next_id);
        state.files.push(StoredFile {
            id: id.clone(),
            name: name.to_string(),
            content: content.to_string(),
            modified_time: modified,
            parents: vec![APP_DATA_FOLDER.to_string()],
            trashed: false,
        });
        id
    }

    pub fn put_raw(&self, name: &str, raw: &str, modified: DateTime<Utc>) -> String {
        let id = self.put_file(name, &serde_json::Value::Null, modified);
        let mut state = self.lock();
        if let Some(file) = state.files.iter_mut().find(|f| f.id == id) {
            file.content = raw.to_string();
        }
        id
    }

    pub fn trash(&self, id: &str) {
        let mut state = self.lock();
        if let Some(file) = state.files.iter_mut().find(|f| f.id == id) {
            file.trashed = true;
        }
    }

    pub fn delete(&self, id: &str) {
        self.lock().files.retain(|f| f.id != id);
    }

    pub fn files(&self) -> Vec<StoredFile> {
        self.lock().files.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    pub fn uploads(&self) -> Vec<MultipartBody> {
        self.lock().uploads.clone()
    }

    pub fn installed_token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    pub fn set_fail_transfers(&self, fail: bool) {
        self.lock().fail_transfers = fail;
    }

    pub fn set_fail_lists(&self, fail: bool) {
        self.lock().fail_lists = fail;
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        self.lock().delay = delay;
    }

    async fn enter(&self, call: &str) -> DriveResult<()> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(call.to_string());
            if state.token.is_none() {
                return Err(DriveError::NotAuthenticated);
            }
            state.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

#[async_trait]
impl DriveTransport for FakeDrive {
    async fn set_access_token(&self, token: &str) -> DriveResult<()> {
        if token.trim().is_empty() || token.chars().any(|c| c.is_control()) {
            return Err(DriveError::Auth("malformed access token".into()));
        }
        self.lock().token = Some(token.to_string());
        Ok(())
    }

    async fn clear_access_token(&self) {
        self.lock().token = None;
    }

    async fn access_token(&self) -> Option<String> {
        self.lock().token.clone()
    }

    async fn list(&self, query: &FileQuery) -> DriveResult<Vec<RemoteFile>> {
        self.enter("list").await?;
        let state = self.lock();
        if state.fail_lists {
            return Err(DriveError::Remote("list failed: 500 Internal Server Error".into()));
        }
        Ok(state
            .files
            .iter()
            .filter(|f| f.name == query.name)
            .filter(|f| !(query.exclude_trashed && f.trashed))
            .filter(|f| f.parents.iter().any(|p| p == &query.space))
            .take(query.page_size as usize)
            .map(|f| RemoteFile {
                id: f.id.clone(),
                name: Some(f.name.clone()),
                modified_time: Some(f.modified_time),
            })
            .collect())
    }

    async fn get_media(&self, id: &str) -> DriveResult<Vec<u8>> {
        self.enter("get").await?;
        let state = self.lock();
        if state.fail_transfers {
            return Err(DriveError::Remote("download failed: 503 Service Unavailable".into()));
        }
        state
            .files
            .iter()
            .find(|f| f.id == id)
            .map(|f| f.content.clone().into_bytes())
            .ok_or_else(|| DriveError::Remote(format!("download failed: 404 {id}")))
    }

    async fn create(&self, body: MultipartBody) -> DriveResult<String> {
        self.enter("create").await?;
        let mut state = self.lock();
        if state.fail_transfers {
            return Err(DriveError::Remote("create failed: 503 Service Unavailable".into()));
        }
        let metadata: FileMetadata = serde_json::from_str(body.metadata_part().unwrap()).unwrap();
        let content = body.payload_part().unwrap().to_string();
        state.next_id += 1;
        let id = format!("file-{}", state.next_id);
        state.files.push(StoredFile {
            id: id.clone(),
            name: metadata.name,
            content,
            modified_time: Utc::now(),
            parents: metadata.parents.unwrap_or_default(),
            trashed: false,
        });
        state.uploads.push(body);
        Ok(id)
    }

    async fn update(&self, id: &str, body: MultipartBody) -> DriveResult<()> {
        self.enter("update").await?;
        let mut state = self.lock();
        if state.fail_transfers {
            return Err(DriveError::Remote("update failed: 503 Service Unavailable".into()));
        }
        let metadata: FileMetadata = serde_json::from_str(body.metadata_part().unwrap()).unwrap();
        let content = body.payload_part().unwrap().to_string();
        let file = state
            .files
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| DriveError::Remote(format!("update failed: 404 {id}")))?;
        file.name = metadata.name;
        file.content = content;
        file.modified_time = Utc::now();
        state.uploads.push(body);
        Ok(())
    }
}

// ── Fake Identity ───────────────────────────────────────────────

#[derive(Default)]
struct IdentityState {
    issued: u32,
    revoked: Vec<String>,
    requests: Vec<AccessRequest>,
    fail_requests: bool,
    fail_revokes: bool,
    next_token: Option<String>,
    expires_in: Option<i64>,
}

/// Identity provider that grants tokens without user interaction.
#[derive(Default)]
pub struct FakeIdentity {
    state: Mutex<IdentityState>,
}

impl FakeIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issued(&self) -> u32 {
        self.state.lock().unwrap().issued
    }

    pub fn revoked(&self) -> Vec<String> {
        self.state.lock().unwrap().revoked.clone()
    }

    pub fn requests(&self) -> Vec<AccessRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn set_fail_requests(&self, fail: bool) {
        self.state.lock().unwrap().fail_requests = fail;
    }

    pub fn set_fail_revokes(&self, fail: bool) {
        self.state.lock().unwrap().fail_revokes = fail;
    }

    /// Overrides the next issued token.
    pub fn set_next_token(&self, token: &str) {
        self.state.lock().unwrap().next_token = Some(token.to_string());
    }

    pub fn set_expires_in(&self, secs: i64) {
        self.state.lock().unwrap().expires_in = Some(secs);
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn request_access_token(&self, request: AccessRequest) -> DriveResult<TokenGrant> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request);
        if state.fail_requests {
            return Err(DriveError::Auth("access_denied".into()));
        }
        state.issued += 1;
        let access_token = state
            .next_token
            .take()
            .unwrap_or_else(|| format!("token-{}", state.issued));
        Ok(TokenGrant {
            access_token,
            expires_in: state.expires_in.unwrap_or(3600),
        })
    }

    async fn revoke(&self, token: &str) -> DriveResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_revokes {
            return Err(DriveError::Auth("revocation rejected with 400 Bad Request".into()));
        }
        state.revoked.push(token.to_string());
        Ok(())
    }
}

// ── Faulty Store ────────────────────────────────────────────────

/// Memory store whose removals can be made to fail, as on a full disk.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    fail_removes: Mutex<bool>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_removes(&self, fail: bool) {
        *self.fail_removes.lock().unwrap() = fail;
    }
}

impl KeyValueStore for FaultyStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        if *self.fail_removes.lock().unwrap() {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.remove(key)
    }
}

// ── Harness ─────────────────────────────────────────────────────

pub fn test_config() -> DriveConfig {
    DriveConfig {
        client_id: Some("test-client.apps.googleusercontent.com".into()),
        api_key: Some("test-api-key".into()),
        ready_timeout_secs: 1,
        request_timeout_secs: 5,
        ..DriveConfig::default()
    }
}

pub struct Harness {
    pub engine: SyncEngine,
    pub drive: Arc<FakeDrive>,
    pub identity: Arc<FakeIdentity>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    /// Builds a second engine sharing this one's drive, identity and store,
    /// as after a process restart.
    pub fn restart(&self) -> SyncEngine {
        build_engine(
            test_config(),
            self.drive.clone(),
            self.identity.clone(),
            self.store.clone(),
            Readiness::ready(),
        )
    }
}

pub fn build_engine(
    config: DriveConfig,
    drive: Arc<FakeDrive>,
    identity: Arc<FakeIdentity>,
    store: Arc<MemoryStore>,
    readiness: Readiness,
) -> SyncEngine {
    let store: Arc<dyn KeyValueStore> = store;
    SyncEngine::new(config, identity, drive, store, readiness).unwrap()
}

pub fn harness_with(config: DriveConfig, store: Arc<MemoryStore>, readiness: Readiness) -> Harness {
    let drive = Arc::new(FakeDrive::new());
    let identity = Arc::new(FakeIdentity::new());
    let engine = build_engine(config, drive.clone(), identity.clone(), store.clone(), readiness);
    Harness {
        engine,
        drive,
        identity,
        store,
    }
}

pub fn harness() -> Harness {
    harness_with(test_config(), Arc::new(MemoryStore::new()), Readiness::ready())
}

/// Initialized and signed in.
pub async fn connected() -> Harness {
    let h = harness();
    h.engine.initialize().await;
    h.engine.login().await.unwrap();
    h
}

/// Connected harness whose last sync time is pinned to `at`.
pub async fn connected_with_last_sync(at: DateTime<Utc>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            "last_sync_time",
            &at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        )
        .unwrap();
    let h = harness_with(test_config(), store, Readiness::ready());
    h.engine.initialize().await;
    h.engine.login().await.unwrap();
    h
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
