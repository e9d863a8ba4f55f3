//! Drive sync orchestrator.
//!
//! Coordinates the session manager, remote locator and codec to:
//! - Push the local snapshot (create or replace the remote file)
//! - Pull the remote snapshot
//! - Reconcile on startup, pulling only when the remote copy is newer
//!   than the last sync by more than the skew tolerance
//!
//! Operations are serialized by one async mutex per engine, which also
//! guards the last-sync bookkeeping. Each remote call is bounded by the
//! configured request timeout.

use crate::codec::{self, FileMetadata};
use crate::config::DriveConfig;
use crate::drive_client::{DriveClient, DriveTransport};
use crate::error::{DriveError, DriveResult};
use crate::identity::{ConsentPrompt, GoogleIdentity, IdentityProvider};
use crate::locator::RemoteLocator;
use crate::readiness::Readiness;
use crate::session::SessionManager;
use crate::sync_state::SyncState;
use crate::types::{RemoteObjectRef, SyncStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use subtrack_store::KeyValueStore;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

/// Drive sync engine. Construct once per application lifetime.
pub struct SyncEngine {
    config: DriveConfig,
    session: SessionManager,
    locator: RemoteLocator,
    transport: Arc<dyn DriveTransport>,
    state: Mutex<SyncState>,
    status: Arc<watch::Sender<SyncStatus>>,
}

/// Holds `syncing = true` for its lifetime.
struct SyncingGuard<'a> {
    status: &'a watch::Sender<SyncStatus>,
}

impl<'a> SyncingGuard<'a> {
    fn begin(status: &'a watch::Sender<SyncStatus>) -> Self {
        status.send_modify(|s| s.syncing = true);
        Self { status }
    }
}

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.status.send_modify(|s| s.syncing = false);
    }
}

impl SyncEngine {
    pub fn new(
        config: DriveConfig,
        identity: Arc<dyn IdentityProvider>,
        transport: Arc<dyn DriveTransport>,
        store: Arc<dyn KeyValueStore>,
        readiness: Readiness,
    ) -> DriveResult<Self> {
        let state = SyncState::load(store.clone())?;
        let status = Arc::new(watch::Sender::new(SyncStatus {
            last_sync_time: state.last_sync_time(),
            ..SyncStatus::default()
        }));

        let session = SessionManager::new(
            config.clone(),
            identity,
            transport.clone(),
            store,
            readiness,
            status.clone(),
        );
        let locator = RemoteLocator::new(transport.clone(), config.file_name.clone());

        Ok(Self {
            config,
            session,
            locator,
            transport,
            state: Mutex::new(state),
            status,
        })
    }

    /// Wires the engine to Google Drive and Google OAuth.
    pub fn google(
        config: DriveConfig,
        store: Arc<dyn KeyValueStore>,
        prompt: Arc<dyn ConsentPrompt>,
        readiness: Readiness,
    ) -> DriveResult<Self> {
        let transport = Arc::new(DriveClient::new(&config)?);
        let identity = Arc::new(GoogleIdentity::new(&config, prompt)?);
        Self::new(config, identity, transport, store, readiness)
    }

    // ── Session ──

    /// See [`SessionManager::initialize`]. Never fails.
    pub async fn initialize(&self) {
        self.session.initialize().await;
    }

    pub async fn login(&self) -> DriveResult<()> {
        self.session.login().await
    }

    pub async fn logout(&self) -> DriveResult<()> {
        self.session.logout().await
    }

    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    // ── Status ──

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Subscribes to status changes (e.g. to drive a "syncing" indicator).
    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.status.borrow().last_sync_time
    }

    // ── Sync ──

    /// Uploads `data`, replacing the remote file or creating it.
    ///
    /// Does nothing when not connected, so callers may push opportunistically
    /// without tracking auth state. The last sync time advances only when
    /// the upload succeeds.
    pub async fn push<T>(&self, data: &T) -> DriveResult<()>
    where
        T: Serialize + ?Sized,
    {
        if !self.session.is_authenticated() || !self.session.is_initialized() {
            debug!("push skipped: drive not connected");
            return Ok(());
        }

        let mut state = self.state.lock().await;
        let _syncing = SyncingGuard::begin(&self.status);

        self.push_locked(&mut state, data)
            .await
            .inspect_err(|e| warn!("push to drive failed: {e}"))
    }

    /// Downloads and decodes the remote file. `Ok(None)` if it does not
    /// exist yet.
    pub async fn pull<T: DeserializeOwned>(&self) -> DriveResult<Option<T>> {
        if !self.session.is_authenticated() {
            return Err(DriveError::NotAuthenticated);
        }
        if !self.session.is_initialized() {
            return Err(DriveError::NotReady("drive sync not initialized".to_string()));
        }

        let mut state = self.state.lock().await;
        let _syncing = SyncingGuard::begin(&self.status);

        self.pull_locked(&mut state)
            .await
            .inspect_err(|e| warn!("pull from drive failed: {e}"))
    }

    /// Pulls the remote file if it is newer than the last sync by more than
    /// the skew tolerance, handing it to `on_restore`. Returns whether a
    /// restore happened. Never fails; errors are logged and yield `false`.
    pub async fn reconcile<F>(&self, on_restore: F) -> bool
    where
        F: FnOnce(Value),
    {
        if !self.session.is_authenticated() || !self.session.is_initialized() {
            return false;
        }

        let mut state = self.state.lock().await;
        let _syncing = SyncingGuard::begin(&self.status);

        match self.reconcile_locked(&mut state, on_restore).await {
            Ok(restored) => restored,
            Err(e) => {
                warn!("auto sync failed: {e}");
                false
            }
        }
    }

    async fn push_locked<T>(&self, state: &mut SyncState, data: &T) -> DriveResult<()>
    where
        T: Serialize + ?Sized,
    {
        let file_name = self.locator.file_name();
        match self.bounded("locate", self.locator.find_object()).await? {
            Some(RemoteObjectRef { id, .. }) => {
                let body = codec::encode(&FileMetadata::for_update(file_name), data)?;
                self.bounded("update", self.transport.update(&id, body)).await?;
                info!("replaced drive file {id}");
            }
            None => {
                let body = codec::encode(&FileMetadata::for_create(file_name), data)?;
                let id = self.bounded("create", self.transport.create(body)).await?;
                info!("created drive file {id}");
            }
        }

        self.record_sync(state);
        Ok(())
    }

    async fn pull_locked<T: DeserializeOwned>(&self, state: &mut SyncState) -> DriveResult<Option<T>> {
        let Some(object) = self.bounded("locate", self.locator.find_object()).await? else {
            info!("no drive file yet, nothing to pull");
            return Ok(None);
        };

        let raw = self
            .bounded("download", self.transport.get_media(&object.id))
            .await?;
        let payload = codec::decode(&raw)?;

        self.record_sync(state);
        Ok(Some(payload))
    }

    async fn reconcile_locked<F>(&self, state: &mut SyncState, on_restore: F) -> DriveResult<bool>
    where
        F: FnOnce(Value),
    {
        let Some(object) = self.bounded("locate", self.locator.find_object()).await? else {
            return Ok(false);
        };
        let Some(modified_at) = object.modified_at else {
            debug!("drive file {} has no modifiedTime, skipping", object.id);
            return Ok(false);
        };

        let drive_ms = modified_at.timestamp_millis();
        let local_ms = state.last_sync_ms();
        info!(
            "auto sync check: drive {modified_at}, local {}",
            DateTime::from_timestamp_millis(local_ms).unwrap_or_default()
        );

        if drive_ms <= local_ms + self.config.skew_tolerance_ms {
            return Ok(false);
        }

        info!("drive copy is newer, downloading");
        let raw = self
            .bounded("download", self.transport.get_media(&object.id))
            .await?;
        let payload: Value = codec::decode(&raw)?;
        if payload.is_null() {
            warn!("drive file {} is empty, not restoring", object.id);
            return Ok(false);
        }

        on_restore(payload);
        self.record_sync(state);
        Ok(true)
    }

    /// Stamps "now" as the last successful sync.
    fn record_sync(&self, state: &mut SyncState) {
        let at = match state.record(Utc::now()) {
            Ok(at) => at,
            Err(e) => {
                warn!("failed to persist last sync time: {e}");
                match state.last_sync_time() {
                    Some(at) => at,
                    None => return,
                }
            }
        };
        self.status.send_modify(|s| s.last_sync_time = Some(at));
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = DriveResult<T>>,
    ) -> DriveResult<T> {
        let limit = self.config.request_timeout();
        tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| DriveError::Timeout {
                operation,
                secs: limit.as_secs(),
            })?
    }
}
