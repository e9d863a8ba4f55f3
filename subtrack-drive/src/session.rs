//! Access session lifecycle: initialize, restore, login, logout.
//!
//! The session is persisted to the local key-value store so it survives
//! restarts. Expired or uninstallable tokens are never purged on restore;
//! only a later successful login overwrites them.

use crate::config::DriveConfig;
use crate::drive_client::DriveTransport;
use crate::error::{DriveError, DriveResult};
use crate::identity::IdentityProvider;
use crate::readiness::Readiness;
use crate::types::{AccessRequest, ConsentPromptMode, Session, SyncStatus};
use chrono::Utc;
use std::sync::Arc;
use subtrack_store::KeyValueStore;
use tokio::sync::{RwLock, watch};
use tracing::{debug, info, warn};

pub const KEY_ACCESS_TOKEN: &str = "google_access_token";
pub const KEY_TOKEN_EXPIRY: &str = "google_token_expiry";
pub const KEY_LOGGED_IN: &str = "google_logged_in";

/// Owns the access credential and the `initialized`/`authenticated` status.
pub struct SessionManager {
    config: DriveConfig,
    identity: Arc<dyn IdentityProvider>,
    transport: Arc<dyn DriveTransport>,
    store: Arc<dyn KeyValueStore>,
    readiness: Readiness,
    status: Arc<watch::Sender<SyncStatus>>,
    session: RwLock<Session>,
}

impl SessionManager {
    pub fn new(
        config: DriveConfig,
        identity: Arc<dyn IdentityProvider>,
        transport: Arc<dyn DriveTransport>,
        store: Arc<dyn KeyValueStore>,
        readiness: Readiness,
        status: Arc<watch::Sender<SyncStatus>>,
    ) -> Self {
        Self {
            config,
            identity,
            transport,
            store,
            readiness,
            status,
            session: RwLock::new(Session::default()),
        }
    }

    /// Brings the session up. Never fails: problems are recorded in
    /// `init_error` and leave the engine usable but unauthenticated.
    pub async fn initialize(&self) {
        if self.is_initialized() {
            return;
        }

        let missing = self.config.missing_credentials();
        if !missing.is_empty() {
            let err = DriveError::Configuration(format!(
                "missing credentials: {}",
                missing.join(", ")
            ));
            warn!("drive sync disabled: {err}");
            self.record_init_error(&err);
            return;
        }

        if let Err(e) = self.readiness.wait(self.config.ready_timeout()).await {
            warn!("drive sync initialization aborted: {e}");
            self.record_init_error(&e);
            return;
        }

        if let Err(e) = self.restore_session().await {
            warn!("session restore failed: {e}");
            self.record_init_error(&e);
            return;
        }

        self.status.send_modify(|s| {
            s.initialized = true;
            s.init_error = None;
        });
        info!("drive sync initialized");
    }

    /// Reinstalls a persisted, unexpired token. Returns whether the session
    /// is now authenticated.
    pub async fn restore_session(&self) -> DriveResult<bool> {
        let token = self.store.get(KEY_ACCESS_TOKEN)?;
        let expires_at_ms = self
            .store
            .get(KEY_TOKEN_EXPIRY)?
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0);
        let now = now_ms();

        let stored = token.map(|access_token| Session {
            access_token,
            expires_at_ms,
            authenticated: true,
        });

        let authenticated = match stored {
            Some(session) if !session.is_expired_at(now) => {
                match self.transport.set_access_token(&session.access_token).await {
                    Ok(()) => {
                        info!("session restored, expires in {}s", (expires_at_ms - now) / 1000);
                        *self.session.write().await = session;
                        true
                    }
                    Err(e) => {
                        warn!("failed to install stored token: {e}");
                        false
                    }
                }
            }
            Some(_) => {
                debug!("stored token has expired, sign-in required");
                false
            }
            None => false,
        };

        if !authenticated {
            self.session.write().await.authenticated = false;
        }
        self.set_authenticated(authenticated);
        Ok(authenticated)
    }

    /// Interactively obtains a new token and persists it.
    pub async fn login(&self) -> DriveResult<()> {
        if !self.is_initialized() {
            return Err(DriveError::NotReady(
                "login attempted before initialization completed".to_string(),
            ));
        }

        let grant = self
            .identity
            .request_access_token(AccessRequest {
                prompt: ConsentPromptMode::SelectAccount,
            })
            .await
            .map_err(into_auth_error)?;

        let expires_at_ms = grant
            .expires_in
            .checked_mul(1000)
            .and_then(|ms| now_ms().checked_add(ms))
            .ok_or_else(|| DriveError::Auth("token lifetime out of range".to_string()))?;
        self.transport
            .set_access_token(&grant.access_token)
            .await
            .map_err(into_auth_error)?;

        self.store.set(KEY_ACCESS_TOKEN, &grant.access_token)?;
        self.store.set(KEY_TOKEN_EXPIRY, &expires_at_ms.to_string())?;
        self.store.set(KEY_LOGGED_IN, "true")?;

        *self.session.write().await = Session {
            access_token: grant.access_token,
            expires_at_ms,
            authenticated: true,
        };
        self.set_authenticated(true);
        info!("signed in, token valid for {}s", grant.expires_in);
        Ok(())
    }

    /// Revokes and forgets the installed token. No-op if none is installed.
    ///
    /// Local state is cleared even when revocation fails or a stored key
    /// cannot be removed. The first such error is still returned, revocation
    /// first.
    pub async fn logout(&self) -> DriveResult<()> {
        let Some(token) = self.transport.access_token().await else {
            debug!("logout with no installed token");
            return Ok(());
        };

        let revoked = self.identity.revoke(&token).await.map_err(into_auth_error);

        self.transport.clear_access_token().await;
        *self.session.write().await = Session::default();
        self.set_authenticated(false);

        let mut forgotten = Ok(());
        for key in [KEY_ACCESS_TOKEN, KEY_TOKEN_EXPIRY, KEY_LOGGED_IN] {
            if let Err(e) = self.store.remove(key) {
                warn!("failed to forget {key}: {e}");
                if forgotten.is_ok() {
                    forgotten = Err(DriveError::from(e));
                }
            }
        }
        info!("signed out");

        revoked.and(forgotten)
    }

    pub fn is_initialized(&self) -> bool {
        self.status.borrow().initialized
    }

    pub fn is_authenticated(&self) -> bool {
        self.status.borrow().authenticated
    }

    /// A copy of the current session.
    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    /// True if the user has signed in before and not signed out since,
    /// even if the token has since expired.
    pub fn was_logged_in(&self) -> DriveResult<bool> {
        Ok(self.store.get(KEY_LOGGED_IN)?.as_deref() == Some("true"))
    }

    fn set_authenticated(&self, authenticated: bool) {
        self.status.send_modify(|s| s.authenticated = authenticated);
    }

    fn record_init_error(&self, err: &DriveError) {
        let message = err.to_string();
        self.status.send_modify(|s| s.init_error = Some(message));
    }
}

fn into_auth_error(err: DriveError) -> DriveError {
    match err {
        DriveError::Auth(_) | DriveError::Configuration(_) => err,
        other => DriveError::Auth(other.to_string()),
    }
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
