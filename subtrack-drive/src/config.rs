//! Drive sync configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable holding the OAuth client id.
pub const ENV_CLIENT_ID: &str = "SUBTRACK_GOOGLE_CLIENT_ID";
/// Environment variable holding the OAuth client secret (installed apps).
pub const ENV_CLIENT_SECRET: &str = "SUBTRACK_GOOGLE_CLIENT_SECRET";
/// Environment variable holding the Drive API key.
pub const ENV_API_KEY: &str = "SUBTRACK_GOOGLE_API_KEY";

/// Configuration for the drive sync engine.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// OAuth client id. Required before the engine can initialize.
    pub client_id: Option<String>,

    /// OAuth client secret, sent on code exchange when present.
    pub client_secret: Option<String>,

    /// Drive API key. Required before the engine can initialize.
    pub api_key: Option<String>,

    /// Base URL for the Drive REST API (e.g., "https://www.googleapis.com").
    pub api_base_url: String,

    /// OAuth consent page.
    pub auth_url: String,

    /// OAuth token endpoint (authorization-code exchange).
    pub token_url: String,

    /// OAuth token revocation endpoint.
    pub revoke_url: String,

    /// Redirect URI registered for the installed-app flow.
    pub redirect_uri: String,

    /// OAuth scope granting access to the private application folder only.
    pub scope: String,

    /// Logical name of the single remote data file.
    pub file_name: String,

    /// Remote must be newer than the last sync by more than this to be pulled.
    pub skew_tolerance_ms: i64,

    /// How long `initialize` waits for the auth/storage capability.
    pub ready_timeout_secs: u64,

    /// Upper bound on each remote call made by the orchestrator.
    pub request_timeout_secs: u64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            api_key: None,
            api_base_url: "https://www.googleapis.com".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            revoke_url: "https://oauth2.googleapis.com/revoke".to_string(),
            redirect_uri: "http://127.0.0.1:8765/oauth2/callback".to_string(),
            scope: "https://www.googleapis.com/auth/drive.appdata".to_string(),
            file_name: "subscription_tracker_data.json".to_string(),
            skew_tolerance_ms: 10_000, // clock drift + network latency
            ready_timeout_secs: 30,
            request_timeout_secs: 30,
        }
    }
}

impl DriveConfig {
    /// Default config with credentials taken from the environment.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Overlays credentials from the environment; unset or blank variables
    /// leave the current value alone.
    pub fn with_env_overrides(mut self) -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        if let Some(id) = read(ENV_CLIENT_ID) {
            self.client_id = Some(id);
        }
        if let Some(secret) = read(ENV_CLIENT_SECRET) {
            self.client_secret = Some(secret);
        }
        if let Some(key) = read(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        self
    }

    /// Names of the required credentials that are missing or blank.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
        let mut missing = Vec::new();
        if blank(&self.client_id) {
            missing.push("client_id");
        }
        if blank(&self.api_key) {
            missing.push("api_key");
        }
        missing
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
