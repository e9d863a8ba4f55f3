//! Shared types for drive sync operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Drive space holding files visible only to this application.
pub const APP_DATA_FOLDER: &str = "appDataFolder";

/// MIME type of the remote data file and of both multipart parts.
pub const JSON_MIME_TYPE: &str = "application/json";

/// The access session held by the session manager.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub expires_at_ms: i64,
    pub authenticated: bool,
}

impl Session {
    /// Returns true if the token expires at or before `now_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at_ms <= now_ms
    }
}

/// Access token delivered by the identity provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds from the moment of issue.
    pub expires_in: i64,
}

/// How the identity provider should prompt the user.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentPromptMode {
    /// Always show the account chooser.
    #[default]
    SelectAccount,
}

impl ConsentPromptMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsentPromptMode::SelectAccount => "select_account",
        }
    }
}

/// Parameters for an interactive token request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessRequest {
    pub prompt: ConsentPromptMode,
}

/// A query against the private application storage area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileQuery {
    pub space: String,
    pub name: String,
    pub exclude_trashed: bool,
    pub page_size: u32,
}

impl FileQuery {
    /// Exact-name lookup of a single non-trashed file in the app folder.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            space: APP_DATA_FOLDER.to_string(),
            name: name.into(),
            exclude_trashed: true,
            page_size: 1,
        }
    }

    /// Renders the Drive `q` expression, escaping the name literal.
    pub fn to_q(&self) -> String {
        let escaped = self.name.replace('\\', "\\\\").replace('\'', "\\'");
        if self.exclude_trashed {
            format!("name = '{escaped}' and trashed = false")
        } else {
            format!("name = '{escaped}'")
        }
    }
}

/// One row of a file listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

/// Handle to the single remote data file, valid only for the call that
/// resolved it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteObjectRef {
    pub id: String,
    pub modified_at: Option<DateTime<Utc>>,
}

impl From<RemoteFile> for RemoteObjectRef {
    fn from(file: RemoteFile) -> Self {
        Self {
            id: file.id,
            modified_at: file.modified_time,
        }
    }
}

/// Observable engine status.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub initialized: bool,
    pub authenticated: bool,
    pub syncing: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub init_error: Option<String>,
}
