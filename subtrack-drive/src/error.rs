//! Sync engine error types.

use thiserror::Error;

/// Result type for sync engine operations.
pub type DriveResult<T> = Result<T, DriveError>;

/// Errors that can occur in drive sync operations.
#[derive(Debug, Error)]
pub enum DriveError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("sync engine not ready: {0}")]
    NotReady(String),

    #[error("not authenticated")]
    NotAuthenticated,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("remote operation failed: {0}")]
    Remote(String),

    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("local storage error: {0}")]
    Storage(#[from] subtrack_store::StoreError),
}

impl DriveError {
    /// True for failures of the remote transport (query, transfer, network).
    pub fn is_remote(&self) -> bool {
        matches!(self, DriveError::Remote(_) | DriveError::Http(_))
    }
}
