//! Finds the single remote data file by name.

use crate::drive_client::DriveTransport;
use crate::error::{DriveError, DriveResult};
use crate::types::{FileQuery, RemoteObjectRef};
use std::sync::Arc;
use tracing::debug;

/// Resolves the remote data file. Never caches: the file may be deleted or
/// recreated by another client on the same account between calls.
pub struct RemoteLocator {
    transport: Arc<dyn DriveTransport>,
    file_name: String,
}

impl RemoteLocator {
    pub fn new(transport: Arc<dyn DriveTransport>, file_name: impl Into<String>) -> Self {
        Self {
            transport,
            file_name: file_name.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the data file, or `None` if it does not exist yet.
    pub async fn find_object(&self) -> DriveResult<Option<RemoteObjectRef>> {
        let query = FileQuery::by_name(&self.file_name);
        let files = self.transport.list(&query).await.map_err(|e| match e {
            DriveError::Http(err) => DriveError::Remote(format!("file lookup failed: {err}")),
            other => other,
        })?;

        let found = files.into_iter().next().map(RemoteObjectRef::from);
        match found {
            Some(ref object) => debug!("data file {} found: {}", self.file_name, object.id),
            None => debug!("data file {} not found", self.file_name),
        }
        Ok(found)
    }
}
