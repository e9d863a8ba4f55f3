//! Persisted time of the last successful sync.

use crate::error::DriveResult;
use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::Arc;
use subtrack_store::KeyValueStore;
use tracing::warn;

pub const KEY_LAST_SYNC_TIME: &str = "last_sync_time";

/// `last_sync_time` bookkeeping. Reconcile decisions read this, so it is
/// the one piece of state that must survive restarts.
pub struct SyncState {
    store: Arc<dyn KeyValueStore>,
    last_sync_time: Option<DateTime<Utc>>,
}

impl SyncState {
    /// Loads the stored time. A malformed value is treated as never synced.
    pub fn load(store: Arc<dyn KeyValueStore>) -> DriveResult<Self> {
        let last_sync_time = match store.get(KEY_LAST_SYNC_TIME)? {
            Some(raw) => match DateTime::parse_from_rfc3339(raw.trim()) {
                Ok(ts) => Some(ts.with_timezone(&Utc)),
                Err(e) => {
                    warn!("ignoring malformed {KEY_LAST_SYNC_TIME} {raw:?}: {e}");
                    None
                }
            },
            None => None,
        };
        Ok(Self {
            store,
            last_sync_time,
        })
    }

    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.last_sync_time
    }

    /// Last sync as epoch milliseconds, 0 if never synced.
    pub fn last_sync_ms(&self) -> i64 {
        self.last_sync_time.map_or(0, |ts| ts.timestamp_millis())
    }

    /// Records `at` (at millisecond precision) as the last sync time.
    ///
    /// The in-memory value is updated even if persisting fails, so the
    /// running process does not re-pull a version it already has.
    pub fn record(&mut self, at: DateTime<Utc>) -> DriveResult<DateTime<Utc>> {
        let at = DateTime::from_timestamp_millis(at.timestamp_millis()).unwrap_or(at);
        self.last_sync_time = Some(at);
        self.store.set(
            KEY_LAST_SYNC_TIME,
            &at.to_rfc3339_opts(SecondsFormat::Millis, true),
        )?;
        Ok(at)
    }
}
