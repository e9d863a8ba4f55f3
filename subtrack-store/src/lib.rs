//! Durable local key-value storage for Subtrack.
//!
//! The sync engine keeps its bookkeeping (session credentials and the last
//! successful sync time) as plain string values under a handful of fixed
//! keys. Absence of a key means "never set".
//!
//! # Stores
//!
//! - [`FileStore`] persists the map as a JSON object in a single file
//! - [`MemoryStore`] keeps everything in process (tests, ephemeral sessions)

mod error;
mod file_store;
mod memory_store;

pub use error::{StoreError, StoreResult};
pub use file_store::FileStore;
pub use memory_store::MemoryStore;

/// String-keyed, string-valued durable storage.
///
/// Implementations must be safe to share across tasks; every call is a
/// complete read or write of a single key.
///
/// Calls are blocking and are made directly from async code, so
/// implementations are expected to finish quickly (small local files or
/// memory).
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if it was never set.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> StoreResult<()>;

    /// Returns true if `key` currently holds a value.
    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}
