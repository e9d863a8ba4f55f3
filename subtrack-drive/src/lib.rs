//! Cloud-drive sync engine for Subtrack.
//!
//! Keeps the local subscription document in step with a single JSON file in
//! the user's private application folder:
//! - OAuth access session lifecycle (login, restore, revoke)
//! - Locating the remote data file by name
//! - Multipart encoding for create/update uploads
//! - Push, pull and timestamp-based reconcile with clock-skew tolerance

pub mod codec;
pub mod config;
pub mod drive_client;
pub mod error;
pub mod identity;
pub mod locator;
pub mod readiness;
pub mod session;
pub mod sync_engine;
pub mod sync_state;
pub mod types;

pub use config::DriveConfig;
pub use error::{DriveError, DriveResult};
pub use sync_engine::SyncEngine;
pub use types::*;
