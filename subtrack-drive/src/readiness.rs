//! Readiness of the external auth/storage capability.
//!
//! Whoever brings the capability up (loads client libraries, opens the
//! network stack) holds the [`ReadySignal`] and fires it once. The engine
//! awaits the paired [`Readiness`] with a bounded timeout during
//! initialization. Dropping the wait future cancels it.

use crate::error::{DriveError, DriveResult};
use std::time::Duration;
use tokio::sync::watch;

/// Creates a connected signal/readiness pair, initially not ready.
pub fn readiness() -> (ReadySignal, Readiness) {
    let (tx, rx) = watch::channel(false);
    (ReadySignal { tx }, Readiness { rx })
}

/// Completion side, fired by the capability loader.
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<bool>,
}

impl ReadySignal {
    pub fn mark_ready(&self) {
        self.tx.send_replace(true);
    }
}

/// Waiting side, held by the engine.
#[derive(Clone, Debug)]
pub struct Readiness {
    rx: watch::Receiver<bool>,
}

impl Readiness {
    /// A readiness that is already resolved.
    pub fn ready() -> Self {
        let (_tx, rx) = watch::channel(true);
        Self { rx }
    }

    pub fn is_ready(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits until the capability is ready or `timeout` elapses.
    pub async fn wait(&self, timeout: Duration) -> DriveResult<()> {
        let mut rx = self.rx.clone();
        match tokio::time::timeout(timeout, rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(DriveError::NotReady(
                "capability loader went away before becoming ready".to_string(),
            )),
            Err(_) => Err(DriveError::NotReady(format!(
                "auth/storage capability not available after {}s",
                timeout.as_secs()
            ))),
        }
    }
}
