//! One-shot cancellation signal shared by a session and its driver.
//!
//! Closing is idempotent: the quit command and a driver stop may race, and
//! only the first close has any effect.

use std::sync::Arc;
use tokio::sync::watch;

/// Broadcast-once flag. Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct QuitSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl QuitSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Close the signal. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    /// Non-blocking check.
    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve once the signal has been closed.
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot be dropped here.
        let _ = rx.wait_for(|closed| *closed).await;
    }
}

impl Default for QuitSignal {
    fn default() -> Self {
        Self::new()
    }
}
