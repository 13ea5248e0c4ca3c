//! Shared cancellation token for all blocking session I/O.
//!
//! Every operation that can block — the session-request connect and receive,
//! the Senkusha probe, the stream connection — observes one [`StopToken`].
//! [`StopToken::stop`] makes all of them return `Canceled` promptly, which is
//! what turns `Session::stop` into a synchronous unblock.

use std::sync::Arc;

use tokio::sync::watch;

/// A cancelable wakeup shared across the session's blocking operations.
///
/// Cloning is cheap; all clones observe the same stop signal. Stopping is
/// idempotent and never un-stops.
#[derive(Clone)]
pub struct StopToken {
    tx: Arc<watch::Sender<bool>>,
}

impl StopToken {
    /// Create a new token in the "running" state.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Signal stop. Idempotent: repeated calls are harmless.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    /// Whether stop has been signaled.
    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Get a receiver for use in `tokio::select!` loops.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Resolve once stop has been signaled. Pends forever otherwise, which
    /// makes it directly usable as a `select!` cancellation branch.
    pub async fn cancelled(&self) {
        let mut rx = self.subscribe();
        // The sender lives in self, so wait_for can only fail after self is
        // dropped, at which point nobody is awaiting this.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StopToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopToken")
            .field("stopped", &self.is_stopped())
            .finish()
    }
}
