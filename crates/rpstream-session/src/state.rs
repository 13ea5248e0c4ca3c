//! Shared session state and the condition-wait machinery.
//!
//! The worker task and the caller's thread both touch a small set of flags
//! (stop requested, ctrl outcome signals, entered PIN, quit reason). They
//! live under one mutex, and every change that can unblock a wait bumps a
//! watch epoch so predicate waits re-check. The lock is never held across an
//! await point.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;

use rpstream_core::quit::QuitReason;
use rpstream_core::target::Target;
use rpstream_core::types::Nonce;

use crate::stop_token::StopToken;

/// The mutable session state guarded by the state mutex.
#[derive(Debug)]
pub(crate) struct SessionState {
    /// Target of the current request attempt; rewritten during version
    /// renegotiation.
    pub target: Target,
    pub should_stop: bool,
    pub ctrl_failed: bool,
    pub ctrl_session_id_received: bool,
    pub ctrl_login_pin_requested: bool,
    /// The entered login PIN. `Some` exactly while an entry is pending
    /// forwarding to ctrl.
    pub login_pin: Option<Vec<u8>>,
    /// Server nonce from a successful session request.
    pub nonce: Option<Nonce>,
    /// The address the session request actually connected to.
    pub selected_addr: Option<std::net::SocketAddr>,
    /// Numeric hostname of the current connect attempt.
    pub hostname: String,
    /// Terminal outcome; `None` until determined.
    pub quit_reason: Option<QuitReason>,
    pub quit_reason_str: Option<String>,
}

/// State shared between the session handle, the worker, and ctrl.
pub(crate) struct SharedState {
    state: Mutex<SessionState>,
    cond: watch::Sender<u64>,
    pub(crate) stop: StopToken,
}

impl SharedState {
    pub(crate) fn new(target: Target) -> Self {
        let (cond, _) = watch::channel(0);
        Self {
            state: Mutex::new(SessionState {
                target,
                should_stop: false,
                ctrl_failed: false,
                ctrl_session_id_received: false,
                ctrl_login_pin_requested: false,
                login_pin: None,
                nonce: None,
                selected_addr: None,
                hostname: String::new(),
                quit_reason: None,
                quit_reason_str: None,
            }),
            cond,
            stop: StopToken::new(),
        }
    }

    /// Lock the state, recovering from poisoning.
    pub(crate) fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wake every predicate wait so it re-checks the state.
    pub(crate) fn signal(&self) {
        self.cond.send_modify(|epoch| *epoch = epoch.wrapping_add(1));
    }

    /// Record a quit reason unless one is already set.
    pub(crate) fn set_quit_reason_if_none(&self, reason: QuitReason) {
        let mut state = self.lock();
        if state.quit_reason.is_none() {
            state.quit_reason = Some(reason);
        }
    }

    /// Wait until `pred` holds or `timeout` elapses (`None` = unbounded).
    ///
    /// Returns whether the predicate held when the wait ended. Spurious
    /// wakeups are absorbed by re-checking under the lock.
    pub(crate) async fn wait_for(
        &self,
        timeout: Option<Duration>,
        pred: impl Fn(&SessionState) -> bool,
    ) -> bool {
        let mut epoch = self.cond.subscribe();
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);

        loop {
            if pred(&self.lock()) {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, epoch.changed()).await {
                        Ok(Ok(())) => continue,
                        // Timed out, or the epoch sender vanished; one last check.
                        Ok(Err(_)) | Err(_) => return pred(&self.lock()),
                    }
                }
                None => {
                    if epoch.changed().await.is_err() {
                        return pred(&self.lock());
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedState")
            .field("state", &self.lock())
            .finish_non_exhaustive()
    }
}

/// Handle given to the control channel so it can report its lifecycle
/// signals back into the session: failure, session-id receipt, and login-PIN
/// requests. Each call wakes any pending session wait.
#[derive(Clone)]
pub struct CtrlNotifier {
    shared: std::sync::Arc<SharedState>,
}

impl CtrlNotifier {
    pub(crate) fn new(shared: std::sync::Arc<SharedState>) -> Self {
        Self { shared }
    }

    /// Report that ctrl received the session id; the session proceeds to the
    /// probe phase.
    pub fn session_id_received(&self) {
        self.shared.lock().ctrl_session_id_received = true;
        self.shared.signal();
    }

    /// Report that the console demands a login PIN.
    pub fn login_pin_requested(&self) {
        self.shared.lock().ctrl_login_pin_requested = true;
        self.shared.signal();
    }

    /// Report ctrl failure, optionally with a specific quit reason. Without
    /// one (or when a reason is already recorded) the session falls back to
    /// its generic ctrl failure reason.
    pub fn ctrl_failed(&self, reason: Option<QuitReason>) {
        {
            let mut state = self.shared.lock();
            state.ctrl_failed = true;
            if state.quit_reason.is_none() {
                state.quit_reason = reason;
            }
        }
        self.shared.signal();
    }
}

impl std::fmt::Debug for CtrlNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CtrlNotifier").finish_non_exhaustive()
    }
}
