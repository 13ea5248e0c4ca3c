//! Collaborator seams.
//!
//! The orchestrator composes three subsystems it does not implement: the
//! control channel ("ctrl"), the Senkusha MTU/RTT prober, and the A/V stream
//! runtime. Each is a trait with native async methods; the session treats
//! them as blocking calls that honor the shared [`StopToken`].

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use rpstream_core::controller::ControllerState;
use rpstream_core::error::SessionError;
use rpstream_core::target::Target;
use rpstream_core::types::{DeviceId, RegistKey};
use rpstream_core::video::VideoProfile;
use rpstream_crypto::ecdh::Ecdh;
use rpstream_crypto::random::HandshakeKey;
use rpstream_crypto::rpcrypt::RpCrypt;

use crate::state::CtrlNotifier;
use crate::stop_token::StopToken;

/// Network path measurements produced by Senkusha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathMetrics {
    pub mtu_in: u32,
    pub mtu_out: u32,
    pub rtt: Duration,
}

impl PathMetrics {
    /// Conservative values used when probing fails: MTU 1454 both ways,
    /// 1 ms RTT.
    pub fn fallback() -> Self {
        Self {
            mtu_in: 1454,
            mtu_out: 1454,
            rtt: Duration::from_micros(1000),
        }
    }
}

/// Everything ctrl needs to open its channel to the console.
pub struct CtrlContext {
    /// Where ctrl reports failure, session-id receipt, and PIN requests.
    pub notifier: CtrlNotifier,
    /// Address the session request succeeded against.
    pub host: std::net::SocketAddr,
    pub target: Target,
    pub rpcrypt: RpCrypt,
    pub did: DeviceId,
    pub regist_key: RegistKey,
    pub enable_keyboard: bool,
}

/// The control channel running alongside the session.
pub trait ControlChannel: Send + Sync + 'static {
    /// Start the channel's worker. Lifecycle outcomes are reported through
    /// the notifier in `ctx`, not through this return value.
    fn start(&self, ctx: CtrlContext) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Ask the channel's worker to stop.
    fn stop(&self);

    /// Wait for the channel's worker to exit.
    fn join(&self) -> impl Future<Output = ()> + Send;

    /// Forward an entered login PIN to the console.
    fn set_login_pin(&self, pin: &[u8]) -> impl Future<Output = ()> + Send;

    /// Ask the console to go to rest mode.
    fn goto_bed(&self) -> impl Future<Output = Result<(), SessionError>> + Send;

    fn keyboard_set_text(&self, text: &str)
    -> impl Future<Output = Result<(), SessionError>> + Send;

    fn keyboard_accept(&self) -> impl Future<Output = Result<(), SessionError>> + Send;

    fn keyboard_reject(&self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// The MTU/RTT probing handshake preceding the stream phase.
pub trait Senkusha: Send + 'static {
    /// Run the probe to completion. Must return `Canceled` promptly once the
    /// stop token fires.
    fn run(&mut self, stop: StopToken)
    -> impl Future<Output = Result<PathMetrics, SessionError>> + Send;
}

/// Inputs handed to the stream runtime when the session enters the
/// streaming phase.
pub struct StreamContext {
    pub target: Target,
    pub rpcrypt: RpCrypt,
    pub ecdh: Ecdh,
    pub handshake_key: HandshakeKey,
    pub metrics: PathMetrics,
    pub video_profile: VideoProfile,
    pub video_profile_auto_downgrade: bool,
    /// Fires when the caller stops the session.
    pub stop: StopToken,
    /// Where controller input arrives while streaming.
    pub feedback: FeedbackHandle,
}

/// The A/V streaming runtime. When `run` returns, the session is over.
pub trait StreamConnection: Send + 'static {
    /// Run the stream until it ends. `Ok(())` and `Canceled` are clean
    /// endings; `RemoteDisconnected` carries the server-supplied reason.
    fn run(&mut self, ctx: StreamContext) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// The controller-state slot shared between the caller and the stream's
/// feedback sender.
///
/// Input updates land here under their own lock so they never contend with
/// session orchestration. While a sender is active, every update is also
/// forwarded immediately.
#[derive(Clone)]
pub struct FeedbackHandle {
    inner: Arc<Mutex<FeedbackSlot>>,
}

struct FeedbackSlot {
    state: ControllerState,
    sender: Option<mpsc::UnboundedSender<ControllerState>>,
}

impl FeedbackHandle {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FeedbackSlot {
                state: ControllerState::idle(),
                sender: None,
            })),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, FeedbackSlot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install the feedback sender and get the current controller snapshot.
    /// Called by the stream runtime once its sender loop is up.
    pub fn activate(&self, sender: mpsc::UnboundedSender<ControllerState>) -> ControllerState {
        let mut slot = self.slot();
        slot.sender = Some(sender);
        slot.state
    }

    /// Remove the feedback sender; later updates are only stored.
    pub fn deactivate(&self) {
        self.slot().sender = None;
    }

    /// Store a controller snapshot, forwarding it when a sender is active.
    pub(crate) fn set_state(&self, state: ControllerState) {
        let mut slot = self.slot();
        slot.state = state;
        if let Some(sender) = &slot.sender {
            let _ = sender.send(state);
        }
    }

    /// The latest controller snapshot.
    pub fn state(&self) -> ControllerState {
        self.slot().state
    }
}

impl std::fmt::Debug for FeedbackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
