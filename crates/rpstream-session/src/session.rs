//! The session orchestrator.
//!
//! A [`Session`] drives one streaming session against a console, through four
//! phases on a single worker task:
//!
//! ```text
//! session request ──► ctrl startup ──► [login PIN loop] ──► senkusha ──► stream
//!       │                  │                  │                 │           │
//!       └──────────────────┴───────── every phase honors stop ──┴───────────┘
//! ```
//!
//! The worker holds the state lock except around network I/O and while the
//! stream runs. Every failure lands in exactly one quit event; `stop()` from
//! any thread unblocks whatever the worker is doing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info};

use rpstream_core::connect::ConnectInfo;
use rpstream_core::controller::ControllerState;
use rpstream_core::error::SessionError;
use rpstream_core::quit::QuitReason;
use rpstream_core::target::Target;
use rpstream_crypto::ecdh::Ecdh;
use rpstream_crypto::random::HandshakeKey;
use rpstream_crypto::rpcrypt::RpCrypt;

use crate::event::{EventSender, SessionEvent};
use crate::request::{RequestResult, SESSION_EXPECT_TIMEOUT, request_session};
use crate::state::{CtrlNotifier, SessionState, SharedState};
use crate::traits::{
    ControlChannel, CtrlContext, FeedbackHandle, PathMetrics, Senkusha, StreamConnection,
    StreamContext,
};

/// How long the worker idles after a successful session request. PS4
/// consoles don't always react right away.
const CONSOLE_SETTLE: Duration = Duration::from_millis(10);

/// A streaming session. Construct, start, feed PINs and controller state
/// from other tasks, and await the terminal quit event.
pub struct Session<C, K, S>
where
    C: ControlChannel,
    K: Senkusha,
    S: StreamConnection,
{
    shared: Arc<SharedState>,
    connect: Arc<ConnectInfo>,
    addrs: Arc<Vec<SocketAddr>>,
    ctrl: Arc<C>,
    feedback: FeedbackHandle,
    events: EventSender,
    runtime: Option<Runtime<K, S>>,
    task: Option<JoinHandle<()>>,
}

/// The collaborators the worker consumes when it starts.
struct Runtime<K, S> {
    senkusha: K,
    stream_connection: S,
}

impl<C, K, S> Session<C, K, S>
where
    C: ControlChannel,
    K: Senkusha,
    S: StreamConnection,
{
    /// Create a session: resolve the host (this is the only I/O construction
    /// does) and assemble the shared state. No events are emitted from here.
    pub async fn new(
        connect: ConnectInfo,
        ctrl: C,
        senkusha: K,
        stream_connection: S,
        events: EventSender,
    ) -> Result<Self, SessionError> {
        let addrs: Vec<SocketAddr> =
            tokio::net::lookup_host((connect.host.as_str(), connect.port))
                .await
                .map_err(|_| SessionError::AddrResolution)?
                .collect();
        if addrs.is_empty() {
            return Err(SessionError::AddrResolution);
        }

        let shared = Arc::new(SharedState::new(Target::initial(connect.ps5)));
        Ok(Self {
            shared,
            connect: Arc::new(connect),
            addrs: Arc::new(addrs),
            ctrl: Arc::new(ctrl),
            feedback: FeedbackHandle::new(),
            events,
            runtime: Some(Runtime {
                senkusha,
                stream_connection,
            }),
            task: None,
        })
    }

    /// Spawn the worker task. Callable at most once.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.task.is_some() {
            return Err(SessionError::AlreadyStarted);
        }
        let runtime = self.runtime.take().ok_or(SessionError::AlreadyStarted)?;

        let worker = Worker {
            shared: Arc::clone(&self.shared),
            connect: Arc::clone(&self.connect),
            addrs: Arc::clone(&self.addrs),
            ctrl: Arc::clone(&self.ctrl),
            feedback: self.feedback.clone(),
            events: self.events.clone(),
            senkusha: runtime.senkusha,
            stream_connection: runtime.stream_connection,
        };
        self.task = Some(tokio::spawn(worker.run()));
        Ok(())
    }

    /// Request the session to stop. Idempotent; unblocks the worker wherever
    /// it is (the shared stop token also cancels Senkusha and the stream
    /// connection).
    pub fn stop(&self) {
        {
            let mut state = self.shared.lock();
            state.should_stop = true;
        }
        self.shared.stop.stop();
        self.shared.signal();
    }

    /// Wait for the worker to exit. The quit event has been delivered by the
    /// time this returns.
    pub async fn join(&mut self) -> Result<(), SessionError> {
        let task = self.task.take().ok_or(SessionError::NotStarted)?;
        let _ = task.await;
        Ok(())
    }

    /// Provide the login PIN the console asked for. Replaces any
    /// not-yet-forwarded entry.
    pub fn set_login_pin(&self, pin: &[u8]) {
        {
            let mut state = self.shared.lock();
            state.login_pin = Some(pin.to_vec());
        }
        self.shared.signal();
    }

    /// Update the controller snapshot; forwarded immediately while the
    /// stream's feedback sender is active.
    pub fn set_controller_state(&self, state: ControllerState) {
        self.feedback.set_state(state);
    }

    /// Ask the console to go to rest mode.
    pub async fn goto_bed(&self) -> Result<(), SessionError> {
        self.ctrl.goto_bed().await
    }

    pub async fn keyboard_set_text(&self, text: &str) -> Result<(), SessionError> {
        self.ctrl.keyboard_set_text(text).await
    }

    pub async fn keyboard_accept(&self) -> Result<(), SessionError> {
        self.ctrl.keyboard_accept().await
    }

    pub async fn keyboard_reject(&self) -> Result<(), SessionError> {
        self.ctrl.keyboard_reject().await
    }
}

/// Which teardown the state machine exits through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    /// Quit directly; ctrl was never started.
    Quit,
    /// Stop and join ctrl before quitting.
    QuitCtrl,
}

struct Worker<C, K, S> {
    shared: Arc<SharedState>,
    connect: Arc<ConnectInfo>,
    addrs: Arc<Vec<SocketAddr>>,
    ctrl: Arc<C>,
    feedback: FeedbackHandle,
    events: EventSender,
    senkusha: K,
    stream_connection: S,
}

impl<C, K, S> Worker<C, K, S>
where
    C: ControlChannel,
    K: Senkusha,
    S: StreamConnection,
{
    async fn run(mut self) {
        let exit = self.drive().await;

        if exit == Exit::QuitCtrl {
            self.ctrl.stop();
            self.ctrl.join().await;
            info!("ctrl stopped");
        }

        let (reason, reason_str) = {
            let mut state = self.shared.lock();
            (
                state.quit_reason.take().unwrap_or(QuitReason::Stopped),
                state.quit_reason_str.take(),
            )
        };
        info!(%reason, "session has quit");
        let _ = self.events.send(SessionEvent::Quit { reason, reason_str });
    }

    /// If stop was requested, record `Stopped` (unless a reason exists) and
    /// report that the machine should bail out.
    fn check_stop(&self) -> bool {
        let mut state = self.shared.lock();
        if state.should_stop {
            if state.quit_reason.is_none() {
                state.quit_reason = Some(QuitReason::Stopped);
            }
            true
        } else {
            false
        }
    }

    fn ctrl_failed_exit(&self) -> Exit {
        error!("ctrl has failed, shutting down");
        self.shared.set_quit_reason_if_none(QuitReason::CtrlUnknown);
        Exit::QuitCtrl
    }

    fn send_event(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    async fn drive(&mut self) -> Exit {
        if self.check_stop() {
            return Exit::Quit;
        }

        let console = if self.connect.ps5 { "PS5" } else { "PS4" };
        info!(console, host = %self.connect.host, "starting session request");

        // Version renegotiation: at most two retries, the second one final.
        let mut result = request_session(&self.shared, &self.connect, &self.addrs, true).await;
        match result {
            RequestResult::VersionMismatch(server) if !server.is_unknown() => {
                info!("re-requesting session with server's RP-Version");
                self.shared.lock().target = server;
                result = request_session(&self.shared, &self.connect, &self.addrs, true).await;
            }
            RequestResult::Success => {}
            _ => return Exit::Quit,
        }
        match result {
            RequestResult::VersionMismatch(server) if !server.is_unknown() => {
                info!("re-requesting session once more with server's RP-Version");
                self.shared.lock().target = server;
                result = request_session(&self.shared, &self.connect, &self.addrs, false).await;
            }
            RequestResult::Success => {}
            _ => return Exit::Quit,
        }
        if !matches!(result, RequestResult::Success) {
            return Exit::Quit;
        }

        info!("session request successful");

        let (target, nonce, host) = {
            let state = self.shared.lock();
            (state.target, state.nonce, state.selected_addr)
        };
        let Some(nonce) = nonce else {
            // A successful request always stores the nonce.
            self.shared
                .set_quit_reason_if_none(QuitReason::SessionRequestUnknown);
            return Exit::Quit;
        };
        let rpcrypt = RpCrypt::new_auth(target, &nonce, &self.connect.morning);

        // Give the console a moment to settle; wake early on stop.
        self.shared
            .wait_for(Some(CONSOLE_SETTLE), |s| s.should_stop || s.ctrl_failed)
            .await;

        info!("starting ctrl");
        let ctx = CtrlContext {
            notifier: CtrlNotifier::new(Arc::clone(&self.shared)),
            host: host.unwrap_or(self.addrs[0]),
            target,
            rpcrypt: rpcrypt.clone(),
            did: self.connect.did,
            regist_key: self.connect.regist_key,
            enable_keyboard: self.connect.enable_keyboard,
        };
        if let Err(e) = self.ctrl.start(ctx).await {
            error!(error = %e, "ctrl failed to start");
            self.shared
                .set_quit_reason_if_none(QuitReason::CtrlConnectFailed);
            return Exit::Quit;
        }

        self.shared
            .wait_for(Some(SESSION_EXPECT_TIMEOUT), pred_ctrl_start)
            .await;
        if self.check_stop() {
            return Exit::QuitCtrl;
        }
        if self.shared.lock().ctrl_failed {
            error!("ctrl has failed while waiting for ctrl startup");
            return self.ctrl_failed_exit();
        }

        // Login PIN loop: each pass answers one request from the console.
        let mut pin_incorrect = false;
        loop {
            let requested = {
                let mut state = self.shared.lock();
                if state.ctrl_login_pin_requested {
                    state.ctrl_login_pin_requested = false;
                    true
                } else {
                    false
                }
            };
            if !requested {
                break;
            }

            if pin_incorrect {
                info!("login PIN was incorrect, requested again by ctrl");
            } else {
                info!("ctrl requested login PIN");
            }
            self.send_event(SessionEvent::LoginPinRequest { pin_incorrect });
            pin_incorrect = true;

            self.shared
                .wait_for(None, |s| {
                    s.should_stop || s.ctrl_failed || s.login_pin.is_some()
                })
                .await;
            if self.check_stop() {
                return Exit::QuitCtrl;
            }
            if self.shared.lock().ctrl_failed {
                error!("ctrl has failed while waiting for PIN entry");
                return self.ctrl_failed_exit();
            }

            let pin = self.shared.lock().login_pin.take();
            if let Some(pin) = pin {
                info!("received entered login PIN, forwarding to ctrl");
                self.ctrl.set_login_pin(&pin).await;
            }

            // Wait for the session id (or another PIN request).
            self.shared
                .wait_for(Some(SESSION_EXPECT_TIMEOUT), pred_ctrl_start)
                .await;
            if self.check_stop() {
                return Exit::QuitCtrl;
            }
        }

        if !self.shared.lock().ctrl_session_id_received {
            error!("ctrl did not receive session id");
            return self.ctrl_failed_exit();
        }

        info!("starting senkusha");
        let metrics = match self.senkusha.run(self.shared.stop.clone()).await {
            Ok(metrics) => {
                info!(
                    mtu_in = metrics.mtu_in,
                    mtu_out = metrics.mtu_out,
                    rtt_us = metrics.rtt.as_micros() as u64,
                    "senkusha completed successfully"
                );
                metrics
            }
            Err(e) if e.is_canceled() => {
                self.shared.set_quit_reason_if_none(QuitReason::Stopped);
                return Exit::QuitCtrl;
            }
            Err(e) => {
                error!(error = %e, "senkusha failed, connecting with fallback values");
                PathMetrics::fallback()
            }
        };

        let handshake_key = HandshakeKey::generate();
        let ecdh = Ecdh::new();

        let ctx = StreamContext {
            target,
            rpcrypt,
            ecdh,
            handshake_key,
            metrics,
            video_profile: self.connect.video_profile,
            video_profile_auto_downgrade: self.connect.video_profile_auto_downgrade,
            stop: self.shared.stop.clone(),
            feedback: self.feedback.clone(),
        };
        let result = self.stream_connection.run(ctx).await;

        {
            let mut state = self.shared.lock();
            match result {
                Err(SessionError::RemoteDisconnected(reason)) => {
                    error!(reason = %reason, "remote disconnected from stream connection");
                    if state.quit_reason.is_none() {
                        state.quit_reason = Some(QuitReason::StreamConnectionRemoteDisconnected);
                        state.quit_reason_str = Some(reason);
                    }
                }
                Err(e) if !e.is_canceled() => {
                    error!(error = %e, "stream connection run failed");
                    if state.quit_reason.is_none() {
                        state.quit_reason = Some(QuitReason::StreamConnectionUnknown);
                    }
                }
                _ => {
                    info!("stream connection completed successfully");
                    state.quit_reason = Some(QuitReason::Stopped);
                }
            }
        }

        Exit::QuitCtrl
    }
}

fn pred_ctrl_start(state: &SessionState) -> bool {
    state.should_stop
        || state.ctrl_failed
        || state.ctrl_session_id_received
        || state.ctrl_login_pin_requested
}
