//! End-to-end session scenarios against a loopback console.
//!
//! A local TCP listener plays the console's session-request endpoint with
//! canned responses; the ctrl / senkusha / stream collaborators are scripted
//! mocks. Each scenario asserts the terminal quit reason and that exactly
//! one quit event arrives, last.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;

use rpstream_core::connect::ConnectInfo;
use rpstream_core::error::SessionError;
use rpstream_core::quit::QuitReason;
use rpstream_core::types::{DeviceId, MorningKey, RegistKey};
use rpstream_core::video::{VideoFpsPreset, VideoProfile, VideoResolutionPreset};
use rpstream_session::event::{EventReceiver, SessionEvent, event_channel};
use rpstream_session::session::Session;
use rpstream_session::stop_token::StopToken;
use rpstream_session::traits::{
    ControlChannel, CtrlContext, PathMetrics, Senkusha, StreamConnection, StreamContext,
};
use rpstream_session::CtrlNotifier;

const NONCE_B64: &str = "AAECAwQFBgcICQoLDA0ODw==";

// ---------------------------------------------------------------------------
// Loopback console
// ---------------------------------------------------------------------------

struct Console {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<String>>>,
}

/// Serve one canned response per accepted connection, recording requests.
async fn spawn_console(responses: Vec<String>) -> Console {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let recorded = Arc::clone(&requests);
    tokio::spawn(async move {
        for response in responses {
            let Ok((mut sock, _)) = listener.accept().await else {
                return;
            };
            let mut buf = vec![0u8; 2048];
            let n = sock.read(&mut buf).await.unwrap_or(0);
            recorded
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(&buf[..n]).into_owned());
            let _ = sock.write_all(response.as_bytes()).await;
            // Close-delimited: dropping the socket ends the response.
        }
    });

    Console { addr, requests }
}

fn success_response(rp_version: &str) -> String {
    format!("HTTP/1.1 200 OK\r\nRP-Nonce: {NONCE_B64}\r\nRP-Version: {rp_version}\r\n\r\n")
}

fn reason_response(reason_hex: &str, rp_version: Option<&str>) -> String {
    let mut response = format!("HTTP/1.1 403 Forbidden\r\nRP-Application-Reason: {reason_hex}\r\n");
    if let Some(version) = rp_version {
        response.push_str(&format!("RP-Version: {version}\r\n"));
    }
    response.push_str("\r\n");
    response
}

// ---------------------------------------------------------------------------
// Mock collaborators
// ---------------------------------------------------------------------------

#[derive(Clone, Copy)]
enum CtrlBehavior {
    /// Deliver the session id as soon as ctrl starts.
    SessionId,
    /// Demand a login PIN; the first `wrong_attempts` entries are rejected.
    PinFlow { wrong_attempts: usize },
}

struct MockCtrl {
    behavior: CtrlBehavior,
    notifier: Mutex<Option<CtrlNotifier>>,
    pins: Arc<Mutex<Vec<Vec<u8>>>>,
    stopped: Arc<AtomicBool>,
    joined: Arc<AtomicBool>,
}

impl MockCtrl {
    fn new(behavior: CtrlBehavior) -> Self {
        Self {
            behavior,
            notifier: Mutex::new(None),
            pins: Arc::new(Mutex::new(Vec::new())),
            stopped: Arc::new(AtomicBool::new(false)),
            joined: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl ControlChannel for MockCtrl {
    async fn start(&self, ctx: CtrlContext) -> Result<(), SessionError> {
        match self.behavior {
            CtrlBehavior::SessionId => ctx.notifier.session_id_received(),
            CtrlBehavior::PinFlow { .. } => ctx.notifier.login_pin_requested(),
        }
        *self.notifier.lock().unwrap() = Some(ctx.notifier);
        Ok(())
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn join(&self) {
        self.joined.store(true, Ordering::SeqCst);
    }

    async fn set_login_pin(&self, pin: &[u8]) {
        let entered = {
            let mut pins = self.pins.lock().unwrap();
            pins.push(pin.to_vec());
            pins.len()
        };
        let notifier = self.notifier.lock().unwrap().clone().unwrap();
        let CtrlBehavior::PinFlow { wrong_attempts } = self.behavior else {
            return;
        };
        if entered <= wrong_attempts {
            notifier.login_pin_requested();
        } else {
            notifier.session_id_received();
        }
    }

    async fn goto_bed(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn keyboard_set_text(&self, _text: &str) -> Result<(), SessionError> {
        Ok(())
    }

    async fn keyboard_accept(&self) -> Result<(), SessionError> {
        Ok(())
    }

    async fn keyboard_reject(&self) -> Result<(), SessionError> {
        Ok(())
    }
}

enum SenkushaBehavior {
    Metrics(PathMetrics),
    Fail,
    BlockUntilStop,
}

struct MockSenkusha {
    behavior: SenkushaBehavior,
    started: Option<watch::Sender<bool>>,
}

impl MockSenkusha {
    fn metrics(metrics: PathMetrics) -> Self {
        Self {
            behavior: SenkushaBehavior::Metrics(metrics),
            started: None,
        }
    }

    fn failing() -> Self {
        Self {
            behavior: SenkushaBehavior::Fail,
            started: None,
        }
    }

    fn blocking(started: watch::Sender<bool>) -> Self {
        Self {
            behavior: SenkushaBehavior::BlockUntilStop,
            started: Some(started),
        }
    }
}

impl Senkusha for MockSenkusha {
    async fn run(&mut self, stop: StopToken) -> Result<PathMetrics, SessionError> {
        if let Some(started) = &self.started {
            started.send_replace(true);
        }
        match &self.behavior {
            SenkushaBehavior::Metrics(metrics) => Ok(*metrics),
            SenkushaBehavior::Fail => Err(SessionError::Network),
            SenkushaBehavior::BlockUntilStop => {
                stop.cancelled().await;
                Err(SessionError::Canceled)
            }
        }
    }
}

enum StreamBehavior {
    Complete,
    Disconnect(String),
    Fail,
}

struct MockStream {
    behavior: StreamBehavior,
    ran: Arc<AtomicBool>,
    metrics_seen: Arc<Mutex<Option<PathMetrics>>>,
}

impl MockStream {
    fn new(behavior: StreamBehavior) -> Self {
        Self {
            behavior,
            ran: Arc::new(AtomicBool::new(false)),
            metrics_seen: Arc::new(Mutex::new(None)),
        }
    }
}

impl StreamConnection for MockStream {
    async fn run(&mut self, ctx: StreamContext) -> Result<(), SessionError> {
        self.ran.store(true, Ordering::SeqCst);
        *self.metrics_seen.lock().unwrap() = Some(ctx.metrics);
        match &self.behavior {
            StreamBehavior::Complete => Ok(()),
            StreamBehavior::Disconnect(reason) => {
                Err(SessionError::RemoteDisconnected(reason.clone()))
            }
            StreamBehavior::Fail => Err(SessionError::Network),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn connect_info(console: &Console, ps5: bool) -> ConnectInfo {
    ConnectInfo::new(
        "127.0.0.1",
        ps5,
        RegistKey::from_short(b"testkey1").unwrap(),
        MorningKey::new([0x4d; 16]),
        DeviceId::from_random([0x5a; 16]),
        VideoProfile::preset(VideoResolutionPreset::P720, VideoFpsPreset::Fps60),
    )
    .with_port(console.addr.port())
}

async fn next_event(rx: &mut EventReceiver) -> SessionEvent {
    tokio::time::timeout(Duration::from_secs(10), rx.recv())
        .await
        .expect("timed out waiting for session event")
        .expect("event channel closed before quit")
}

fn assert_no_more_events(rx: &mut EventReceiver) {
    assert!(
        rx.try_recv().is_err(),
        "no event may follow the quit event"
    );
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn happy_ps5_session() {
    let console = spawn_console(vec![success_response("1.0")]).await;
    let (tx, mut rx) = event_channel();

    let metrics = PathMetrics {
        mtu_in: 1400,
        mtu_out: 1400,
        rtt: Duration::from_micros(800),
    };
    let stream = MockStream::new(StreamBehavior::Complete);
    let stream_ran = Arc::clone(&stream.ran);
    let metrics_seen = Arc::clone(&stream.metrics_seen);

    let mut session = Session::new(
        connect_info(&console, true),
        MockCtrl::new(CtrlBehavior::SessionId),
        MockSenkusha::metrics(metrics),
        stream,
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();
    let event = next_event(&mut rx).await;
    assert_eq!(event, SessionEvent::Quit {
        reason: QuitReason::Stopped,
        reason_str: None
    });
    session.join().await.unwrap();
    assert_no_more_events(&mut rx);

    assert!(stream_ran.load(Ordering::SeqCst));
    assert_eq!(*metrics_seen.lock().unwrap(), Some(metrics));

    let requests = console.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("GET /sie/ps5/rp/sess/init HTTP/1.1\r\n"));
    assert!(requests[0].contains("User-Agent: remoteplay Windows\r\n"));
    assert!(requests[0].contains("RP-Registkey: 746573746b657931\r\n"));
    assert!(requests[0].contains("Rp-Version: 1.0\r\n"));
}

#[tokio::test]
async fn ps4_renegotiates_to_server_version() {
    let console = spawn_console(vec![
        reason_response("0x80108b09", Some("9.0")),
        success_response("9.0"),
    ])
    .await;
    let (tx, mut rx) = event_channel();

    let mut session = Session::new(
        connect_info(&console, false),
        MockCtrl::new(CtrlBehavior::SessionId),
        MockSenkusha::metrics(PathMetrics::fallback()),
        MockStream::new(StreamBehavior::Complete),
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();
    let event = next_event(&mut rx).await;
    assert_eq!(event, SessionEvent::Quit {
        reason: QuitReason::Stopped,
        reason_str: None
    });
    session.join().await.unwrap();

    let requests = console.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].starts_with("GET /sie/ps4/rp/sess/init "));
    assert!(requests[0].contains("Rp-Version: 10.0\r\n"));
    // The retry speaks the console's version, on the v9 endpoint.
    assert!(requests[1].starts_with("GET /sce/rp/session "));
    assert!(requests[1].contains("Rp-Version: 9.0\r\n"));
}

#[tokio::test]
async fn bogus_five_zero_retries_as_ps4_9() {
    let console = spawn_console(vec![
        reason_response("0x80108b09", Some("5.0")),
        success_response("9.0"),
    ])
    .await;
    let (tx, mut rx) = event_channel();

    let mut session = Session::new(
        connect_info(&console, false),
        MockCtrl::new(CtrlBehavior::SessionId),
        MockSenkusha::metrics(PathMetrics::fallback()),
        MockStream::new(StreamBehavior::Complete),
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();
    assert_eq!(next_event(&mut rx).await, SessionEvent::Quit {
        reason: QuitReason::Stopped,
        reason_str: None
    });
    session.join().await.unwrap();

    let requests = console.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests[1].contains("Rp-Version: 9.0\r\n"));
}

#[tokio::test]
async fn console_in_use_quits_without_retry() {
    let console = spawn_console(vec![reason_response("0x80108b10", None)]).await;
    let (tx, mut rx) = event_channel();

    let stream = MockStream::new(StreamBehavior::Complete);
    let stream_ran = Arc::clone(&stream.ran);

    let mut session = Session::new(
        connect_info(&console, false),
        MockCtrl::new(CtrlBehavior::SessionId),
        MockSenkusha::metrics(PathMetrics::fallback()),
        stream,
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();
    assert_eq!(next_event(&mut rx).await, SessionEvent::Quit {
        reason: QuitReason::SessionRequestRpInUse,
        reason_str: None
    });
    session.join().await.unwrap();
    assert_no_more_events(&mut rx);

    assert!(!stream_ran.load(Ordering::SeqCst));
    assert_eq!(console.requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn pin_flow_with_two_wrong_entries() {
    let console = spawn_console(vec![success_response("1.0")]).await;
    let (tx, mut rx) = event_channel();

    let ctrl = MockCtrl::new(CtrlBehavior::PinFlow { wrong_attempts: 2 });
    let pins = Arc::clone(&ctrl.pins);

    let mut session = Session::new(
        connect_info(&console, true),
        ctrl,
        MockSenkusha::metrics(PathMetrics::fallback()),
        MockStream::new(StreamBehavior::Complete),
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();

    // First request arrives with pin_incorrect = false, repeats with true.
    let mut pin_events = Vec::new();
    let quit = loop {
        match next_event(&mut rx).await {
            SessionEvent::LoginPinRequest { pin_incorrect } => {
                pin_events.push(pin_incorrect);
                session.set_login_pin(b"1234");
            }
            quit @ SessionEvent::Quit { .. } => break quit,
        }
    };

    assert_eq!(pin_events, vec![false, true, true]);
    assert_eq!(quit, SessionEvent::Quit {
        reason: QuitReason::Stopped,
        reason_str: None
    });
    session.join().await.unwrap();
    assert_no_more_events(&mut rx);

    assert_eq!(pins.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn stop_during_pin_wait_quits_stopped() {
    let console = spawn_console(vec![success_response("1.0")]).await;
    let (tx, mut rx) = event_channel();

    let mut session = Session::new(
        connect_info(&console, true),
        MockCtrl::new(CtrlBehavior::PinFlow { wrong_attempts: 99 }),
        MockSenkusha::metrics(PathMetrics::fallback()),
        MockStream::new(StreamBehavior::Complete),
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();
    assert_eq!(next_event(&mut rx).await, SessionEvent::LoginPinRequest {
        pin_incorrect: false
    });

    session.stop();
    assert_eq!(next_event(&mut rx).await, SessionEvent::Quit {
        reason: QuitReason::Stopped,
        reason_str: None
    });
    session.join().await.unwrap();
    assert_no_more_events(&mut rx);
}

#[tokio::test]
async fn stop_during_senkusha_cancels_before_stream() {
    let console = spawn_console(vec![success_response("1.0")]).await;
    let (tx, mut rx) = event_channel();

    let (started_tx, mut started_rx) = watch::channel(false);
    let ctrl = MockCtrl::new(CtrlBehavior::SessionId);
    let ctrl_stopped = Arc::clone(&ctrl.stopped);
    let ctrl_joined = Arc::clone(&ctrl.joined);
    let stream = MockStream::new(StreamBehavior::Complete);
    let stream_ran = Arc::clone(&stream.ran);

    let mut session = Session::new(
        connect_info(&console, true),
        ctrl,
        MockSenkusha::blocking(started_tx),
        stream,
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();
    tokio::time::timeout(Duration::from_secs(10), started_rx.wait_for(|v| *v))
        .await
        .expect("senkusha never started")
        .unwrap();

    session.stop();
    assert_eq!(next_event(&mut rx).await, SessionEvent::Quit {
        reason: QuitReason::Stopped,
        reason_str: None
    });
    session.join().await.unwrap();
    assert_no_more_events(&mut rx);

    assert!(!stream_ran.load(Ordering::SeqCst));
    assert!(ctrl_stopped.load(Ordering::SeqCst));
    assert!(ctrl_joined.load(Ordering::SeqCst));
}

#[tokio::test]
async fn senkusha_failure_falls_back_to_defaults() {
    let console = spawn_console(vec![success_response("1.0")]).await;
    let (tx, mut rx) = event_channel();

    let stream = MockStream::new(StreamBehavior::Complete);
    let metrics_seen = Arc::clone(&stream.metrics_seen);

    let mut session = Session::new(
        connect_info(&console, true),
        MockCtrl::new(CtrlBehavior::SessionId),
        MockSenkusha::failing(),
        stream,
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();
    assert_eq!(next_event(&mut rx).await, SessionEvent::Quit {
        reason: QuitReason::Stopped,
        reason_str: None
    });
    session.join().await.unwrap();

    assert_eq!(*metrics_seen.lock().unwrap(), Some(PathMetrics::fallback()));
}

#[tokio::test]
async fn remote_disconnect_carries_reason_string() {
    let console = spawn_console(vec![success_response("1.0")]).await;
    let (tx, mut rx) = event_channel();

    let mut session = Session::new(
        connect_info(&console, true),
        MockCtrl::new(CtrlBehavior::SessionId),
        MockSenkusha::metrics(PathMetrics::fallback()),
        MockStream::new(StreamBehavior::Disconnect("Server shutting down".into())),
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();
    assert_eq!(next_event(&mut rx).await, SessionEvent::Quit {
        reason: QuitReason::StreamConnectionRemoteDisconnected,
        reason_str: Some("Server shutting down".into())
    });
    session.join().await.unwrap();
}

#[tokio::test]
async fn stream_failure_maps_to_stream_unknown() {
    let console = spawn_console(vec![success_response("1.0")]).await;
    let (tx, mut rx) = event_channel();

    let mut session = Session::new(
        connect_info(&console, true),
        MockCtrl::new(CtrlBehavior::SessionId),
        MockSenkusha::metrics(PathMetrics::fallback()),
        MockStream::new(StreamBehavior::Fail),
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();
    assert_eq!(next_event(&mut rx).await, SessionEvent::Quit {
        reason: QuitReason::StreamConnectionUnknown,
        reason_str: None
    });
    session.join().await.unwrap();
}

#[tokio::test]
async fn start_twice_is_rejected() {
    let console = spawn_console(vec![success_response("1.0")]).await;
    let (tx, mut rx) = event_channel();

    let mut session = Session::new(
        connect_info(&console, true),
        MockCtrl::new(CtrlBehavior::SessionId),
        MockSenkusha::metrics(PathMetrics::fallback()),
        MockStream::new(StreamBehavior::Complete),
        tx,
    )
    .await
    .unwrap();

    session.start().unwrap();
    assert!(matches!(
        session.start(),
        Err(SessionError::AlreadyStarted)
    ));
    let _ = next_event(&mut rx).await;
    session.join().await.unwrap();
}

#[tokio::test]
async fn unresolvable_host_fails_construction() {
    let (tx, _rx) = event_channel();
    let info = ConnectInfo::new(
        "host.invalid.rpstream.test",
        true,
        RegistKey::from_short(b"k").unwrap(),
        MorningKey::new([0u8; 16]),
        DeviceId::from_random([0u8; 16]),
        VideoProfile::default(),
    );
    let result = Session::new(
        info,
        MockCtrl::new(CtrlBehavior::SessionId),
        MockSenkusha::metrics(PathMetrics::fallback()),
        MockStream::new(StreamBehavior::Complete),
        tx,
    )
    .await;
    assert!(matches!(result, Err(SessionError::AddrResolution)));
}
