//! The session-request exchange.
//!
//! One HTTP/1.1 GET against the console's session endpoint on port 9295:
//! offer our RP-Version and registration key, get back either a nonce
//! (success) or an application reason — possibly with the console's own
//! RP-Version, which drives the renegotiation dance in the state machine.

use std::net::SocketAddr;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, error, info, warn};

use rpstream_core::connect::ConnectInfo;
use rpstream_core::error::SessionError;
use rpstream_core::quit::{ApplicationReason, QuitReason};
use rpstream_core::target::Target;
use rpstream_core::types::Nonce;

use crate::http::{HttpResponse, recv_response_header};
use crate::state::SharedState;
use crate::stop_token::StopToken;

/// Timeout governing the session-request connect and header receive.
pub(crate) const SESSION_EXPECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Outcome of one session-request attempt.
#[derive(Debug)]
pub(crate) enum RequestResult {
    /// Nonce received and stored; the session can authenticate.
    Success,
    /// The console reported a different RP-Version. When the carried target
    /// is a known variant the state machine may retry with it; an unknown
    /// sentinel means the mismatch is terminal.
    VersionMismatch(Target),
    /// Terminal failure; the quit reason has been recorded.
    Failed(SessionError),
}

/// The endpoint path for a target's protocol generation.
fn request_path(target: Target) -> &'static str {
    match target {
        Target::Ps4Firmware8 | Target::Ps4Firmware9 => "/sce/rp/session",
        t if t.is_ps5() => "/sie/ps5/rp/sess/init",
        _ => "/sie/ps4/rp/sess/init",
    }
}

/// The response fields the exchange cares about.
#[derive(Debug, Default)]
struct SessionResponse {
    reason: Option<ApplicationReason>,
    nonce: Option<String>,
    rp_version: Option<String>,
    success: bool,
}

impl SessionResponse {
    /// `RP-Nonce` and `RP-Application-Reason` are matched exactly;
    /// `RP-Version` ignores case. Success requires status 200 and a nonce.
    fn from_http(http: &HttpResponse) -> Self {
        let nonce = http.header("RP-Nonce").map(str::to_string);
        let rp_version = http.header_ignore_case("RP-Version").map(str::to_string);
        let reason = http
            .header("RP-Application-Reason")
            .map(ApplicationReason::parse_header);
        let success = http.code == 200 && nonce.is_some();
        Self {
            reason,
            nonce,
            rp_version,
            success,
        }
    }
}

/// Connect to `addr`, observing the stop token and a timeout.
async fn connect_with_stop(
    addr: SocketAddr,
    stop: &StopToken,
    timeout: Duration,
) -> Result<TcpStream, SessionError> {
    if stop.is_stopped() {
        return Err(SessionError::Canceled);
    }
    tokio::select! {
        result = tokio::time::timeout(timeout, TcpStream::connect(addr)) => match result {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                Err(SessionError::ConnectionRefused)
            }
            Ok(Err(_)) | Err(_) => Err(SessionError::Network),
        },
        _ = stop.cancelled() => Err(SessionError::Canceled),
    }
}

/// Perform one session-request attempt against the resolved address list.
///
/// With `allow_renegotiation`, a version-mismatch answer that names a
/// parseable server version is reported back for a retry; without it, any
/// mismatch is terminal.
pub(crate) async fn request_session(
    shared: &SharedState,
    connect: &ConnectInfo,
    addrs: &[SocketAddr],
    allow_renegotiation: bool,
) -> RequestResult {
    // Address selection: first address that accepts the TCP connect wins.
    let mut selected: Option<(TcpStream, String)> = None;
    for &addr in addrs {
        let hostname = addr.ip().to_string();
        shared.lock().hostname = hostname.clone();

        info!(host = %hostname, port = addr.port(), "trying to request session");
        match connect_with_stop(addr, &shared.stop, SESSION_EXPECT_TIMEOUT).await {
            Ok(stream) => {
                shared.lock().selected_addr = Some(addr);
                selected = Some((stream, hostname));
                break;
            }
            Err(SessionError::Canceled) => {
                info!("session stopped while connecting for session request");
                shared.lock().quit_reason = Some(QuitReason::Stopped);
                break;
            }
            Err(SessionError::ConnectionRefused) => {
                warn!(host = %hostname, "session request connect refused");
                shared.lock().quit_reason = Some(QuitReason::SessionRequestConnectionRefused);
            }
            Err(e) => {
                warn!(host = %hostname, error = %e, "session request connect failed");
                shared.lock().quit_reason = None;
            }
        }
    }

    let Some((mut stream, hostname)) = selected else {
        error!("session request connect failed eventually");
        shared.set_quit_reason_if_none(QuitReason::SessionRequestUnknown);
        return RequestResult::Failed(SessionError::Network);
    };

    info!(host = %hostname, port = connect.port, "connected for session request");

    let target = shared.lock().target;
    let Some(rp_version) = target.version_string() else {
        error!(?target, "no RP-Version for target");
        shared.set_quit_reason_if_none(QuitReason::SessionRequestUnknown);
        return RequestResult::Failed(SessionError::InvalidData);
    };

    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: {hostname}:{port}\r\n\
         User-Agent: remoteplay Windows\r\n\
         Connection: close\r\n\
         Content-Length: 0\r\n\
         RP-Registkey: {regist_key}\r\n\
         Rp-Version: {rp_version}\r\n\
         \r\n",
        path = request_path(target),
        port = connect.port,
        regist_key = connect.regist_key.wire_hex(),
    );

    debug!(%rp_version, "sending session request");
    if stream.write_all(request.as_bytes()).await.is_err() {
        error!("failed to send session request");
        shared.set_quit_reason_if_none(QuitReason::SessionRequestUnknown);
        return RequestResult::Failed(SessionError::Network);
    }

    let raw = match recv_response_header(&mut stream, &shared.stop, SESSION_EXPECT_TIMEOUT).await {
        Ok(raw) => raw,
        Err(SessionError::Canceled) => {
            shared.lock().quit_reason = Some(QuitReason::Stopped);
            return RequestResult::Failed(SessionError::Network);
        }
        Err(e) => {
            error!(error = %e, "failed to receive session request response");
            shared.set_quit_reason_if_none(QuitReason::SessionRequestUnknown);
            return RequestResult::Failed(SessionError::Network);
        }
    };

    let http = match HttpResponse::parse(&raw) {
        Ok(http) => http,
        Err(_) => {
            error!("failed to parse session request response");
            shared.set_quit_reason_if_none(QuitReason::SessionRequestUnknown);
            return RequestResult::Failed(SessionError::Network);
        }
    };
    let response = SessionResponse::from_http(&http);

    evaluate_response(shared, connect, response, rp_version, allow_renegotiation)
}

/// Map the parsed response into the attempt outcome, recording quit reasons.
fn evaluate_response(
    shared: &SharedState,
    connect: &ConnectInfo,
    response: SessionResponse,
    our_version: &str,
    allow_renegotiation: bool,
) -> RequestResult {
    if response.success {
        let nonce_b64 = response.nonce.unwrap_or_default();
        let decoded = BASE64.decode(nonce_b64.as_bytes());
        let nonce = decoded
            .ok()
            .and_then(|bytes| Nonce::try_from(bytes.as_slice()).ok());
        return match nonce {
            Some(nonce) => {
                shared.lock().nonce = Some(nonce);
                RequestResult::Success
            }
            None => {
                error!("nonce invalid");
                shared.lock().quit_reason = Some(QuitReason::SessionRequestUnknown);
                RequestResult::Failed(SessionError::Unknown)
            }
        };
    }

    // Renegotiation: a version-mismatch (or unclassified) reason paired with
    // a server RP-Version that differs from ours.
    let renegotiable = matches!(
        response.reason,
        Some(ApplicationReason::RpVersion | ApplicationReason::Unknown(_))
    );
    if allow_renegotiation && renegotiable {
        if let Some(server_version) = response.rp_version.as_deref() {
            if server_version != our_version {
                info!(ours = %our_version, server = %server_version, "reported RP-Version mismatch");
                let server_target = Target::parse_version(server_version, connect.ps5);
                if !server_target.is_unknown() {
                    info!(%server_target, "detected server RP-Version");
                    return RequestResult::VersionMismatch(server_target);
                }
                if server_version == "5.0" {
                    // Consoles report "5.0" when confused; 9.0 is what they
                    // actually speak.
                    info!("server reported RP-Version 5.0, retrying as 9.0");
                    return RequestResult::VersionMismatch(Target::Ps4Firmware9);
                }
                error!(server = %server_version, "server RP-Version is unknown");
                shared.lock().quit_reason = Some(QuitReason::SessionRequestRpVersionMismatch);
                return RequestResult::VersionMismatch(Target::unknown(connect.ps5));
            }
        }
    }

    let reason = response.reason.unwrap_or(ApplicationReason::Unknown(0));
    error!("reported application reason {:#x} ({reason})", reason.code());
    shared.lock().quit_reason = Some(reason.quit_reason());
    match reason {
        ApplicationReason::RpVersion => {
            RequestResult::VersionMismatch(Target::unknown(connect.ps5))
        }
        _ => RequestResult::Failed(SessionError::Unknown),
    }
}
