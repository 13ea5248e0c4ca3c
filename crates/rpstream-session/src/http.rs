//! Minimal HTTP/1.1 plumbing for the session-request exchange.
//!
//! The console answers a single GET with a close-delimited response; only the
//! status line and headers matter. The receive loop is stop- and
//! timeout-aware so `Session::stop` unblocks it immediately.

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use rpstream_core::error::SessionError;

use crate::stop_token::StopToken;

/// Upper bound on the response header section.
const MAX_HEADER_SIZE: usize = 4096;

/// A parsed response: status code and raw header pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub code: u16,
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    /// Parse the header section (status line through the blank line).
    pub fn parse(raw: &str) -> Result<Self, SessionError> {
        let mut lines = raw.split("\r\n");

        let status_line = lines.next().ok_or(SessionError::InvalidData)?;
        let mut parts = status_line.split_whitespace();
        let version = parts.next().ok_or(SessionError::InvalidData)?;
        if !version.starts_with("HTTP/") {
            return Err(SessionError::InvalidData);
        }
        let code: u16 = parts
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or(SessionError::InvalidData)?;

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                break;
            }
            let (key, value) = line.split_once(':').ok_or(SessionError::InvalidData)?;
            headers.push((key.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self { code, headers })
    }

    /// Look up a header by exact name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Look up a header ignoring name case.
    pub fn header_ignore_case(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Receive the response header section from `stream`.
///
/// Reads until the `\r\n\r\n` terminator and returns everything up to it.
/// Returns `Canceled` when the stop token fires, `Network` on timeout, EOF,
/// or I/O failure, `InvalidData` on oversized or non-UTF-8 headers.
pub async fn recv_response_header(
    stream: &mut TcpStream,
    stop: &StopToken,
    timeout: Duration,
) -> Result<String, SessionError> {
    if stop.is_stopped() {
        return Err(SessionError::Canceled);
    }

    let deadline = tokio::time::Instant::now() + timeout;
    let mut collected: Vec<u8> = Vec::with_capacity(512);
    let mut buf = [0u8; 512];

    loop {
        let n = tokio::select! {
            result = stream.read(&mut buf) => match result {
                Ok(0) => return Err(SessionError::Network),
                Ok(n) => n,
                Err(_) => return Err(SessionError::Network),
            },
            _ = stop.cancelled() => return Err(SessionError::Canceled),
            _ = tokio::time::sleep_until(deadline) => return Err(SessionError::Network),
        };

        collected.extend_from_slice(&buf[..n]);
        if let Some(end) = find_header_end(&collected) {
            collected.truncate(end);
            return String::from_utf8(collected).map_err(|_| SessionError::InvalidData);
        }
        if collected.len() > MAX_HEADER_SIZE {
            return Err(SessionError::InvalidData);
        }
    }
}

/// Offset of the first byte past the headers (before `\r\n\r\n`), if present.
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}
