//! Terminal session outcomes and server application-reason codes.
//!
//! Every way a session can end maps into the closed [`QuitReason`] set, which
//! is the only failure surface the host application sees. The console's own
//! error codes arrive hex-encoded in the `RP-Application-Reason` header and
//! are parsed into [`ApplicationReason`] before being folded into a quit
//! reason.

use core::fmt;

/// The terminal outcome of a session, delivered exactly once in the quit
/// event. "Not yet determined" is represented as `Option<QuitReason>` in
/// session state, never as a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum QuitReason {
    /// The session was stopped by the caller or completed normally.
    Stopped,
    SessionRequestUnknown,
    SessionRequestConnectionRefused,
    SessionRequestRpInUse,
    SessionRequestRpCrash,
    SessionRequestRpVersionMismatch,
    CtrlUnknown,
    CtrlConnectionRefused,
    CtrlConnectFailed,
    StreamConnectionUnknown,
    StreamConnectionRemoteDisconnected,
}

impl fmt::Display for QuitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stopped => "Stopped",
            Self::SessionRequestUnknown => "Unknown Session Request Error",
            Self::SessionRequestConnectionRefused => "Connection Refused in Session Request",
            Self::SessionRequestRpInUse => "Remote Play on Console is already in use",
            Self::SessionRequestRpCrash => "Remote Play on Console has crashed",
            Self::SessionRequestRpVersionMismatch => "RP-Version mismatch",
            Self::CtrlUnknown => "Unknown Ctrl Error",
            Self::CtrlConnectionRefused => "Connection Refused in Ctrl",
            Self::CtrlConnectFailed => "Ctrl failed to connect",
            Self::StreamConnectionUnknown => "Unknown Error in Stream Connection",
            Self::StreamConnectionRemoteDisconnected => {
                "Remote has disconnected from Stream Connection"
            }
        };
        f.write_str(s)
    }
}

/// A reason code reported by the console in the `RP-Application-Reason`
/// response header, hex-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum ApplicationReason {
    InvalidPsnId,
    RpVersion,
    InUse,
    RegistFailed,
    Crash,
    /// Any code we do not recognize, carrying the raw value.
    Unknown(u32),
}

impl ApplicationReason {
    pub const INVALID_PSN_ID: u32 = 0x8010_8b02;
    pub const RP_VERSION: u32 = 0x8010_8b09;
    pub const IN_USE: u32 = 0x8010_8b10;
    pub const REGIST_FAILED: u32 = 0x8010_8b11;
    pub const CRASH: u32 = 0x8010_8b15;

    /// Classify a raw reason code.
    pub fn from_code(code: u32) -> Self {
        match code {
            Self::INVALID_PSN_ID => Self::InvalidPsnId,
            Self::RP_VERSION => Self::RpVersion,
            Self::IN_USE => Self::InUse,
            Self::REGIST_FAILED => Self::RegistFailed,
            Self::CRASH => Self::Crash,
            other => Self::Unknown(other),
        }
    }

    /// Parse the hex header value (optionally `0x`-prefixed) into a reason.
    ///
    /// A malformed value is an unknown reason with code 0.
    pub fn parse_header(value: &str) -> Self {
        let digits = value
            .trim()
            .trim_start_matches("0x")
            .trim_start_matches("0X");
        match u32::from_str_radix(digits, 16) {
            Ok(code) => Self::from_code(code),
            Err(_) => Self::Unknown(0),
        }
    }

    /// The raw code value.
    pub fn code(self) -> u32 {
        match self {
            Self::InvalidPsnId => Self::INVALID_PSN_ID,
            Self::RpVersion => Self::RP_VERSION,
            Self::InUse => Self::IN_USE,
            Self::RegistFailed => Self::REGIST_FAILED,
            Self::Crash => Self::CRASH,
            Self::Unknown(code) => code,
        }
    }

    /// The quit reason a terminal session-request failure with this code
    /// maps to.
    pub fn quit_reason(self) -> QuitReason {
        match self {
            Self::InUse => QuitReason::SessionRequestRpInUse,
            Self::Crash => QuitReason::SessionRequestRpCrash,
            Self::RpVersion => QuitReason::SessionRequestRpVersionMismatch,
            Self::InvalidPsnId | Self::RegistFailed | Self::Unknown(_) => {
                QuitReason::SessionRequestUnknown
            }
        }
    }
}

impl fmt::Display for ApplicationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::RegistFailed => "Regist failed, probably invalid PIN",
            Self::InvalidPsnId => "Invalid PSN ID",
            Self::InUse => "Remote is already in use",
            Self::Crash => "Remote Play on Console crashed",
            Self::RpVersion => "RP-Version mismatch",
            Self::Unknown(_) => "unknown",
        };
        f.write_str(s)
    }
}
