//! The internal error taxonomy.
//!
//! These errors circulate between the orchestrator and its collaborators;
//! the host application only ever sees a [`crate::QuitReason`], into which
//! the layer with enough context translates them.

/// Errors produced while establishing or running a session.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("host address resolution failed")]
    AddrResolution,

    #[error("network operation failed")]
    Network,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("invalid data")]
    InvalidData,

    #[error("RP-Version mismatch")]
    VersionMismatch,

    #[error("operation canceled")]
    Canceled,

    #[error("remote disconnected: {0}")]
    RemoteDisconnected(String),

    #[error("session already started")]
    AlreadyStarted,

    #[error("session not started")]
    NotStarted,

    #[error("unknown error")]
    Unknown,
}

impl SessionError {
    /// Whether this error is a cancellation rather than a failure.
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}
