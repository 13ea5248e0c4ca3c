//! Events delivered from the session to the host application.

use tokio::sync::mpsc;

use rpstream_core::quit::QuitReason;

/// An event emitted by the session worker.
///
/// Exactly one [`Quit`](SessionEvent::Quit) is delivered per session, and it
/// is always the last event. A [`LoginPinRequest`](SessionEvent::LoginPinRequest)
/// with `pin_incorrect = true` only ever follows an earlier request with
/// `pin_incorrect = false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The console demands a login PIN; answer with `Session::set_login_pin`.
    LoginPinRequest { pin_incorrect: bool },
    /// The session is over.
    Quit {
        reason: QuitReason,
        reason_str: Option<String>,
    },
}

/// The sending half the session delivers events through.
pub type EventSender = mpsc::UnboundedSender<SessionEvent>;

/// The receiving half held by the host application.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Create a session event channel.
pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
