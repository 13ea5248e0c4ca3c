//! Session orchestrator for the rpstream Remote Play client.
//!
//! This crate is the control plane of the client: given a reachable console,
//! a registration key, and the paired morning secret, a [`Session`]
//! negotiates the protocol version, authenticates, mediates an optional
//! login PIN, probes the network path, and hands off to the A/V stream
//! runtime. Every outcome — success, failure, or caller stop — surfaces as a
//! single quit event.
//!
//! The control channel, the Senkusha prober, and the stream runtime are
//! composed through the traits in [`traits`].

pub mod config;
pub mod event;
pub mod http;
pub mod logging;
mod request;
pub mod session;
mod state;
pub mod stop_token;
pub mod traits;

pub use config::{ClientConfig, ConfigError};
pub use event::{EventReceiver, EventSender, SessionEvent, event_channel};
pub use session::Session;
pub use state::CtrlNotifier;
pub use stop_token::StopToken;
pub use traits::{
    ControlChannel, CtrlContext, FeedbackHandle, PathMetrics, Senkusha, StreamConnection,
    StreamContext,
};
