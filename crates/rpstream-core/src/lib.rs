//! Core types, registries, and connect parameters for the rpstream
//! Remote Play client.
//!
//! This crate defines the console target registry, the quit-reason and
//! application-reason taxonomies, byte-array newtypes for the session
//! credentials, video profile presets, and the immutable connect parameters
//! consumed by the session orchestrator.

pub mod connect;
pub mod controller;
pub mod error;
pub mod quit;
pub mod target;
pub mod types;
pub mod video;

pub use connect::{ConnectInfo, SESSION_REQUEST_PORT};
pub use controller::ControllerState;
pub use error::SessionError;
pub use quit::{ApplicationReason, QuitReason};
pub use target::Target;
pub use types::{DeviceId, InvalidLength, MorningKey, Nonce, RegistKey};
pub use video::{VideoFpsPreset, VideoProfile, VideoResolutionPreset};
