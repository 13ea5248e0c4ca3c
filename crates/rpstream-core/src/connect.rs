//! Immutable connect parameters assembled before a session starts.

use crate::types::{DeviceId, MorningKey, RegistKey};
use crate::video::VideoProfile;

/// TCP port the console's session-request endpoint listens on.
pub const SESSION_REQUEST_PORT: u16 = 9295;

/// Everything the orchestrator needs to reach and authenticate with a
/// console. Built once, never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    /// Whether the console is a PS5.
    pub ps5: bool,
    /// Hostname or address of the console; resolution happens at session
    /// construction.
    pub host: String,
    /// Session-request port. The wire port is [`SESSION_REQUEST_PORT`];
    /// overridable so tests can stand up a loopback console.
    pub port: u16,
    /// Registration key from pairing, sent hex-encoded in the request.
    pub regist_key: RegistKey,
    /// Pre-shared secret keying the session crypto.
    pub morning: MorningKey,
    /// Synthesized device id.
    pub did: DeviceId,
    pub video_profile: VideoProfile,
    pub video_profile_auto_downgrade: bool,
    pub enable_keyboard: bool,
}

impl ConnectInfo {
    pub fn new(
        host: impl Into<String>,
        ps5: bool,
        regist_key: RegistKey,
        morning: MorningKey,
        did: DeviceId,
        video_profile: VideoProfile,
    ) -> Self {
        Self {
            ps5,
            host: host.into(),
            port: SESSION_REQUEST_PORT,
            regist_key,
            morning,
            did,
            video_profile,
            video_profile_auto_downgrade: false,
            enable_keyboard: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_auto_downgrade(mut self, enabled: bool) -> Self {
        self.video_profile_auto_downgrade = enabled;
        self
    }

    pub fn with_keyboard(mut self, enabled: bool) -> Self {
        self.enable_keyboard = enabled;
        self
    }
}
