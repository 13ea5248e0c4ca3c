//! TOML-based connect configuration.
//!
//! A thin loader for hosts that keep their console credentials in a config
//! file; the programmatic [`ConnectInfo`] constructor remains the primary
//! API.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;

use rpstream_core::connect::ConnectInfo;
use rpstream_core::types::{MorningKey, RegistKey};
use rpstream_core::video::{VideoFpsPreset, VideoProfile, VideoResolutionPreset};
use rpstream_crypto::random::generate_device_id;

/// Errors from loading or validating a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Top-level client configuration.
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    pub connect: ConnectSection,
    #[serde(default)]
    pub video: VideoSection,
}

/// The `[connect]` section.
#[derive(Debug, Deserialize)]
pub struct ConnectSection {
    /// Console hostname or address.
    pub host: String,
    /// "ps4" or "ps5".
    pub console: ConsoleKind,
    /// Registration key from pairing, up to 16 characters.
    pub regist_key: String,
    /// Base64 of the 16-byte morning secret.
    pub morning: String,
    #[serde(default)]
    pub enable_keyboard: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ConsoleKind {
    #[serde(rename = "ps4")]
    Ps4,
    #[serde(rename = "ps5")]
    Ps5,
}

/// The `[video]` section.
#[derive(Debug, Deserialize)]
pub struct VideoSection {
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default)]
    pub auto_downgrade: bool,
}

fn default_resolution() -> String {
    "720p".to_string()
}

fn default_fps() -> u32 {
    60
}

impl Default for VideoSection {
    fn default() -> Self {
        Self {
            resolution: default_resolution(),
            fps: default_fps(),
            auto_downgrade: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Validate the sections and assemble connect parameters, synthesizing a
    /// fresh device id.
    pub fn into_connect_info(self) -> Result<ConnectInfo, ConfigError> {
        let regist_key = RegistKey::from_short(self.connect.regist_key.as_bytes())
            .map_err(|e| ConfigError::InvalidValue(format!("regist_key: {e}")))?;

        let morning_bytes = BASE64
            .decode(self.connect.morning.as_bytes())
            .map_err(|e| ConfigError::InvalidValue(format!("morning: {e}")))?;
        let morning = MorningKey::try_from(morning_bytes.as_slice())
            .map_err(|e| ConfigError::InvalidValue(format!("morning: {e}")))?;

        let resolution: VideoResolutionPreset = self
            .video
            .resolution
            .parse()
            .map_err(ConfigError::InvalidValue)?;
        let fps = VideoFpsPreset::from_fps(self.video.fps)
            .ok_or_else(|| ConfigError::InvalidValue(format!("fps: {}", self.video.fps)))?;

        let info = ConnectInfo::new(
            self.connect.host,
            self.connect.console == ConsoleKind::Ps5,
            regist_key,
            morning,
            generate_device_id(),
            VideoProfile::preset(resolution, fps),
        )
        .with_auto_downgrade(self.video.auto_downgrade)
        .with_keyboard(self.connect.enable_keyboard);
        Ok(info)
    }
}
