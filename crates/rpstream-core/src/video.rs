//! Video profile presets.
//!
//! The console accepts a handful of fixed resolution/bitrate combinations;
//! anything else is negotiated down by the stream runtime when
//! auto-downgrade is enabled.

/// The negotiated video parameters for a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoProfile {
    pub width: u32,
    pub height: u32,
    /// Target bitrate in kbps.
    pub bitrate: u32,
    pub max_fps: u32,
}

/// Supported resolution presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoResolutionPreset {
    P360,
    P540,
    P720,
    P1080,
}

/// Supported frame-rate presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoFpsPreset {
    Fps30,
    Fps60,
}

impl VideoProfile {
    /// Build a profile from a resolution and FPS preset.
    pub fn preset(resolution: VideoResolutionPreset, fps: VideoFpsPreset) -> Self {
        let (width, height, bitrate) = match resolution {
            VideoResolutionPreset::P360 => (640, 360, 2000),
            VideoResolutionPreset::P540 => (960, 540, 6000),
            VideoResolutionPreset::P720 => (1280, 720, 10000),
            VideoResolutionPreset::P1080 => (1920, 1080, 15000),
        };
        let max_fps = match fps {
            VideoFpsPreset::Fps30 => 30,
            VideoFpsPreset::Fps60 => 60,
        };
        Self {
            width,
            height,
            bitrate,
            max_fps,
        }
    }
}

impl std::str::FromStr for VideoResolutionPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "360p" => Ok(Self::P360),
            "540p" => Ok(Self::P540),
            "720p" => Ok(Self::P720),
            "1080p" => Ok(Self::P1080),
            other => Err(format!("unknown resolution preset: {other}")),
        }
    }
}

impl VideoFpsPreset {
    /// Parse a numeric FPS value into a preset.
    pub fn from_fps(fps: u32) -> Option<Self> {
        match fps {
            30 => Some(Self::Fps30),
            60 => Some(Self::Fps60),
            _ => None,
        }
    }
}
