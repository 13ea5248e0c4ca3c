//! Console target registry.
//!
//! A [`Target`] identifies a specific console variant together with the
//! RP-Version string it speaks on the wire. The registry here is the single
//! authoritative mapping between targets and version strings; the session
//! orchestrator renegotiates between targets when the console reports a
//! different version than the one we offered.

use core::fmt;

/// A console variant and its wire protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum Target {
    /// PS4 firmware family 8.x (RP-Version "8.0").
    Ps4Firmware8,
    /// PS4 firmware family 9.x (RP-Version "9.0").
    Ps4Firmware9,
    /// PS4 firmware family 10.x (RP-Version "10.0").
    Ps4Firmware10,
    /// A PS4 speaking a version we do not recognize.
    Ps4Unknown,
    /// PS5 (RP-Version "1.0").
    Ps5Firmware1,
    /// A PS5 speaking a version we do not recognize.
    Ps5Unknown,
}

impl Target {
    /// The canonical RP-Version string for this target, if it has one.
    ///
    /// Unknown variants carry no version and cannot be offered on the wire.
    pub fn version_string(self) -> Option<&'static str> {
        match self {
            Self::Ps4Firmware8 => Some("8.0"),
            Self::Ps4Firmware9 => Some("9.0"),
            Self::Ps4Firmware10 => Some("10.0"),
            Self::Ps5Firmware1 => Some("1.0"),
            Self::Ps4Unknown | Self::Ps5Unknown => None,
        }
    }

    /// Parse a server-reported RP-Version string into a target.
    ///
    /// Returns the matching known variant, or the unknown sentinel for the
    /// console generation given by `is_ps5`.
    pub fn parse_version(version: &str, is_ps5: bool) -> Self {
        if is_ps5 {
            return match version {
                "1.0" => Self::Ps5Firmware1,
                _ => Self::Ps5Unknown,
            };
        }
        match version {
            "8.0" => Self::Ps4Firmware8,
            "9.0" => Self::Ps4Firmware9,
            "10.0" => Self::Ps4Firmware10,
            _ => Self::Ps4Unknown,
        }
    }

    /// The default target offered first for a console generation.
    pub fn initial(ps5: bool) -> Self {
        if ps5 { Self::Ps5Firmware1 } else { Self::Ps4Firmware10 }
    }

    /// The unknown sentinel for a console generation.
    pub fn unknown(ps5: bool) -> Self {
        if ps5 { Self::Ps5Unknown } else { Self::Ps4Unknown }
    }

    /// Whether this target is a PS5 variant.
    pub fn is_ps5(self) -> bool {
        matches!(self, Self::Ps5Firmware1 | Self::Ps5Unknown)
    }

    /// Whether this target is an unknown sentinel.
    pub fn is_unknown(self) -> bool {
        matches!(self, Self::Ps4Unknown | Self::Ps5Unknown)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let generation = if self.is_ps5() { "PS5" } else { "PS4" };
        match self.version_string() {
            Some(version) => write!(f, "{generation} (RP-Version {version})"),
            None => write!(f, "{generation} (unknown RP-Version)"),
        }
    }
}
