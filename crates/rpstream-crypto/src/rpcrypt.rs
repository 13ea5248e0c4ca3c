//! The session-layer auth crypto context.
//!
//! Keyed by (target, nonce, morning): the pre-shared morning secret is the
//! input keying material, the server nonce is the salt, and the target's
//! wire version string is the derivation context, so key material never
//! collides across protocol versions. The derived 32 bytes split into the
//! "bright" half (payload cipher key for the control channel) and the
//! "ambassador" half (request authentication).

use rpstream_core::target::Target;
use rpstream_core::types::{MorningKey, Nonce};

use crate::hkdf::hkdf;

/// Size of each derived key half.
pub const KEY_SIZE: usize = 16;

/// A derived session auth context.
#[derive(Clone)]
pub struct RpCrypt {
    target: Target,
    bright: [u8; KEY_SIZE],
    ambassador: [u8; KEY_SIZE],
}

impl RpCrypt {
    /// Derive the auth context for a session.
    pub fn new_auth(target: Target, nonce: &Nonce, morning: &MorningKey) -> Self {
        let info = target.version_string().unwrap_or("").as_bytes();
        let okm = hkdf(KEY_SIZE * 2, morning.as_ref(), Some(nonce.as_ref()), Some(info));

        let mut bright = [0u8; KEY_SIZE];
        let mut ambassador = [0u8; KEY_SIZE];
        bright.copy_from_slice(&okm[..KEY_SIZE]);
        ambassador.copy_from_slice(&okm[KEY_SIZE..]);

        Self {
            target,
            bright,
            ambassador,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// The payload cipher key half.
    pub fn bright(&self) -> &[u8; KEY_SIZE] {
        &self.bright
    }

    /// The request authentication key half.
    pub fn ambassador(&self) -> &[u8; KEY_SIZE] {
        &self.ambassador
    }
}

impl std::fmt::Debug for RpCrypt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpCrypt")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}
