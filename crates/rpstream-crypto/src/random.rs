//! Secure-random session material.

use rand::RngCore;
use rand::rngs::OsRng;

use rpstream_core::types::DeviceId;

/// Fill and return `N` bytes from the OS CSPRNG.
pub fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

/// Synthesize a fresh device id: fixed prefix, 16 random bytes, zero suffix.
pub fn generate_device_id() -> DeviceId {
    DeviceId::from_random(random_bytes::<16>())
}

/// The 16-byte secret generated per session for the stream handshake.
#[derive(Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct HandshakeKey([u8; 16]);

impl HandshakeKey {
    pub const SIZE: usize = 16;

    /// Generate a fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        Self(random_bytes::<16>())
    }

    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for HandshakeKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for HandshakeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HandshakeKey(..)")
    }
}
