//! X25519 Diffie-Hellman keypair for the stream handshake.
//!
//! Wraps the `x25519-dalek` primitives; the library applies Curve25519
//! clamping internally when the key is used.

use x25519_dalek::{PublicKey, StaticSecret};

/// An ephemeral ECDH context generated per session.
pub struct Ecdh {
    secret: StaticSecret,
    public: PublicKey,
}

impl Ecdh {
    /// Generate a fresh keypair from the OS CSPRNG.
    #[must_use]
    pub fn new() -> Self {
        let secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Create from raw private key bytes (deterministic, for tests).
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Our public key, sent to the console during the stream handshake.
    #[must_use]
    pub fn public_key(&self) -> [u8; 32] {
        *self.public.as_bytes()
    }

    /// Derive the shared secret with the console's public key.
    #[must_use]
    pub fn derive_secret(&self, their_public: &[u8; 32]) -> [u8; 32] {
        let peer = PublicKey::from(*their_public);
        *self.secret.diffie_hellman(&peer).as_bytes()
    }
}

impl Default for Ecdh {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Ecdh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ecdh").finish_non_exhaustive()
    }
}
