//! Session crypto contexts for the rpstream Remote Play client.
//!
//! Key derivation for the session-layer auth context, the ECDH keypair used
//! by the stream handshake, and the secure-random helpers that synthesize
//! per-session material.

pub mod ecdh;
pub mod hkdf;
pub mod random;
pub mod rpcrypt;

pub use ecdh::Ecdh;
pub use random::{HandshakeKey, generate_device_id, random_bytes};
pub use rpcrypt::RpCrypt;
