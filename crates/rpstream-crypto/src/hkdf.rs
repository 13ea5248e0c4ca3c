//! HKDF-SHA256 key derivation.
//!
//! Hand-rolled over HMAC-SHA256 so the extract/expand steps stay explicit:
//! an empty or missing salt is 32 zero bytes, and the expand counter byte is
//! `(i + 1) % 256`.

use hmac::{Hmac, Mac};
use sha2::Sha256;

/// The SHA-256 hash output length in bytes.
const HASH_LEN: usize = 32;

/// HMAC-SHA256 of `data` keyed by `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    // HMAC accepts keys of any length.
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// HKDF-SHA256 extract step: `PRK = HMAC-SHA256(salt, ikm)`.
pub fn hkdf_extract(salt: Option<&[u8]>, ikm: &[u8]) -> [u8; 32] {
    let effective_salt: &[u8] = match salt {
        Some(s) if !s.is_empty() => s,
        _ => &[0u8; HASH_LEN],
    };
    hmac_sha256(effective_salt, ikm)
}

/// HKDF-SHA256 expand step, producing `length` bytes of keying material.
pub fn hkdf_expand(prk: &[u8; 32], info: &[u8], length: usize) -> Vec<u8> {
    let num_blocks = length.div_ceil(HASH_LEN);
    let mut derived = Vec::with_capacity(num_blocks * HASH_LEN);
    let mut block = Vec::new();

    for i in 0..num_blocks {
        // T(i+1) = HMAC(PRK, T(i) || info || counter_byte)
        let counter = ((i + 1) % 256) as u8;
        let mut input = Vec::with_capacity(block.len() + info.len() + 1);
        input.extend_from_slice(&block);
        input.extend_from_slice(info);
        input.push(counter);

        let output = hmac_sha256(prk, &input);
        block = output.to_vec();
        derived.extend_from_slice(&output);
    }

    derived.truncate(length);
    derived
}

/// All-in-one HKDF-SHA256: extract then expand.
pub fn hkdf(length: usize, ikm: &[u8], salt: Option<&[u8]>, context: Option<&[u8]>) -> Vec<u8> {
    let prk = hkdf_extract(salt, ikm);
    let info = context.unwrap_or(b"");
    hkdf_expand(&prk, info, length)
}
