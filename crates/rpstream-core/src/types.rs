//! Newtype wrappers for the session's fixed-size byte fields.
//!
//! These types keep the registration key, the pre-shared "morning" secret,
//! the server nonce, and the synthesized device id from being mixed up with
//! one another despite sharing byte-array representations.

use core::fmt;

/// Helper to write lowercase hex without the `hex` crate.
fn fmt_hex(bytes: &[u8], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for byte in bytes {
        write!(f, "{byte:02x}")?;
    }
    Ok(())
}

/// Error returned when a byte slice has the wrong length for a newtype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidLength {
    pub expected: usize,
    pub actual: usize,
}

impl fmt::Display for InvalidLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid length: expected {} bytes, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for InvalidLength {}

/// The up-to-16-byte registration key identifying a paired client.
///
/// Shorter keys are NUL-padded; the wire encoding truncates at the first NUL.
#[derive(Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct RegistKey([u8; 16]);

impl RegistKey {
    pub const SIZE: usize = 16;

    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Build from a shorter byte string, NUL-padding the remainder.
    pub fn from_short(bytes: &[u8]) -> Result<Self, InvalidLength> {
        if bytes.len() > Self::SIZE {
            return Err(InvalidLength {
                expected: Self::SIZE,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; Self::SIZE];
        arr[..bytes.len()].copy_from_slice(bytes);
        Ok(Self(arr))
    }

    /// The key bytes up to the first NUL (or all 16 when none).
    pub fn effective_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(Self::SIZE);
        &self.0[..len]
    }

    /// Lowercase hex of the NUL-truncated key, as sent in `RP-Registkey`.
    pub fn wire_hex(&self) -> String {
        let mut out = String::with_capacity(Self::SIZE * 2);
        for byte in self.effective_bytes() {
            use fmt::Write;
            // Writing to a String never fails.
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl AsRef<[u8]> for RegistKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for RegistKey {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| InvalidLength {
            expected: 16,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for RegistKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Credentials never land in logs in full.
        write!(f, "RegistKey(")?;
        fmt_hex(&self.0[..2], f)?;
        write!(f, "..)")
    }
}

/// The 16-byte pre-shared secret established during registration.
///
/// Never sent on the wire; keys the session-layer crypto context.
#[derive(Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct MorningKey([u8; 16]);

impl MorningKey {
    pub const SIZE: usize = 16;

    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for MorningKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for MorningKey {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| InvalidLength {
            expected: 16,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for MorningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MorningKey(")?;
        fmt_hex(&self.0[..2], f)?;
        write!(f, "..)")
    }
}

/// The 16-byte random nonce chosen by the console, delivered base64-encoded
/// in the `RP-Nonce` response header.
#[derive(Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Nonce([u8; 16]);

impl Nonce {
    pub const SIZE: usize = 16;

    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Nonce {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&[u8]> for Nonce {
    type Error = InvalidLength;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| InvalidLength {
            expected: 16,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(&self.0, f)
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce(")?;
        fmt_hex(&self.0[..4], f)?;
        write!(f, "..)")
    }
}

/// The 32-byte synthesized device id.
///
/// Layout: 10-byte fixed prefix, 16 cryptographically random bytes, 6 zero
/// bytes.
#[derive(Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct DeviceId([u8; 32]);

impl DeviceId {
    pub const SIZE: usize = 32;
    pub const PREFIX: [u8; 10] = [0x00, 0x18, 0x00, 0x00, 0x00, 0x07, 0x00, 0x40, 0x00, 0x80];
    pub const SUFFIX_LEN: usize = 6;

    /// Assemble a device id from its 16 random middle bytes.
    pub fn from_random(random: [u8; 16]) -> Self {
        let mut arr = [0u8; Self::SIZE];
        arr[..Self::PREFIX.len()].copy_from_slice(&Self::PREFIX);
        arr[Self::PREFIX.len()..Self::PREFIX.len() + random.len()].copy_from_slice(&random);
        Self(arr)
    }
}

impl AsRef<[u8]> for DeviceId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_hex(&self.0, f)
    }
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId(")?;
        fmt_hex(&self.0[..4], f)?;
        write!(f, "..)")
    }
}
