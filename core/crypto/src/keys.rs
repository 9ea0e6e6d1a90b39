//! Key and header types with secure memory handling.
//!
//! The key is secret and zeroizes its memory on drop. The header is public
//! nonce material; it is stored next to the key and written at the front of
//! every ciphertext file.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::rng;
use ciphersafe_common::{Error, Result};

/// Length of the stream key in bytes (256-bit).
pub const KEY_BYTES: usize = 32;

/// Length of the stream header in bytes.
///
/// An XChaCha20 nonce is 24 bytes; STREAM/BE32 reserves 4 bytes for the
/// chunk counter and 1 byte for the last-block flag.
pub const HEADER_BYTES: usize = 19;

/// Secret key for the chunked stream cipher.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct StreamKey {
    key: [u8; KEY_BYTES],
}

impl StreamKey {
    /// Create a key from raw bytes.
    pub fn from_bytes(key: [u8; KEY_BYTES]) -> Self {
        Self { key }
    }

    /// Create a key from a slice of exactly KEY_BYTES.
    ///
    /// # Errors
    /// - Returns an integrity error if the length is wrong
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let key: [u8; KEY_BYTES] = bytes.try_into().map_err(|_| Error::Integrity {
            what: "key",
            expected: KEY_BYTES,
            actual: bytes.len(),
        })?;
        Ok(Self { key })
    }

    /// Generate a random key.
    ///
    /// # Errors
    /// - Returns error if the secure random source fails
    pub fn generate() -> Result<Self> {
        let mut key = [0u8; KEY_BYTES];
        rng::fill(&mut key)?;
        Ok(Self { key })
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_BYTES] {
        &self.key
    }
}

impl PartialEq for StreamKey {
    fn eq(&self, other: &Self) -> bool {
        self.key.ct_eq(&other.key).into()
    }
}

impl Eq for StreamKey {}

impl fmt::Debug for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamKey([REDACTED])")
    }
}

/// Public per-stream header (nonce prefix).
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct StreamHeader([u8; HEADER_BYTES]);

impl StreamHeader {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; HEADER_BYTES]) -> Self {
        Self(bytes)
    }

    /// Create a header from a slice of exactly HEADER_BYTES.
    ///
    /// # Errors
    /// - Returns an integrity error if the length is wrong
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let header: [u8; HEADER_BYTES] = bytes.try_into().map_err(|_| Error::Integrity {
            what: "header",
            expected: HEADER_BYTES,
            actual: bytes.len(),
        })?;
        Ok(Self(header))
    }

    /// Generate a random header.
    pub fn generate() -> Result<Self> {
        let mut header = [0u8; HEADER_BYTES];
        rng::fill(&mut header)?;
        Ok(Self(header))
    }

    /// Get the header bytes.
    pub fn as_bytes(&self) -> &[u8; HEADER_BYTES] {
        &self.0
    }
}

impl fmt::Debug for StreamHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StreamHeader(")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}
