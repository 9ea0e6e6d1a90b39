//! Secure random source.
//!
//! All key and header material comes from the operating system CSPRNG.
//! Failures are returned to the caller instead of aborting the process.

use rand::rngs::OsRng;
use rand::RngCore;

use ciphersafe_common::{Error, Result};

/// Verify that the secure random source is usable.
///
/// Call once at process start. The embedding application decides whether a
/// failure is fatal.
pub fn init() -> Result<()> {
    let mut probe = [0u8; 16];
    fill(&mut probe)
}

/// Fill `buf` with cryptographically secure random bytes.
pub fn fill(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::RandomUnavailable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_succeeds() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_fill_produces_distinct_output() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        fill(&mut a).unwrap();
        fill(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
