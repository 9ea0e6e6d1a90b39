//! Common error types for CipherSafe.

use thiserror::Error;

/// Top-level error type for CipherSafe operations.
///
/// Every variant is terminal for the operation that raised it. Nothing in
/// the workspace retries on its own.
#[derive(Debug, Error)]
pub enum Error {
    /// Open, read, write or delete failed on a key, header or data file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key or header material is present but has the wrong length.
    #[error("Integrity error: {what} is {actual} bytes, expected {expected}")]
    Integrity {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The stream construction rejected the key/header pair.
    #[error("Stream initialization failed: {0}")]
    AuthInit(String),

    /// A ciphertext frame failed authentication.
    #[error("Corrupted chunk {index}: authentication failed")]
    CorruptedChunk { index: u64 },

    /// Input ended before a frame carrying the final tag was seen.
    #[error("Truncated stream: input ended after {chunks} chunk(s) without a final tag")]
    TruncatedStream { chunks: u64 },

    /// The operating system's secure random source is not usable.
    #[error("Secure random source unavailable: {0}")]
    RandomUnavailable(String),

    /// Cryptographic operation failed.
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation is not legal in the current lifecycle phase.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the error means ciphertext content cannot be trusted.
    ///
    /// Callers use this to tell "the file is damaged or forged" apart from
    /// environmental failures such as a missing file or a full disk.
    pub fn is_tampering(&self) -> bool {
        matches!(
            self,
            Error::CorruptedChunk { .. } | Error::TruncatedStream { .. } | Error::Integrity { .. }
        )
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_tampering());
    }

    #[test]
    fn test_tampering_classification() {
        assert!(Error::CorruptedChunk { index: 3 }.is_tampering());
        assert!(Error::TruncatedStream { chunks: 1 }.is_tampering());
        assert!(Error::Integrity { what: "key", expected: 32, actual: 7 }.is_tampering());
        assert!(!Error::AuthInit("bad".to_string()).is_tampering());
    }

    #[test]
    fn test_display_mentions_index() {
        let msg = Error::CorruptedChunk { index: 12 }.to_string();
        assert!(msg.contains("12"));
    }
}
