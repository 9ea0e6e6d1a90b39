//! Cryptographic primitives for CipherSafe.
//!
//! This module provides:
//! - Access to the operating system's secure random source
//! - Key and stream-header types with their on-disk stores
//! - Chunked authenticated streaming with XChaCha20-Poly1305 (STREAM, BE32)
//!
//! # Security Guarantees
//! - Key material is zeroized on drop and never logged
//! - Every frame is authenticated, including its position and whether it
//!   ends the stream

pub mod keys;
pub mod rng;
pub mod store;
pub mod stream;

pub use keys::{StreamHeader, StreamKey, HEADER_BYTES, KEY_BYTES};
pub use rng::init;
pub use store::{ensure_header, ensure_key, load_header, load_key, store_header};
pub use stream::{
    DecryptingStream, EncryptingStream, StreamStats, Tag, ABYTES, CHUNK_SIZE, FRAME_SIZE,
};
