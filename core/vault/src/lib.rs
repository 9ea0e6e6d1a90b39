//! Working-file vault for CipherSafe.
//!
//! This module provides:
//! - Configuration of the work directory and the files inside it
//! - `FileCodec`, which encrypts and decrypts whole files in chunks
//! - `WorkingFileSession`, the startup/shutdown lifecycle around the codec
//!
//! # Architecture
//! The orchestration layer calls `WorkingFileSession::open` before the data
//! store touches the working file and `WorkingFileSession::close` after it
//! is done with it. Nothing else in the application reads key material.

pub mod codec;
pub mod config;
pub mod session;

pub use codec::{CodecStats, FileCodec};
pub use config::{CodecConfig, HeaderPolicy};
pub use session::{OpenOutcome, SessionPhase, WorkingFileSession};
