//! Common utilities and types shared across CipherSafe modules.
//!
//! This module provides the error taxonomy used by every crate in the
//! workspace and the working-file pair the codec moves between.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{WorkingFileState, WorkingPaths};
