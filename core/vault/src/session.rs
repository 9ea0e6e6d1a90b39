//! Working file session.
//!
//! A session owns the codec for one work directory and walks the working
//! file through its lifecycle: decrypt once at startup, let the application
//! use the plaintext, encrypt once at shutdown.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use ciphersafe_common::{Error, Result, WorkingFileState, WorkingPaths};
use ciphersafe_crypto::{ensure_header, ensure_key, load_header, load_key};

use crate::codec::{CodecStats, FileCodec};
use crate::config::{CodecConfig, HeaderPolicy};

/// Lifecycle phase of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Initialized; the working file has not been opened.
    Ready,
    /// Decryption in progress.
    Decrypting,
    /// Plaintext available to the application.
    Idle,
    /// Encryption in progress.
    Encrypting,
    /// Working file sealed or never created; no further operations.
    Closed,
}

/// What `open` found and did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The ciphertext was decrypted into the plaintext file.
    Decrypted(CodecStats),
    /// Neither file existed.
    Fresh,
    /// A plaintext file from an unsealed previous run was kept.
    Resumed,
}

/// Lifecycle owner of the working file in one work directory.
pub struct WorkingFileSession {
    paths: WorkingPaths,
    codec: FileCodec,
    phase: SessionPhase,
}

impl WorkingFileSession {
    /// Prepare the work directory and load key material.
    ///
    /// # Postconditions
    /// - Work directory exists
    /// - Key and header files exist; existing files are never overwritten
    /// - Session is in `Ready`
    ///
    /// # Errors
    /// - Invalid configuration
    /// - Secure random source unavailable
    /// - I/O errors creating the directory or key files
    /// - Integrity errors for key or header files of the wrong length
    pub fn initialize(config: CodecConfig) -> Result<Self> {
        config.validate()?;
        ciphersafe_crypto::init()?;

        fs::create_dir_all(config.work_dir())?;

        let key_path = config.key_path();
        let header_path = config.header_path();
        ensure_key(&key_path)?;
        ensure_header(&header_path)?;
        let key = load_key(&key_path)?;
        let header = load_header(&header_path)?;

        let codec = match config.header_policy {
            HeaderPolicy::Rotate => FileCodec::new(key, header).with_header_rotation(header_path),
            HeaderPolicy::Reuse => FileCodec::new(key, header),
        };

        info!(
            work_dir = %config.work_dir().display(),
            policy = ?config.header_policy,
            "Session initialized"
        );

        Ok(Self {
            paths: config.working_paths()?,
            codec,
            phase: SessionPhase::Ready,
        })
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Path the application reads and writes while the session is `Idle`.
    pub fn plaintext_path(&self) -> &Path {
        self.paths.plaintext()
    }

    /// Path of the sealed file.
    pub fn ciphertext_path(&self) -> &Path {
        self.paths.ciphertext()
    }

    /// Make the plaintext available.
    ///
    /// # Errors
    /// - `InvalidState` outside `Ready`, or when both plaintext and
    ///   ciphertext exist
    /// - Any decryption error; the session stays in `Ready`
    pub fn open(&mut self) -> Result<OpenOutcome> {
        self.expect_phase(SessionPhase::Ready, "open")?;

        let state = self.paths.state();
        let outcome = match state {
            WorkingFileState::Sealed => {
                self.phase = SessionPhase::Decrypting;
                let result = self
                    .codec
                    .decrypt_file(self.paths.ciphertext(), self.paths.plaintext());
                match result {
                    Ok(stats) => OpenOutcome::Decrypted(stats),
                    Err(e) => {
                        self.phase = SessionPhase::Ready;
                        return Err(e);
                    }
                }
            }
            WorkingFileState::Fresh => {
                info!("No working file yet, starting fresh");
                OpenOutcome::Fresh
            }
            WorkingFileState::Open => {
                warn!(
                    path = %self.paths.plaintext().display(),
                    "Plaintext left by a previous run, reusing it"
                );
                OpenOutcome::Resumed
            }
            WorkingFileState::Conflict => {
                warn!(
                    plaintext = %self.paths.plaintext().display(),
                    ciphertext = %self.paths.ciphertext().display(),
                    "Both working files present"
                );
                return Err(Error::InvalidState(format!(
                    "Working file is in state {}",
                    state
                )));
            }
        };

        self.phase = SessionPhase::Idle;
        Ok(outcome)
    }

    /// Seal the plaintext.
    ///
    /// Returns `None` when there was no plaintext to encrypt.
    ///
    /// # Errors
    /// - `InvalidState` outside `Idle`
    /// - Any encryption error; the session stays in `Idle`
    pub fn close(&mut self) -> Result<Option<CodecStats>> {
        self.expect_phase(SessionPhase::Idle, "close")?;

        if !self.paths.plaintext().exists() {
            info!("No plaintext to seal");
            self.phase = SessionPhase::Closed;
            return Ok(None);
        }

        self.phase = SessionPhase::Encrypting;
        match self
            .codec
            .encrypt_file(self.paths.plaintext(), self.paths.ciphertext())
        {
            Ok(stats) => {
                self.phase = SessionPhase::Closed;
                Ok(Some(stats))
            }
            Err(e) => {
                self.phase = SessionPhase::Idle;
                Err(e)
            }
        }
    }

    fn expect_phase(&self, expected: SessionPhase, operation: &str) -> Result<()> {
        if self.phase != expected {
            return Err(Error::InvalidState(format!(
                "Cannot {} in phase {:?}",
                operation, self.phase
            )));
        }
        Ok(())
    }
}
