//! Common types used throughout CipherSafe.

use std::fmt;
use std::path::{Path, PathBuf};

/// The plaintext and ciphertext locations of the same logical content.
///
/// At rest only the ciphertext exists; while the application runs only the
/// plaintext exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkingPaths {
    plaintext: PathBuf,
    ciphertext: PathBuf,
}

impl WorkingPaths {
    /// Create a pair from two paths.
    ///
    /// # Errors
    /// - Returns error if both paths are the same
    pub fn new(plaintext: impl Into<PathBuf>, ciphertext: impl Into<PathBuf>) -> crate::Result<Self> {
        let plaintext = plaintext.into();
        let ciphertext = ciphertext.into();
        if plaintext == ciphertext {
            return Err(crate::Error::InvalidInput(format!(
                "plaintext and ciphertext share the path {}",
                plaintext.display()
            )));
        }
        Ok(Self { plaintext, ciphertext })
    }

    /// Path of the decrypted working file.
    pub fn plaintext(&self) -> &Path {
        &self.plaintext
    }

    /// Path of the encrypted at-rest file.
    pub fn ciphertext(&self) -> &Path {
        &self.ciphertext
    }

    /// Inspect the filesystem and classify the pair.
    pub fn state(&self) -> WorkingFileState {
        WorkingFileState::from_presence(self.plaintext.is_file(), self.ciphertext.is_file())
    }
}

/// Observed on-disk condition of a [`WorkingPaths`] pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingFileState {
    /// Only the ciphertext exists: the normal at-rest condition.
    Sealed,
    /// Only the plaintext exists: the normal running condition.
    Open,
    /// Neither exists: nothing has been stored yet.
    Fresh,
    /// Both exist: an earlier operation did not finish.
    Conflict,
}

impl WorkingFileState {
    /// Classify from the presence of each file.
    pub fn from_presence(plaintext: bool, ciphertext: bool) -> Self {
        match (plaintext, ciphertext) {
            (false, true) => Self::Sealed,
            (true, false) => Self::Open,
            (false, false) => Self::Fresh,
            (true, true) => Self::Conflict,
        }
    }
}

impl fmt::Display for WorkingFileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Sealed => "sealed",
            Self::Open => "open",
            Self::Fresh => "fresh",
            Self::Conflict => "conflict",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_path_rejected() {
        assert!(WorkingPaths::new("/tmp/core", "/tmp/core").is_err());
    }

    #[test]
    fn test_state_from_presence() {
        assert_eq!(WorkingFileState::from_presence(false, true), WorkingFileState::Sealed);
        assert_eq!(WorkingFileState::from_presence(true, false), WorkingFileState::Open);
        assert_eq!(WorkingFileState::from_presence(false, false), WorkingFileState::Fresh);
        assert_eq!(WorkingFileState::from_presence(true, true), WorkingFileState::Conflict);
    }

    #[test]
    fn test_state_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let paths = WorkingPaths::new(dir.path().join("core.db"), dir.path().join("core.enc")).unwrap();
        assert_eq!(paths.state(), WorkingFileState::Fresh);

        std::fs::write(paths.ciphertext(), b"x").unwrap();
        assert_eq!(paths.state(), WorkingFileState::Sealed);

        std::fs::write(paths.plaintext(), b"y").unwrap();
        assert_eq!(paths.state(), WorkingFileState::Conflict);

        std::fs::remove_file(paths.ciphertext()).unwrap();
        assert_eq!(paths.state(), WorkingFileState::Open);
    }
}
