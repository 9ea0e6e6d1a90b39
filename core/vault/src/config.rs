//! Codec configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use ciphersafe_common::{Error, Result, WorkingPaths};

/// Environment variable that overrides the work directory.
pub const WORKDIR_ENV: &str = "CIPHERSAFE_WORKDIR";

/// Work directory name under the user's home when no override is set.
pub const DEFAULT_DIRNAME: &str = ".CipherSafe";

/// Decrypted working file name.
pub const PLAINTEXT_FILENAME: &str = "core.db";

/// Encrypted at-rest file name.
pub const CIPHERTEXT_FILENAME: &str = "core.enc";

/// Key file name.
pub const KEY_FILENAME: &str = ".encryption_key.bin";

/// Header file name.
pub const HEADER_FILENAME: &str = ".encryption_header.bin";

/// How the stream header is chosen for each encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPolicy {
    /// Draw a fresh header for every encryption and persist it afterwards.
    #[default]
    Rotate,
    /// Encrypt every version of the file under the stored header.
    Reuse,
}

/// Location and naming of everything the codec touches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecConfig {
    /// Directory holding key, header and working files.
    pub work_dir: PathBuf,
    /// Decrypted working file name.
    #[serde(default = "default_plaintext_name")]
    pub plaintext_name: String,
    /// Encrypted file name.
    #[serde(default = "default_ciphertext_name")]
    pub ciphertext_name: String,
    /// Key file name.
    #[serde(default = "default_key_name")]
    pub key_name: String,
    /// Header file name.
    #[serde(default = "default_header_name")]
    pub header_name: String,
    /// Header selection for encryption.
    #[serde(default)]
    pub header_policy: HeaderPolicy,
}

fn default_plaintext_name() -> String {
    PLAINTEXT_FILENAME.to_string()
}

fn default_ciphertext_name() -> String {
    CIPHERTEXT_FILENAME.to_string()
}

fn default_key_name() -> String {
    KEY_FILENAME.to_string()
}

fn default_header_name() -> String {
    HEADER_FILENAME.to_string()
}

impl CodecConfig {
    /// Create a configuration with default file names in `work_dir`.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            plaintext_name: default_plaintext_name(),
            ciphertext_name: default_ciphertext_name(),
            key_name: default_key_name(),
            header_name: default_header_name(),
            header_policy: HeaderPolicy::default(),
        }
    }

    /// Resolve the work directory from the environment.
    ///
    /// Uses `CIPHERSAFE_WORKDIR` when set and non-empty, otherwise
    /// `<home>/.CipherSafe`.
    ///
    /// # Errors
    /// - Returns error if neither the variable nor a home directory is available
    pub fn from_env() -> Result<Self> {
        let work_dir = match std::env::var_os(WORKDIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .map(|home| home.join(DEFAULT_DIRNAME))
                .ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "No home directory and {} is not set",
                        WORKDIR_ENV
                    ))
                })?,
        };
        Ok(Self::new(work_dir))
    }

    /// Set the header policy.
    pub fn with_header_policy(mut self, policy: HeaderPolicy) -> Self {
        self.header_policy = policy;
        self
    }

    /// Check the file names.
    ///
    /// # Errors
    /// - Empty names, names containing path separators, or names that
    ///   collide with each other
    pub fn validate(&self) -> Result<()> {
        let names = [
            ("plaintext_name", &self.plaintext_name),
            ("ciphertext_name", &self.ciphertext_name),
            ("key_name", &self.key_name),
            ("header_name", &self.header_name),
        ];
        for (field, name) in names {
            if name.is_empty() {
                return Err(Error::InvalidInput(format!("{} cannot be empty", field)));
            }
            if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
                return Err(Error::InvalidInput(format!(
                    "{} must be a plain file name, got {:?}",
                    field, name
                )));
            }
        }
        for (i, (field, name)) in names.iter().enumerate() {
            if let Some((other, _)) = names[i + 1..].iter().find(|(_, n)| n == name) {
                return Err(Error::InvalidInput(format!(
                    "{} and {} are both {:?}",
                    field, other, name
                )));
            }
        }
        Ok(())
    }

    /// Path of the key file.
    pub fn key_path(&self) -> PathBuf {
        self.work_dir.join(&self.key_name)
    }

    /// Path of the header file.
    pub fn header_path(&self) -> PathBuf {
        self.work_dir.join(&self.header_name)
    }

    /// Plaintext/ciphertext pair of the working file.
    pub fn working_paths(&self) -> Result<WorkingPaths> {
        WorkingPaths::new(
            self.work_dir.join(&self.plaintext_name),
            self.work_dir.join(&self.ciphertext_name),
        )
    }

    /// Work directory.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}
