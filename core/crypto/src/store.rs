//! On-disk key and header stores.
//!
//! Both files hold raw bytes with no framing or checksum. A file is created
//! once and never overwritten by the `ensure_*` functions; only
//! [`store_header`] replaces the header, for per-encryption rotation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::keys::{StreamHeader, StreamKey, HEADER_BYTES, KEY_BYTES};
use ciphersafe_common::{Error, Result};

/// Create the key file with fresh random material if it does not exist.
///
/// Returns `true` when a new key was written.
///
/// # Errors
/// - Secure random source failure
/// - I/O failure creating or writing the file
pub fn ensure_key(path: &Path) -> Result<bool> {
    if path.exists() {
        debug!(path = %path.display(), "Key file present");
        return Ok(false);
    }
    let key = StreamKey::generate()?;
    let created = create_exclusive(path, key.as_bytes())?;
    if created {
        info!(path = %path.display(), "Generated new stream key");
    }
    Ok(created)
}

/// Load the key file.
///
/// # Errors
/// - I/O failure opening or reading the file
/// - Integrity error if the file is not exactly KEY_BYTES long
pub fn load_key(path: &Path) -> Result<StreamKey> {
    let bytes = read_bounded(path, KEY_BYTES)?;
    StreamKey::from_slice(&bytes)
}

/// Create the header file with fresh random material if it does not exist.
///
/// Returns `true` when a new header was written.
pub fn ensure_header(path: &Path) -> Result<bool> {
    if path.exists() {
        debug!(path = %path.display(), "Header file present");
        return Ok(false);
    }
    let header = StreamHeader::generate()?;
    let created = create_exclusive(path, header.as_bytes())?;
    if created {
        info!(path = %path.display(), "Generated new stream header");
    }
    Ok(created)
}

/// Load the header file.
///
/// # Errors
/// - I/O failure opening or reading the file
/// - Integrity error if the file is not exactly HEADER_BYTES long
pub fn load_header(path: &Path) -> Result<StreamHeader> {
    let bytes = read_bounded(path, HEADER_BYTES)?;
    StreamHeader::from_slice(&bytes)
}

/// Replace the header file with `header`.
///
/// The bytes go to a uniquely named temp file in the same directory, which
/// is synced and persisted over the target, so readers see either the old
/// or the new header and no other file in the directory is touched.
pub fn store_header(path: &Path, header: &StreamHeader) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(header.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    debug!(path = %path.display(), "Stored stream header");
    Ok(())
}

/// Write `bytes` to a file that must not exist yet.
///
/// Returns `false` if another writer created the file first. A partially
/// written file is removed so the next load does not see truncated material.
fn create_exclusive(path: &Path, bytes: &[u8]) -> Result<bool> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            warn!(path = %path.display(), "File appeared concurrently, keeping existing");
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    };

    if let Err(e) = file.write_all(bytes).and_then(|()| file.sync_all()) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(e.into());
    }
    Ok(true)
}

/// Read at most `expected + 1` bytes so an oversized file is reported
/// without loading it whole.
fn read_bounded(path: &Path, expected: usize) -> Result<Zeroizing<Vec<u8>>> {
    let file = File::open(path)?;
    let mut bytes = Zeroizing::new(Vec::with_capacity(expected + 1));
    file.take(expected as u64 + 1).read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_key_creates_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".encryption_key.bin");

        assert!(ensure_key(&path).unwrap());
        let first = fs::read(&path).unwrap();
        assert_eq!(first.len(), KEY_BYTES);

        // Second call must leave the existing key alone
        assert!(!ensure_key(&path).unwrap());
        assert_eq!(fs::read(&path).unwrap(), first);
    }

    #[test]
    fn test_load_key_matches_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key");
        fs::write(&path, [9u8; KEY_BYTES]).unwrap();

        let key = load_key(&path).unwrap();
        assert_eq!(key.as_bytes(), &[9u8; KEY_BYTES]);
    }

    #[test]
    fn test_load_key_missing_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_key(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_load_key_short_is_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key");
        fs::write(&path, [1u8; 10]).unwrap();

        let err = load_key(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity { what: "key", expected: KEY_BYTES, actual: 10 }
        ));
    }

    #[test]
    fn test_load_key_long_is_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key");
        fs::write(&path, vec![1u8; 4096]).unwrap();

        let err = load_key(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Integrity { expected: KEY_BYTES, actual, .. } if actual == KEY_BYTES + 1
        ));
    }

    #[test]
    fn test_header_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".encryption_header.bin");

        assert!(ensure_header(&path).unwrap());
        let loaded = load_header(&path).unwrap();
        assert!(!ensure_header(&path).unwrap());
        assert_eq!(load_header(&path).unwrap(), loaded);
    }

    #[test]
    fn test_load_header_wrong_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header");
        fs::write(&path, [0u8; HEADER_BYTES - 3]).unwrap();

        let err = load_header(&path).unwrap_err();
        assert!(matches!(err, Error::Integrity { what: "header", .. }));
    }

    #[test]
    fn test_store_header_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("header");
        ensure_header(&path).unwrap();

        let replacement = StreamHeader::from_bytes([3u8; HEADER_BYTES]);
        store_header(&path, &replacement).unwrap();

        assert_eq!(load_header(&path).unwrap(), replacement);
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_store_header_leaves_sibling_files_alone() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("vault.tmp");
        let header_path = dir.path().join("vault.hdr");
        ensure_key(&key_path).unwrap();
        ensure_header(&header_path).unwrap();
        let key = fs::read(&key_path).unwrap();

        let replacement = StreamHeader::from_bytes([4u8; HEADER_BYTES]);
        store_header(&header_path, &replacement).unwrap();

        assert_eq!(fs::read(&key_path).unwrap(), key);
        assert_eq!(load_header(&header_path).unwrap(), replacement);
    }

    #[cfg(unix)]
    #[test]
    fn test_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("key");
        ensure_key(&path).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
