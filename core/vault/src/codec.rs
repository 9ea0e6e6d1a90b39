//! Whole-file encryption and decryption.
//!
//! `FileCodec` owns the key and the current header and drives the chunked
//! stream over a source and destination file. The source is deleted only
//! after the destination has been written, flushed, synced and closed; on
//! any failure the source stays and the partial destination is left for the
//! caller to inspect.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use ciphersafe_common::{Error, Result};
use ciphersafe_crypto::{store_header, DecryptingStream, EncryptingStream, StreamHeader, StreamKey, StreamStats};

use crate::config::HeaderPolicy;

/// Counters for one file operation.
pub type CodecStats = StreamStats;

/// Chunked file codec.
///
/// Operations take `&mut self`, so one codec runs at most one encryption
/// or decryption at a time.
pub struct FileCodec {
    key: StreamKey,
    header: StreamHeader,
    policy: HeaderPolicy,
    header_path: Option<PathBuf>,
}

impl FileCodec {
    /// Create a codec that reuses `header` for every encryption.
    pub fn new(key: StreamKey, header: StreamHeader) -> Self {
        Self {
            key,
            header,
            policy: HeaderPolicy::Reuse,
            header_path: None,
        }
    }

    /// Draw a fresh header for every encryption and persist it to
    /// `header_path` once the ciphertext is complete.
    pub fn with_header_rotation(mut self, header_path: impl Into<PathBuf>) -> Self {
        self.policy = HeaderPolicy::Rotate;
        self.header_path = Some(header_path.into());
        self
    }

    /// Header used by the most recent encryption, or the loaded one.
    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// Active header policy.
    pub fn policy(&self) -> HeaderPolicy {
        self.policy
    }

    /// Encrypt `src` into `dst`, then delete `src`.
    ///
    /// # Errors
    /// - I/O errors opening, writing or deleting files; a source that cannot
    ///   be opened leaves no destination behind
    /// - Encryption errors
    /// - Secure random failure when rotating the header
    pub fn encrypt_file(&mut self, src: &Path, dst: &Path) -> Result<CodecStats> {
        info!(src = %src.display(), dst = %dst.display(), "Encrypting file");

        let header = match self.policy {
            HeaderPolicy::Rotate => StreamHeader::generate()?,
            HeaderPolicy::Reuse => self.header,
        };
        let stream = EncryptingStream::new(self.key.as_bytes(), header.as_bytes())?;

        let stats = transform(src, dst, |reader, writer| stream.encrypt_stream(reader, writer))
            .map_err(|e| {
                error!(src = %src.display(), error = %e, "Encryption failed");
                e
            })?;

        if let (HeaderPolicy::Rotate, Some(path)) = (self.policy, &self.header_path) {
            store_header(path, &header)?;
        }
        self.header = header;

        remove_source(src)?;
        info!(chunks = stats.chunks, bytes = stats.bytes_in, "Encryption complete");
        Ok(stats)
    }

    /// Decrypt `src` into `dst`, then delete `src`.
    ///
    /// The header is taken from the front of `src`.
    ///
    /// # Errors
    /// - I/O errors opening, writing or deleting files
    /// - `CorruptedChunk` on any authentication failure
    /// - `TruncatedStream` if `src` ends before its final frame
    pub fn decrypt_file(&mut self, src: &Path, dst: &Path) -> Result<CodecStats> {
        info!(src = %src.display(), dst = %dst.display(), "Decrypting file");

        let key = self.key.as_bytes();
        let stats = transform(src, dst, |reader, writer| {
            DecryptingStream::decrypt_stream(key, reader, writer)
        })
        .map_err(|e| {
            error!(src = %src.display(), error = %e, "Decryption failed");
            e
        })?;

        remove_source(src)?;
        info!(chunks = stats.chunks, bytes = stats.bytes_out, "Decryption complete");
        Ok(stats)
    }
}

/// Open `src`, create `dst`, run `op`, then flush, sync and close `dst`.
fn transform<F>(src: &Path, dst: &Path, op: F) -> Result<CodecStats>
where
    F: FnOnce(BufReader<File>, &mut BufWriter<File>) -> Result<CodecStats>,
{
    let source = File::open(src)?;
    if same_file(&source, src, dst)? {
        return Err(Error::InvalidInput(format!(
            "Source and destination are the same file: {}",
            dst.display()
        )));
    }
    let reader = BufReader::new(source);
    let mut writer = BufWriter::new(File::create(dst)?);

    let stats = op(reader, &mut writer)?;

    let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;
    debug!(dst = %dst.display(), bytes = stats.bytes_out, "Destination synced");
    Ok(stats)
}

/// Whether `dst` names the already opened `source`, through the same path,
/// a symlink or a hard link.
fn same_file(source: &File, src: &Path, dst: &Path) -> Result<bool> {
    if src == dst {
        return Ok(true);
    }
    let target = match fs::metadata(dst) {
        Ok(target) => target,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        let meta = source.metadata()?;
        Ok(meta.dev() == target.dev() && meta.ino() == target.ino())
    }
    #[cfg(not(unix))]
    {
        let _ = (source, target);
        Ok(fs::canonicalize(src)? == fs::canonicalize(dst)?)
    }
}

fn remove_source(src: &Path) -> Result<()> {
    fs::remove_file(src).map_err(|e| {
        error!(src = %src.display(), error = %e, "Failed to delete source");
        Error::Io(e)
    })?;
    debug!(src = %src.display(), "Source deleted");
    Ok(())
}
