//! Streaming encryption for the working file.
//!
//! Content is processed in chunks of at most [`CHUNK_SIZE`] bytes using
//! XChaCha20-Poly1305 under the STREAM construction (BE32 counter). The
//! per-frame nonce is `header || counter || last_flag`, so every frame is
//! bound to its position and the final frame is distinguishable from all
//! others without any length or count prefix.
//!
//! # Format
//! `[header: HEADER_BYTES][frame]+` where every frame but the last is
//! exactly [`FRAME_SIZE`] bytes.

use std::io::{self, Read, Write};

use chacha20poly1305::aead::generic_array::GenericArray;
use chacha20poly1305::aead::stream::{NewStream, StreamBE32, StreamPrimitive};
use chacha20poly1305::{KeyInit, XChaCha20Poly1305};

use crate::keys::{StreamHeader, HEADER_BYTES, KEY_BYTES};
use ciphersafe_common::{Error, Result};

/// Maximum plaintext bytes per chunk.
pub const CHUNK_SIZE: usize = 4096;

/// Poly1305 tag bytes added to every frame.
pub const ABYTES: usize = 16;

/// Largest on-disk frame.
pub const FRAME_SIZE: usize = CHUNK_SIZE + ABYTES;

/// Position marker carried by every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// More frames follow.
    Message,
    /// Last frame of the stream.
    Final,
}

impl Tag {
    /// Check if this tag ends the stream.
    pub fn is_final(self) -> bool {
        self == Tag::Final
    }
}

/// Counters collected while streaming a whole input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Number of frames written or read.
    pub chunks: u64,
    /// Bytes consumed from the reader.
    pub bytes_in: u64,
    /// Bytes produced to the writer.
    pub bytes_out: u64,
}

impl StreamStats {
    fn record(&mut self, consumed: usize, produced: usize) {
        self.chunks += 1;
        self.bytes_in += consumed as u64;
        self.bytes_out += produced as u64;
    }
}

fn stream_primitive(key: &[u8], header: &[u8]) -> Result<StreamBE32<XChaCha20Poly1305>> {
    if key.len() != KEY_BYTES {
        return Err(Error::AuthInit(format!(
            "Invalid key length: expected {}, got {}",
            KEY_BYTES,
            key.len()
        )));
    }
    if header.len() != HEADER_BYTES {
        return Err(Error::AuthInit(format!(
            "Invalid header length: expected {}, got {}",
            HEADER_BYTES,
            header.len()
        )));
    }

    let aead = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::AuthInit(format!("Key rejected: {}", e)))?;
    Ok(StreamBE32::from_aead(aead, GenericArray::from_slice(header)))
}

/// Push (encrypt) direction of the stream.
///
/// One instance encrypts exactly one stream; it is consumed or dropped
/// when the operation ends.
pub struct EncryptingStream {
    primitive: StreamBE32<XChaCha20Poly1305>,
    header: StreamHeader,
    position: u32,
    finished: bool,
}

impl EncryptingStream {
    /// Bind fresh push state to a key/header pair.
    ///
    /// # Errors
    /// - `AuthInit` if either length is wrong
    pub fn new(key: &[u8], header: &[u8]) -> Result<Self> {
        let primitive = stream_primitive(key, header)?;
        Ok(Self {
            primitive,
            header: StreamHeader::from_slice(header)?,
            position: 0,
            finished: false,
        })
    }

    /// Header this stream was bound to.
    pub fn header(&self) -> &StreamHeader {
        &self.header
    }

    /// Encrypt one chunk.
    ///
    /// Returns `plaintext.len() + ABYTES` bytes. Chunks must be pushed in
    /// the order they will be pulled; `Tag::Final` ends the stream.
    ///
    /// # Errors
    /// - Chunk larger than CHUNK_SIZE
    /// - Stream already finalized or counter exhausted
    pub fn push_chunk(&mut self, plaintext: &[u8], tag: Tag) -> Result<Vec<u8>> {
        if self.finished {
            return Err(Error::Crypto("Stream already finalized".to_string()));
        }
        if plaintext.len() > CHUNK_SIZE {
            return Err(Error::InvalidInput(format!(
                "Chunk of {} bytes exceeds {}",
                plaintext.len(),
                CHUNK_SIZE
            )));
        }
        if !tag.is_final() && self.position == u32::MAX {
            return Err(Error::Crypto("Stream counter exhausted".to_string()));
        }

        let frame = self
            .primitive
            .encrypt(self.position, tag.is_final(), plaintext)
            .map_err(|e| Error::Crypto(format!("Encryption failed: {}", e)))?;

        if tag.is_final() {
            self.finished = true;
        } else {
            self.position += 1;
        }
        Ok(frame)
    }

    /// Encrypt everything from reader into writer.
    ///
    /// Writes the header, then frames. One chunk of lookahead decides which
    /// chunk is final, so an input that is an exact multiple of CHUNK_SIZE
    /// ends on a full final frame and an empty input yields one empty final
    /// frame.
    ///
    /// # Errors
    /// - I/O errors from reader/writer
    /// - Encryption errors
    pub fn encrypt_stream<R: Read, W: Write>(
        mut self,
        mut reader: R,
        mut writer: W,
    ) -> Result<StreamStats> {
        writer.write_all(self.header.as_bytes())?;
        let mut stats = StreamStats {
            bytes_out: HEADER_BYTES as u64,
            ..StreamStats::default()
        };

        let mut current = vec![0u8; CHUNK_SIZE];
        let mut next = vec![0u8; CHUNK_SIZE];
        let mut len = read_full(&mut reader, &mut current)?;

        loop {
            // A short read already hit end of input
            let ahead = if len == CHUNK_SIZE {
                read_full(&mut reader, &mut next)?
            } else {
                0
            };
            let tag = if ahead == 0 { Tag::Final } else { Tag::Message };

            let frame = self.push_chunk(&current[..len], tag)?;
            writer.write_all(&frame)?;
            stats.record(len, frame.len());

            if tag.is_final() {
                break;
            }
            std::mem::swap(&mut current, &mut next);
            len = ahead;
        }

        writer.flush()?;
        Ok(stats)
    }
}

/// Pull (decrypt) direction of the stream.
pub struct DecryptingStream {
    primitive: StreamBE32<XChaCha20Poly1305>,
    position: u32,
    chunks: u64,
    finished: bool,
}

impl DecryptingStream {
    /// Bind fresh pull state to a key/header pair.
    ///
    /// # Errors
    /// - `AuthInit` if either length is wrong
    pub fn new(key: &[u8], header: &[u8]) -> Result<Self> {
        Ok(Self {
            primitive: stream_primitive(key, header)?,
            position: 0,
            chunks: 0,
            finished: false,
        })
    }

    /// Whether the final frame has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Authenticate and decrypt one frame.
    ///
    /// The frame is verified as a middle frame first and as the final frame
    /// second; the tag reports which one matched.
    ///
    /// # Errors
    /// - `CorruptedChunk` if neither verification succeeds
    /// - Frame larger than FRAME_SIZE, or stream already finalized
    pub fn pull_chunk(&mut self, frame: &[u8]) -> Result<(Vec<u8>, Tag)> {
        if self.finished {
            return Err(Error::Crypto("Stream already finalized".to_string()));
        }
        if frame.len() > FRAME_SIZE {
            return Err(Error::InvalidInput(format!(
                "Frame of {} bytes exceeds {}",
                frame.len(),
                FRAME_SIZE
            )));
        }

        let index = self.chunks;
        let (plaintext, tag) = match self.primitive.decrypt(self.position, false, frame) {
            Ok(plaintext) => (plaintext, Tag::Message),
            Err(_) => match self.primitive.decrypt(self.position, true, frame) {
                Ok(plaintext) => (plaintext, Tag::Final),
                Err(_) => return Err(Error::CorruptedChunk { index }),
            },
        };

        if tag.is_final() {
            self.finished = true;
        } else if self.position == u32::MAX {
            return Err(Error::Crypto("Stream counter exhausted".to_string()));
        } else {
            self.position += 1;
        }
        self.chunks += 1;
        Ok((plaintext, tag))
    }

    /// Confirm the stream ended properly.
    ///
    /// # Errors
    /// - `TruncatedStream` if no final frame was pulled
    pub fn finish(&self) -> Result<()> {
        if self.finished {
            Ok(())
        } else {
            Err(Error::TruncatedStream {
                chunks: self.chunks,
            })
        }
    }

    /// Decrypt a whole stream from reader into writer.
    ///
    /// The header is read from the front of the input.
    ///
    /// # Errors
    /// - I/O errors
    /// - `TruncatedStream` if the input ends before the final frame,
    ///   including inputs shorter than the header
    /// - `CorruptedChunk` on authentication failure or data after the
    ///   final frame
    pub fn decrypt_stream<R: Read, W: Write>(
        key: &[u8],
        mut reader: R,
        mut writer: W,
    ) -> Result<StreamStats> {
        let mut header = [0u8; HEADER_BYTES];
        if read_full(&mut reader, &mut header)? < HEADER_BYTES {
            return Err(Error::TruncatedStream { chunks: 0 });
        }

        let mut stream = Self::new(key, &header)?;
        let mut stats = StreamStats::default();
        let mut frame = vec![0u8; FRAME_SIZE];

        loop {
            let len = read_full(&mut reader, &mut frame)?;
            if len == 0 {
                break;
            }

            let (plaintext, tag) = stream.pull_chunk(&frame[..len])?;
            writer.write_all(&plaintext)?;
            stats.record(len, plaintext.len());

            if tag.is_final() {
                let mut probe = [0u8; 1];
                if read_full(&mut reader, &mut probe)? != 0 {
                    return Err(Error::CorruptedChunk {
                        index: stream.chunks,
                    });
                }
                break;
            }
        }

        stream.finish()?;
        stats.bytes_in += HEADER_BYTES as u64;
        writer.flush()?;
        Ok(stats)
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encrypt a complete byte slice using streaming encryption.
///
/// This is a convenience function for when the complete data is available.
pub fn encrypt_bytes(key: &[u8], header: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let stream = EncryptingStream::new(key, header)?;
    let mut output = Vec::new();
    stream.encrypt_stream(data, &mut output)?;
    Ok(output)
}

/// Decrypt a complete byte slice that was encrypted with streaming encryption.
pub fn decrypt_bytes(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    DecryptingStream::decrypt_stream(key, data, &mut output)?;
    Ok(output)
}
