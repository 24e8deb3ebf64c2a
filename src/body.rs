//! Re-readable document bodies.
//!
//! Format detection and the fallback decoders all need to read the same
//! bytes more than once. [`SpooledBody`] keeps up to [`SPOOL_MEMORY_LIMIT`]
//! bytes in memory and transparently spills larger documents to an
//! anonymous temporary file, so every consumer can seek back to the start.

use std::io::{self, Read, Seek, SeekFrom, Write};

use tempfile::SpooledTempFile;

/// Bytes kept in memory before a body spills to disk (1 MiB).
pub const SPOOL_MEMORY_LIMIT: usize = 1 << 20;

/// Readable, seekable and sendable byte source accepted by the parsers.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

/// A downloaded or locally read document that can be re-read from the start.
#[derive(Debug)]
pub struct SpooledBody {
    inner: SpooledTempFile,
    len: u64,
}

impl Default for SpooledBody {
    fn default() -> Self {
        Self::new()
    }
}

impl SpooledBody {
    /// Creates an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: SpooledTempFile::new(SPOOL_MEMORY_LIMIT),
            len: 0,
        }
    }

    /// Creates a body holding a copy of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if spilling to disk fails.
    pub fn from_bytes(bytes: &[u8]) -> io::Result<Self> {
        let mut body = Self::new();
        body.append(bytes)?;
        body.rewind()?;
        Ok(body)
    }

    /// Drains `reader` into a new body.
    ///
    /// # Errors
    ///
    /// Returns an IO error if reading or spilling fails.
    pub fn from_reader(mut reader: impl Read) -> io::Result<Self> {
        let mut body = Self::new();
        let copied = io::copy(&mut reader, &mut body.inner)?;
        body.len = copied;
        body.rewind()?;
        Ok(body)
    }

    /// Appends a chunk at the end of the body.
    ///
    /// # Errors
    ///
    /// Returns an IO error if spilling to disk fails.
    pub fn append(&mut self, chunk: &[u8]) -> io::Result<()> {
        self.inner.seek(SeekFrom::End(0))?;
        self.inner.write_all(chunk)?;
        self.len += chunk.len() as u64;
        Ok(())
    }

    /// Total number of bytes held.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Returns true when no bytes were written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true once the body no longer fits in memory.
    #[must_use]
    pub fn is_spilled(&self) -> bool {
        self.inner.is_rolled()
    }
}

impl Read for SpooledBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for SpooledBody {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// Reads up to `limit` bytes from the start of `source`, then rewinds it.
///
/// Short sources return whatever is available.
///
/// # Errors
///
/// Returns an IO error if seeking or reading fails.
pub fn peek_prefix(source: &mut dyn ReadSeek, limit: usize) -> io::Result<Vec<u8>> {
    source.seek(SeekFrom::Start(0))?;
    let mut prefix = Vec::with_capacity(limit);
    {
        let mut limited = (&mut *source).take(limit as u64);
        limited.read_to_end(&mut prefix)?;
    }
    source.seek(SeekFrom::Start(0))?;
    Ok(prefix)
}

/// Reads the whole of `source` from the start into memory.
///
/// # Errors
///
/// Returns an IO error if seeking or reading fails.
pub fn read_all(source: &mut dyn ReadSeek) -> io::Result<Vec<u8>> {
    source.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_spooled_body_rereads_from_start() {
        let mut body = SpooledBody::from_bytes(b"%PDF-1.4 rest").unwrap();
        let mut first = String::new();
        body.read_to_string(&mut first).unwrap();
        assert_eq!(first, "%PDF-1.4 rest");

        let again = read_all(&mut body).unwrap();
        assert_eq!(again, b"%PDF-1.4 rest");
        assert_eq!(body.len(), 13);
    }

    #[test]
    fn test_spooled_body_spills_large_documents() {
        let big = vec![7u8; SPOOL_MEMORY_LIMIT + 10];
        let mut body = SpooledBody::from_reader(big.as_slice()).unwrap();
        assert!(body.is_spilled());
        assert_eq!(body.len(), big.len() as u64);
        assert_eq!(read_all(&mut body).unwrap().len(), big.len());
    }

    #[test]
    fn test_append_accumulates_chunks() {
        let mut body = SpooledBody::new();
        assert!(body.is_empty());
        body.append(b"abc").unwrap();
        body.append(b"def").unwrap();
        assert_eq!(read_all(&mut body).unwrap(), b"abcdef");
    }

    #[test]
    fn test_peek_prefix_handles_short_sources_and_rewinds() {
        let mut body = SpooledBody::from_bytes(b"PK\x03\x04").unwrap();
        let prefix = peek_prefix(&mut body, 1024).unwrap();
        assert_eq!(prefix, b"PK\x03\x04");
        assert_eq!(body.stream_position().unwrap(), 0);
    }
}
