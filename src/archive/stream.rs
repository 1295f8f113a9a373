//! Streaming readers for entry payloads.

use std::fmt;
use std::io::{self, Read};
use std::sync::Arc;

use super::{ArchiveState, Shared};
use crate::engine::{Engine, ZipEngine};
use crate::entry::Entry;
use crate::{Error, Result};

/// A sequential reader over one entry's decoded bytes.
///
/// Created by [`Archive::input_stream`](crate::Archive::input_stream).
/// Each read locks the archive for the duration of one engine call only, so
/// streams of different entries can be consumed on different threads.
///
/// The stream reads the content the entry had when the stream was opened,
/// even if the entry is replaced or removed afterwards.
///
/// The stream closes itself once the entry's declared size has been read
/// and when dropped. A stream over an empty entry starts out closed and never
/// decodes anything, so a wrong password for it goes unreported.
///
/// Closing the archive invalidates every stream; their next read fails with
/// [`Error::Closed`] (wrapped in an [`io::Error`] by the [`Read`] impl,
/// recoverable with [`Error::downcast_io`]).
pub struct EntryStream<E: Engine = ZipEngine> {
    shared: Arc<Shared<E>>,
    id: u64,
    entry: Entry,
    remaining: u64,
    closed: bool,
}

impl<E: Engine> EntryStream<E> {
    pub(crate) fn new(shared: Arc<Shared<E>>, id: u64, entry: Entry) -> Self {
        let remaining = entry.size();
        let mut stream = Self {
            shared,
            id,
            entry,
            remaining,
            closed: false,
        };
        if remaining == 0 {
            stream.close();
        }
        stream
    }

    /// The entry being read, as it was when the stream was opened.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Total decoded size.
    pub fn size(&self) -> u64 {
        self.entry.size()
    }

    /// Bytes not yet read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Returns true once the stream has been closed, explicitly or by
    /// reaching the end.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reads into `buf`, returning crate errors directly.
    ///
    /// Returns `Ok(0)` at the end of the entry.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        if self.closed {
            return Err(Error::Closed);
        }
        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));

        let n = {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;
            if inner.state != ArchiveState::Open {
                return Err(Error::Closed);
            }
            let (Some(engine), Some(stream)) =
                (inner.engine.as_mut(), inner.streams.get_mut(&self.id))
            else {
                return Err(Error::Closed);
            };
            engine.read(stream, &mut buf[..want])?
        };

        if n == 0 {
            return Err(Error::InvalidFormat(format!(
                "{} ended {} bytes before its declared size",
                self.entry.name(),
                self.remaining
            )));
        }
        self.consume(n as u64);
        Ok(n)
    }

    /// Skips up to `n` bytes and returns how many were skipped.
    ///
    /// Compressed data cannot be seeked, so the engine decodes and drops
    /// the skipped bytes.
    pub fn skip(&mut self, n: u64) -> Result<u64> {
        let want = n.min(self.remaining);
        if want == 0 {
            return Ok(0);
        }
        if self.closed {
            return Err(Error::Closed);
        }
        let skipped = {
            let mut guard = self.shared.lock();
            let inner = &mut *guard;
            if inner.state != ArchiveState::Open {
                return Err(Error::Closed);
            }
            let (Some(engine), Some(stream)) =
                (inner.engine.as_mut(), inner.streams.get_mut(&self.id))
            else {
                return Err(Error::Closed);
            };
            engine.skip(stream, want)?
        };
        self.consume(skipped);
        Ok(skipped)
    }

    /// Releases the stream's engine state. Calling it again does nothing.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.shared.lock().streams.remove(&self.id);
    }

    fn consume(&mut self, n: u64) {
        self.remaining = self.remaining.saturating_sub(n);
        if self.remaining == 0 {
            self.close();
        }
    }
}

impl<E: Engine> Read for EntryStream<E> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_chunk(buf).map_err(io::Error::from)
    }
}

impl<E: Engine> Drop for EntryStream<E> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<E: Engine> fmt::Debug for EntryStream<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryStream")
            .field("entry", &self.entry.name())
            .field("size", &self.size())
            .field("remaining", &self.remaining)
            .field("closed", &self.closed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use crate::{Archive, Error, OpenFlags};
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn test_stream_closes_at_end() {
        let dir = TempDir::new().unwrap();
        let archive = Archive::open(dir.path().join("t.zip"), OpenFlags::CREATE).unwrap();
        archive.add_bytes("a.txt", b"abcdef").unwrap();
        let entry = archive.entry("a.txt").unwrap().unwrap();

        let mut stream = archive.input_stream(&entry, None).unwrap();
        assert_eq!(stream.size(), 6);
        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 4);
        assert_eq!(stream.remaining(), 2);
        assert!(!stream.is_closed());
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert!(stream.is_closed());
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        archive.discard().unwrap();
    }

    #[test]
    fn test_skip_then_read() {
        let dir = TempDir::new().unwrap();
        let archive = Archive::open(dir.path().join("t.zip"), OpenFlags::CREATE).unwrap();
        archive.add_bytes("a.txt", b"0123456789").unwrap();
        let entry = archive.entry("a.txt").unwrap().unwrap();

        let mut stream = archive.input_stream(&entry, None).unwrap();
        assert_eq!(stream.skip(7).unwrap(), 7);
        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"789");
        assert_eq!(stream.skip(5).unwrap(), 0);
        archive.discard().unwrap();
    }

    #[cfg(feature = "aes")]
    #[test]
    fn test_empty_encrypted_entry_reads_empty() {
        use crate::{EncryptionMethod, Password};

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.zip");
        let archive = Archive::open(&path, OpenFlags::CREATE).unwrap();
        let index = archive.add_bytes("empty.txt", b"").unwrap();
        archive
            .set_encryption_method(index, EncryptionMethod::Aes256, Some(&Password::new("pw")))
            .unwrap();
        archive.close().unwrap();

        let archive = Archive::open(&path, OpenFlags::READ_ONLY).unwrap();
        let entry = archive.entry("empty.txt").unwrap().unwrap();
        let mut stream = archive
            .input_stream(&entry, Some(&Password::new("wrong")))
            .unwrap();
        assert!(stream.is_closed());
        let mut buf = [0u8; 4];
        assert_eq!(stream.read_chunk(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_explicit_close_fails_later_reads() {
        let dir = TempDir::new().unwrap();
        let archive = Archive::open(dir.path().join("t.zip"), OpenFlags::CREATE).unwrap();
        archive.add_bytes("a.txt", b"data").unwrap();
        let entry = archive.entry("a.txt").unwrap().unwrap();

        let mut stream = archive.input_stream(&entry, None).unwrap();
        stream.close();
        stream.close();
        let mut buf = [0u8; 2];
        assert!(matches!(stream.read_chunk(&mut buf), Err(Error::Closed)));
        archive.discard().unwrap();
    }
}
