//! The archive engine interface.
//!
//! An [`Engine`] owns one archive resource: it answers metadata queries,
//! records staged modifications in its own journal, decodes entry payloads and
//! finally commits or discards the journal. Engines are single-threaded; the
//! [`Archive`](crate::Archive) session serializes every call behind its lock.
//!
//! [`ZipEngine`] is the implementation shipped with this crate.

mod journal;
mod zip_engine;

pub use self::zip_engine::{ZipEngine, ZipStream};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use crate::method::{CompressionMethod, EncryptionMethod};
use crate::password::Password;
use crate::progress::CommitProgress;
use crate::timestamp::Timestamp;
use crate::Result;

/// Engine-level metadata of one entry slot.
///
/// Names are raw bytes; the session decodes them with its
/// [`NameCodec`](crate::codec::NameCodec). Comments are decoded by the engine
/// because the container library already does so.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRecord {
    /// Slot index.
    pub index: u64,
    /// Encoded name.
    pub raw_name: Vec<u8>,
    /// Modification time, if valid.
    pub modified: Option<Timestamp>,
    /// CRC-32 of the uncompressed data, if known.
    pub crc32: Option<u32>,
    /// Uncompressed size.
    pub size: u64,
    /// Compressed size, if known.
    pub compressed_size: Option<u64>,
    /// Compression method.
    pub compression: CompressionMethod,
    /// Encryption method.
    pub encryption: EncryptionMethod,
    /// General purpose bit flags.
    pub flags: u16,
    /// Raw central directory extra field.
    pub extra: Vec<u8>,
    /// Entry comment.
    pub comment: String,
}

/// Content of an entry being added.
#[derive(Debug, Clone)]
pub enum EntrySource {
    /// In-memory bytes.
    Bytes(Arc<[u8]>),
    /// A byte range of a file on disk, read when the archive is committed.
    ///
    /// `length: None` means "up to the end of the file".
    File {
        /// Source file.
        path: PathBuf,
        /// First byte to include.
        offset: u64,
        /// Number of bytes to include.
        length: Option<u64>,
    },
    /// A directory marker with no content.
    Directory,
}

/// Drives one archive resource.
///
/// Indices address slots. Removing an entry leaves an empty slot behind, so
/// indices of the remaining entries stay stable for the whole session and
/// [`slot_count`](Engine::slot_count) includes removed slots.
pub trait Engine: Send + Sized {
    /// Per-entry read state handed out by [`open_entry`](Engine::open_entry).
    type Stream: Send;

    /// Number of index slots, including removed ones.
    fn slot_count(&self) -> u64;

    /// Metadata for a slot: `Ok(None)` for a removed slot,
    /// [`Error::InvalidIndex`](crate::Error::InvalidIndex) outside `0..slot_count`.
    fn stat(&self, index: u64) -> Result<Option<EntryRecord>>;

    /// Finds the live slot whose raw name equals `raw_name` byte for byte.
    fn locate(&self, raw_name: &[u8]) -> Option<u64>;

    /// Stages a new entry and returns its index.
    ///
    /// If a live entry with the same raw name exists, its content is replaced
    /// and its index returned.
    fn add(&mut self, raw_name: &[u8], source: EntrySource) -> Result<u64>;

    /// Stages a rename.
    fn rename(&mut self, index: u64, raw_name: &[u8]) -> Result<()>;

    /// Stages a removal.
    fn remove(&mut self, index: u64) -> Result<()>;

    /// Stages a compression method change. `level` 0 means engine default.
    fn set_compression(&mut self, index: u64, method: CompressionMethod, level: u32) -> Result<()>;

    /// Stages an encryption method change. `password` is already resolved.
    fn set_encryption(
        &mut self,
        index: u64,
        method: EncryptionMethod,
        password: Option<&Password>,
    ) -> Result<()>;

    /// Stages a modification time change.
    fn set_modified_time(&mut self, index: u64, time: Timestamp) -> Result<()>;

    /// Password used to decode encrypted entries that must be re-encoded on commit.
    fn set_default_password(&mut self, password: Option<&Password>);

    /// The archive comment (staged value if changed).
    fn comment(&self) -> Vec<u8>;

    /// Stages a new archive comment.
    fn set_comment(&mut self, raw: &[u8]) -> Result<()>;

    /// Opens a slot for reading. Password problems surface on the first
    /// [`read`](Engine::read), not here.
    fn open_entry(&mut self, index: u64, password: Option<&Password>) -> Result<Self::Stream>;

    /// Reads decoded bytes from an open stream. Returns 0 at end of data.
    fn read(&mut self, stream: &mut Self::Stream, buf: &mut [u8]) -> Result<usize>;

    /// Skips up to `n` decoded bytes and returns how many were skipped.
    ///
    /// The default reads and discards.
    fn skip(&mut self, stream: &mut Self::Stream, n: u64) -> Result<u64> {
        let mut scratch = [0u8; 8192];
        let mut skipped = 0u64;
        while skipped < n {
            let want = (n - skipped).min(scratch.len() as u64) as usize;
            let got = self.read(stream, &mut scratch[..want])?;
            if got == 0 {
                break;
            }
            skipped += got as u64;
        }
        Ok(skipped)
    }

    /// True if the journal holds anything to commit.
    fn has_changes(&self) -> bool;

    /// Writes the journal to backing storage and releases the resource.
    fn commit(self, progress: &mut CommitProgress<'_>) -> Result<()>;

    /// Drops the journal and releases the resource.
    fn discard(self);
}

/// Reads `len` bytes of a file starting at `offset`.
pub(crate) fn read_file_range(path: &std::path::Path, offset: u64, len: u64) -> io::Result<Vec<u8>> {
    use std::io::{Read, Seek, SeekFrom};

    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut data = Vec::with_capacity(len.min(1 << 24) as usize);
    file.take(len).read_to_end(&mut data)?;
    if (data.len() as u64) < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} shrank while staged", path.display()),
        ));
    }
    Ok(data)
}
