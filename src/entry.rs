//! Entry metadata snapshots.

use std::hash::{Hash, Hasher};

use crate::codec::{NameCodec, decode_field};
use crate::engine::EntryRecord;
use crate::method::{CompressionMethod, EncryptionMethod};
use crate::timestamp::Timestamp;

/// An immutable snapshot of one archive entry.
///
/// Snapshots are produced by [`Archive`](crate::Archive) lookups and never
/// change afterwards. They go stale when the archive is mutated; re-query to
/// observe staged changes.
///
/// Two entries are equal when their raw (encoded) names are equal, whatever
/// their other metadata.
#[derive(Debug, Clone)]
pub struct Entry {
    index: Option<u64>,
    name: String,
    raw_name: Vec<u8>,
    modified: Option<Timestamp>,
    crc32: Option<u32>,
    size: u64,
    compressed_size: Option<u64>,
    compression: CompressionMethod,
    encryption: EncryptionMethod,
    flags: u16,
    extra: Vec<u8>,
    comment: String,
}

impl Entry {
    /// Creates a standalone entry that has not been resolved against an archive.
    ///
    /// The raw name is the UTF-8 encoding of `name`. Standalone entries can be
    /// passed to [`Archive::remove_entry`](crate::Archive::remove_entry),
    /// [`Archive::rename_entry`](crate::Archive::rename_entry) and
    /// [`Archive::input_stream`](crate::Archive::input_stream); the archive
    /// resolves them by name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::standalone(name.as_bytes().to_vec(), name)
    }

    /// Creates a standalone entry whose raw name is encoded by `codec`.
    pub fn with_codec(name: impl Into<String>, codec: &dyn NameCodec) -> crate::Result<Self> {
        let name = name.into();
        let raw = codec.encode(&name)?;
        Ok(Self::standalone(raw, name))
    }

    fn standalone(raw_name: Vec<u8>, name: String) -> Self {
        Self {
            index: None,
            name,
            raw_name,
            modified: None,
            crc32: None,
            size: 0,
            compressed_size: None,
            compression: CompressionMethod::Default,
            encryption: EncryptionMethod::None,
            flags: 0,
            extra: Vec::new(),
            comment: String::new(),
        }
    }

    pub(crate) fn from_record(record: EntryRecord, codec: &dyn NameCodec) -> Self {
        Self {
            index: Some(record.index),
            name: decode_field(codec, &record.raw_name, record.flags),
            raw_name: record.raw_name,
            modified: record.modified,
            crc32: record.crc32,
            size: record.size,
            compressed_size: record.compressed_size,
            compression: record.compression,
            encryption: record.encryption,
            flags: record.flags,
            extra: record.extra,
            comment: record.comment,
        }
    }

    /// Position in the archive, or `None` for a standalone entry.
    pub fn index(&self) -> Option<u64> {
        self.index
    }

    /// Decoded name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encoded name bytes as stored in the archive.
    pub fn raw_name(&self) -> &[u8] {
        &self.raw_name
    }

    /// Last modification time, if the header carries a valid one.
    pub fn modified(&self) -> Option<Timestamp> {
        self.modified
    }

    /// CRC-32 of the uncompressed data, when known.
    ///
    /// Staged entries backed by a file report `None` until committed.
    pub fn crc32(&self) -> Option<u32> {
        self.crc32
    }

    /// Uncompressed size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Compressed size in bytes; `None` for staged entries.
    pub fn compressed_size(&self) -> Option<u64> {
        self.compressed_size
    }

    /// Compression method (staged method for pending changes).
    pub fn compression_method(&self) -> CompressionMethod {
        self.compression
    }

    /// Encryption method (staged method for pending changes).
    pub fn encryption_method(&self) -> EncryptionMethod {
        self.encryption
    }

    /// General purpose bit flags from the header.
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Raw extra field bytes from the central directory.
    pub fn extra(&self) -> &[u8] {
        &self.extra
    }

    /// Entry comment.
    pub fn comment(&self) -> &str {
        &self.comment
    }

    /// True if the name ends with `/`.
    pub fn is_directory(&self) -> bool {
        self.name.ends_with('/')
    }

    /// True if the encryption method is anything but `None`.
    pub fn is_encrypted(&self) -> bool {
        self.encryption != EncryptionMethod::None
    }

    /// True if this entry was constructed standalone.
    pub fn is_standalone(&self) -> bool {
        self.index.is_none()
    }

    /// Space savings ratio (0.0 = no savings, 1.0 = 100%); 0.0 when unknown.
    pub fn compression_ratio(&self) -> f64 {
        match self.compressed_size {
            Some(packed) if self.size > 0 => 1.0 - packed as f64 / self.size as f64,
            _ => 0.0,
        }
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.raw_name == other.raw_name
    }
}

impl Eq for Entry {}

impl Hash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw_name.hash(state);
    }
}
