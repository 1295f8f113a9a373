//! ZIP engine backed by the `zip` crate.
//!
//! The archive as opened is read once into a [`Journal`]; every mutation is
//! recorded there. Committing writes a fresh archive into a temporary file in
//! the same directory and atomically replaces the original:
//! - unchanged unencrypted entries (including renamed ones) are copied
//!   without decompression
//! - entries with new content or new settings are encoded from scratch
//! - encrypted entries are always decrypted and re-encrypted, which needs
//!   the session's default password
//!
//! A stream captures its entry's content when it is opened; the payload is
//! decoded into memory on the first read.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::journal::{Journal, OriginalEntry, Slot, StagedContent};
use super::{Engine, EntryRecord, EntrySource, read_file_range};
use crate::codec::{NameCodec, UTF8_FLAG};
use crate::error::{OpenFailure, PasswordDetectionMethod};
use crate::method::{CompressionMethod, EncryptionMethod};
use crate::options::{OpenFlags, OpenOptions};
use crate::password::Password;
use crate::progress::CommitProgress;
use crate::timestamp::Timestamp;
use crate::{Error, Result};

/// WinZip AES extra field header ID.
const AES_EXTRA_ID: u16 = 0x9901;

/// General purpose flag: strong encryption (PKWARE SES).
const STRONG_ENCRYPTION_FLAG: u16 = 1 << 6;

/// Offset of the general purpose flags inside a central directory header.
const CENTRAL_FLAGS_OFFSET: u64 = 8;

/// Sizes at or above this need ZIP64 records.
const ZIP64_THRESHOLD: u64 = u32::MAX as u64;

/// Maximum length of the archive comment.
const MAX_COMMENT_LEN: usize = u16::MAX as usize;

/// An [`Engine`] over a ZIP file on disk.
pub struct ZipEngine {
    path: PathBuf,
    codec: Arc<dyn NameCodec>,
    archive: Option<ZipArchive<File>>,
    journal: Journal,
    default_password: Option<Password>,
}

/// Read state of one entry opened by [`ZipEngine`].
#[derive(Debug)]
pub struct ZipStream {
    index: u64,
    name: String,
    source: StreamSource,
    password: Option<Password>,
    data: Option<Cursor<Vec<u8>>>,
}

/// Where a stream's bytes come from, fixed when the stream is opened.
#[derive(Debug)]
enum StreamSource {
    Staged(StagedContent),
    Original(usize),
}

impl fmt::Debug for ZipEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ZipEngine")
            .field("path", &self.path)
            .field("codec", &self.codec.label())
            .field("slots", &self.journal.slot_count())
            .field("dirty", &self.journal.is_dirty())
            .finish_non_exhaustive()
    }
}

impl ZipEngine {
    /// Opens (or prepares to create) the archive at `path`.
    pub fn open(path: impl AsRef<Path>, options: &OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let flags = options.flags;
        if let Err(msg) = options.validate_flags() {
            return Err(Error::open(path, OpenFailure::ConflictingFlags(msg)));
        }

        let mut truncated = false;
        let mut archive = match fs::metadata(&path) {
            Ok(_) if flags.contains(OpenFlags::EXCLUSIVE) => {
                return Err(Error::open(path, OpenFailure::AlreadyExists));
            }
            Ok(meta) if meta.is_dir() => {
                return Err(Error::open(
                    path,
                    OpenFailure::NotAnArchive("is a directory".into()),
                ));
            }
            Ok(meta) if flags.contains(OpenFlags::TRUNCATE) => {
                truncated = meta.len() > 0;
                None
            }
            // An empty file is an empty archive.
            Ok(meta) if meta.len() == 0 => None,
            Ok(_) => Some(read_archive(&path)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if !flags.contains(OpenFlags::CREATE) {
                    return Err(Error::open(path, OpenFailure::NotFound));
                }
                None
            }
            Err(e) => return Err(Error::open(path, OpenFailure::Io(e.kind()))),
        };

        let mut journal = match archive.as_mut() {
            Some(archive) => {
                if flags.contains(OpenFlags::CHECK_CONSISTENCY) {
                    check_consistency(archive, &path)?;
                }
                let originals = load_originals(archive, &path)?;
                Journal::new(originals, archive.comment().to_vec())
            }
            None => Journal::default(),
        };
        if truncated {
            journal.mark_dirty();
        }

        log::debug!(
            "opened {} ({} entries, flags {:?})",
            path.display(),
            journal.slot_count(),
            flags
        );
        Ok(Self {
            path,
            codec: Arc::clone(&options.codec),
            archive,
            journal,
            default_password: options.default_password.clone(),
        })
    }

    /// The backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decoded payload of the content a stream was opened on.
    fn load_stream(&mut self, stream: &ZipStream) -> Result<Vec<u8>> {
        match &stream.source {
            StreamSource::Staged(content) => Ok(staged_bytes(&content.source, content.size)?),
            StreamSource::Original(origin) => {
                let original = self
                    .journal
                    .original(*origin)
                    .ok_or_else(|| Error::Engine(format!("missing original entry {}", origin)))?;
                decode_original(
                    &mut self.archive,
                    original,
                    *origin,
                    stream.index,
                    stream.name.clone(),
                    stream.password.as_ref(),
                )
            }
        }
    }

    fn ensure_loaded<'s>(&mut self, stream: &'s mut ZipStream) -> Result<&'s mut Cursor<Vec<u8>>> {
        if stream.data.is_none() {
            let data = self.load_stream(stream)?;
            stream.data = Some(Cursor::new(data));
        }
        stream
            .data
            .as_mut()
            .ok_or_else(|| Error::Engine("stream buffer missing".into()))
    }

    fn commit_journal(&mut self, progress: &mut CommitProgress<'_>) -> Result<()> {
        if self.journal.live_count() == 0 {
            // Like libzip, an archive without entries is not kept on disk.
            self.archive = None;
            match fs::remove_file(&self.path) {
                Ok(()) => log::debug!("removed empty archive {}", self.path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            return Ok(());
        }

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".zipsession-")
            .suffix(".tmp")
            .tempfile_in(&dir)?;

        {
            let mut writer = ZipWriter::new(tmp.as_file_mut());
            let indices: Vec<u64> = self.journal.live_slots().map(|(i, _)| i).collect();
            let total = indices.len();
            for (done, index) in indices.into_iter().enumerate() {
                progress.update(done as f64 / total as f64);
                let Some(slot) = self.journal.slot(index)? else {
                    continue;
                };
                let name = name_for_write(&self.journal, slot, self.codec.as_ref());
                let size = self.journal.record(index)?.map_or(0, |r| r.size);
                progress.entry_start(&name, size);
                let written = write_slot(
                    &mut writer,
                    &mut self.archive,
                    &self.journal,
                    self.default_password.as_ref(),
                    progress,
                    index,
                    slot,
                    &name,
                );
                progress.entry_complete(&name, written.is_ok());
                written?;
            }
            writer.set_raw_comment(self.journal.comment().to_vec().into());
            writer.finish().map_err(map_zip_error)?;
        }

        // Release the source before replacing it.
        self.archive = None;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        log::debug!(
            "committed {} ({} entries)",
            self.path.display(),
            self.journal.live_count()
        );
        Ok(())
    }
}

impl Engine for ZipEngine {
    type Stream = ZipStream;

    fn slot_count(&self) -> u64 {
        self.journal.slot_count()
    }

    fn stat(&self, index: u64) -> Result<Option<EntryRecord>> {
        self.journal.record(index)
    }

    fn locate(&self, raw_name: &[u8]) -> Option<u64> {
        self.journal.locate(raw_name)
    }

    fn add(&mut self, raw_name: &[u8], source: EntrySource) -> Result<u64> {
        if raw_name.is_empty() {
            return Err(Error::invalid_argument("entry name is empty"));
        }
        let content = match source {
            EntrySource::Bytes(bytes) => StagedContent {
                size: bytes.len() as u64,
                crc32: Some(crc32fast::hash(&bytes)),
                modified: Timestamp::now(),
                source: EntrySource::Bytes(bytes),
            },
            EntrySource::File {
                path,
                offset,
                length,
            } => {
                let meta = fs::metadata(&path)?;
                if !meta.is_file() {
                    return Err(Error::invalid_argument(format!(
                        "{} is not a regular file",
                        path.display()
                    )));
                }
                let available = meta.len().checked_sub(offset).ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "offset {} is past the end of {}",
                        offset,
                        path.display()
                    ))
                })?;
                let size = length.unwrap_or(available);
                if size > available {
                    return Err(Error::invalid_argument(format!(
                        "range {}+{} exceeds the size of {}",
                        offset,
                        size,
                        path.display()
                    )));
                }
                let modified = meta
                    .modified()
                    .map(Timestamp::from_system_time)
                    .unwrap_or_else(|_| Timestamp::now());
                StagedContent {
                    source: EntrySource::File {
                        path,
                        offset,
                        length: Some(size),
                    },
                    size,
                    crc32: None,
                    modified,
                }
            }
            EntrySource::Directory => StagedContent {
                source: EntrySource::Directory,
                size: 0,
                crc32: Some(0),
                modified: Timestamp::now(),
            },
        };
        Ok(self.journal.insert(raw_name, content))
    }

    fn rename(&mut self, index: u64, raw_name: &[u8]) -> Result<()> {
        if raw_name.is_empty() {
            return Err(Error::invalid_argument("entry name is empty"));
        }
        self.journal.rename(index, raw_name)
    }

    fn remove(&mut self, index: u64) -> Result<()> {
        self.journal.remove(index)
    }

    fn set_compression(&mut self, index: u64, method: CompressionMethod, level: u32) -> Result<()> {
        if !can_encode(method) {
            return Err(Error::UnsupportedMethod {
                method: method.code() as u16,
            });
        }
        self.journal.set_compression(index, method, level)
    }

    fn set_encryption(
        &mut self,
        index: u64,
        method: EncryptionMethod,
        password: Option<&Password>,
    ) -> Result<()> {
        if method.is_aes() && !cfg!(feature = "aes") {
            return Err(Error::UnsupportedFeature {
                feature: "AES encryption (enable the `aes` feature)",
            });
        }
        let password = match method {
            EncryptionMethod::None => None,
            _ => Some(password.cloned().ok_or(Error::PasswordRequired)?),
        };
        self.journal.set_encryption(index, method, password)
    }

    fn set_modified_time(&mut self, index: u64, time: Timestamp) -> Result<()> {
        self.journal.set_modified(index, time)
    }

    fn set_default_password(&mut self, password: Option<&Password>) {
        self.default_password = password.cloned();
    }

    fn comment(&self) -> Vec<u8> {
        self.journal.comment().to_vec()
    }

    fn set_comment(&mut self, raw: &[u8]) -> Result<()> {
        if raw.len() > MAX_COMMENT_LEN {
            return Err(Error::invalid_argument(format!(
                "archive comment is {} bytes, the limit is {}",
                raw.len(),
                MAX_COMMENT_LEN
            )));
        }
        self.journal.set_comment(raw);
        Ok(())
    }

    fn open_entry(&mut self, index: u64, password: Option<&Password>) -> Result<ZipStream> {
        let slot = self.journal.slot(index)?.ok_or_else(|| Error::EntryNotFound {
            name: format!("#{}", index),
        })?;
        // Later staging on this slot must not change what the stream reads.
        let source = match (&slot.content, slot.origin) {
            (Some(content), _) => StreamSource::Staged(content.clone()),
            (None, Some(origin)) => StreamSource::Original(origin),
            (None, None) => return Err(Error::Engine(format!("slot {} has no content", index))),
        };
        Ok(ZipStream {
            index,
            name: self.codec.decode(&slot.raw_name),
            source,
            password: password.cloned(),
            data: None,
        })
    }

    fn read(&mut self, stream: &mut ZipStream, buf: &mut [u8]) -> Result<usize> {
        let cursor = self.ensure_loaded(stream)?;
        Ok(cursor.read(buf)?)
    }

    fn skip(&mut self, stream: &mut ZipStream, n: u64) -> Result<u64> {
        let cursor = self.ensure_loaded(stream)?;
        let len = cursor.get_ref().len() as u64;
        let pos = cursor.position();
        let target = pos.saturating_add(n).min(len);
        cursor.set_position(target);
        Ok(target - pos)
    }

    fn has_changes(&self) -> bool {
        self.journal.is_dirty()
    }

    fn commit(mut self, progress: &mut CommitProgress<'_>) -> Result<()> {
        if !self.journal.is_dirty() {
            log::debug!("nothing to commit for {}", self.path.display());
            return Ok(());
        }
        self.commit_journal(progress)
    }

    fn discard(self) {
        log::debug!(
            "discarded {} (pending changes: {})",
            self.path.display(),
            self.journal.is_dirty()
        );
    }
}

fn read_archive(path: &Path) -> Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|e| Error::open(path, OpenFailure::Io(e.kind())))?;
    ZipArchive::new(file).map_err(|e| match e {
        ZipError::Io(io) => Error::open(path, OpenFailure::Io(io.kind())),
        other => Error::open(path, OpenFailure::NotAnArchive(other.to_string())),
    })
}

fn check_consistency(archive: &mut ZipArchive<File>, path: &Path) -> Result<()> {
    let inconsistent = |msg: String| Error::open(path, OpenFailure::Inconsistent(msg));
    let mut seen = std::collections::HashSet::new();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index_raw(i)
            .map_err(|e| inconsistent(format!("entry {}: {}", i, e)))?;
        if !seen.insert(file.name_raw().to_vec()) {
            return Err(inconsistent(format!("duplicate entry name at {}", i)));
        }
        let expected = file.compressed_size();
        let copied = io::copy(&mut file, &mut io::sink())
            .map_err(|e| inconsistent(format!("entry {}: {}", i, e)))?;
        if copied != expected {
            return Err(inconsistent(format!(
                "entry {} holds {} of {} bytes",
                i, copied, expected
            )));
        }
    }
    Ok(())
}

fn load_originals(archive: &mut ZipArchive<File>, path: &Path) -> Result<Vec<OriginalEntry>> {
    let mut central = File::open(path)?;
    let mut originals = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index_raw(i).map_err(map_zip_error)?;
        let extra: Option<&[u8]> = file.extra_data().into();
        let extra = extra.unwrap_or_default().to_vec();
        let aes = parse_aes_extra(&extra);
        let flags = read_central_flags(&mut central, file.central_header_start())?;

        let encryption = match (file.encrypted(), aes) {
            (false, _) => EncryptionMethod::None,
            (true, Some((strength, _))) => EncryptionMethod::from_aes_strength(strength),
            (true, None) if flags & STRONG_ENCRYPTION_FLAG != 0 => EncryptionMethod::Unknown,
            (true, None) => EncryptionMethod::TradPkware,
        };
        #[allow(deprecated)]
        let header_method = file.compression().to_u16();
        let compression = match aes {
            Some((_, actual)) => CompressionMethod::from_zip_code(actual),
            None => CompressionMethod::from_zip_code(header_method),
        };
        let modified: Option<zip::DateTime> = file.last_modified().into();

        originals.push(OriginalEntry {
            raw_name: file.name_raw().to_vec(),
            modified: modified.and_then(|dt| Timestamp::from_dos(dt.datepart(), dt.timepart())),
            crc32: file.crc32(),
            size: file.size(),
            compressed_size: file.compressed_size(),
            compression,
            encryption,
            flags,
            extra,
            comment: file.comment().to_string(),
        });
    }
    Ok(originals)
}

fn read_central_flags(central: &mut File, header_start: u64) -> Result<u16> {
    let mut buf = [0u8; 2];
    central.seek(SeekFrom::Start(header_start + CENTRAL_FLAGS_OFFSET))?;
    central.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

/// Returns (strength, actual compression method) from a WinZip AES extra field.
fn parse_aes_extra(extra: &[u8]) -> Option<(u8, u16)> {
    let mut rest = extra;
    while rest.len() >= 4 {
        let id = u16::from_le_bytes([rest[0], rest[1]]);
        let len = u16::from_le_bytes([rest[2], rest[3]]) as usize;
        let body = rest.get(4..4 + len)?;
        if id == AES_EXTRA_ID && len >= 7 {
            return Some((body[4], u16::from_le_bytes([body[5], body[6]])));
        }
        rest = &rest[4 + len..];
    }
    None
}

fn can_decode(method: CompressionMethod) -> bool {
    match method {
        CompressionMethod::Store => true,
        CompressionMethod::Deflate => cfg!(feature = "deflate"),
        CompressionMethod::Bzip2 => cfg!(feature = "bzip2"),
        CompressionMethod::Default | CompressionMethod::Other(_) => false,
    }
}

fn can_encode(method: CompressionMethod) -> bool {
    match method {
        CompressionMethod::Default => true,
        other => can_decode(other),
    }
}

fn map_zip_error(err: ZipError) -> Error {
    match err {
        ZipError::Io(e) => Error::Io(e),
        ZipError::InvalidArchive(msg) => Error::InvalidFormat(msg.to_string()),
        ZipError::InvalidPassword => {
            Error::wrong_password(None, None, PasswordDetectionMethod::VerificationValue)
        }
        other => Error::Engine(other.to_string()),
    }
}

fn decode_original(
    archive: &mut Option<ZipArchive<File>>,
    original: &OriginalEntry,
    origin: usize,
    index: u64,
    name: String,
    password: Option<&Password>,
) -> Result<Vec<u8>> {
    if !can_decode(original.compression) {
        return Err(Error::UnsupportedMethod {
            method: original.compression.code() as u16,
        });
    }
    let encrypted = original.encryption != EncryptionMethod::None;
    match original.encryption {
        EncryptionMethod::Unknown => {
            return Err(Error::UnsupportedFeature {
                feature: "strong encryption",
            });
        }
        m if m.is_aes() && !cfg!(feature = "aes") => {
            return Err(Error::UnsupportedFeature {
                feature: "AES decryption (enable the `aes` feature)",
            });
        }
        _ => {}
    }

    let archive = archive
        .as_mut()
        .ok_or_else(|| Error::Engine("archive data is not available".into()))?;
    let wrong_password =
        |name: String, method| Error::wrong_password(Some(index), Some(name), method);

    let mut file = if encrypted {
        let Some(password) = password else {
            return Err(wrong_password(name, PasswordDetectionMethod::PasswordMissing));
        };
        match archive.by_index_decrypt(origin, password.as_bytes()) {
            Ok(file) => file,
            Err(ZipError::InvalidPassword) => {
                return Err(wrong_password(name, PasswordDetectionMethod::VerificationValue));
            }
            Err(e) => return Err(map_zip_error(e)),
        }
    } else {
        archive.by_index(origin).map_err(map_zip_error)?
    };

    let mut data = Vec::with_capacity(original.size.min(1 << 24) as usize);
    if let Err(e) = file.read_to_end(&mut data) {
        let checksum = e.to_string().to_ascii_lowercase().contains("checksum");
        return Err(match (encrypted, checksum) {
            (true, true) => wrong_password(name, PasswordDetectionMethod::CrcMismatch),
            (true, false) => wrong_password(name, PasswordDetectionMethod::DecompressionFailure),
            (false, true) => Error::CrcMismatch {
                entry_index: index,
                entry_name: Some(name),
                expected: original.crc32,
                actual: crc32fast::hash(&data),
            },
            (false, false) => Error::Io(e),
        });
    }
    Ok(data)
}

fn staged_bytes(source: &EntrySource, size: u64) -> io::Result<Vec<u8>> {
    match source {
        EntrySource::Bytes(bytes) => Ok(bytes.to_vec()),
        EntrySource::File { path, offset, .. } => read_file_range(path, *offset, size),
        EntrySource::Directory => Ok(Vec::new()),
    }
}

/// The name an entry is written under. Output names are always UTF-8.
fn name_for_write(journal: &Journal, slot: &Slot, codec: &dyn NameCodec) -> String {
    let flagged_utf8 = slot
        .origin
        .and_then(|o| journal.original(o))
        .is_some_and(|o| o.flags & UTF8_FLAG != 0 && o.raw_name == slot.raw_name);
    if flagged_utf8 {
        String::from_utf8_lossy(&slot.raw_name).into_owned()
    } else {
        codec.decode(&slot.raw_name)
    }
}

fn zip_method(method: CompressionMethod) -> zip::CompressionMethod {
    let code = match method {
        CompressionMethod::Default if cfg!(feature = "deflate") => 8,
        CompressionMethod::Default => 0,
        other => other.code() as u16,
    };
    #[allow(deprecated)]
    zip::CompressionMethod::from_u16(code)
}

fn zip_time(time: Timestamp) -> zip::DateTime {
    zip::DateTime::from_date_and_time(
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute(),
        time.second(),
    )
    .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn write_slot(
    writer: &mut ZipWriter<&mut File>,
    archive: &mut Option<ZipArchive<File>>,
    journal: &Journal,
    default_password: Option<&Password>,
    progress: &mut CommitProgress<'_>,
    index: u64,
    slot: &Slot,
    name: &str,
) -> Result<()> {
    let original = slot.origin.and_then(|o| journal.original(o).map(|e| (o, e)));

    // A raw copy loses the encryption headers, so encrypted entries are
    // re-encoded below.
    let copy_raw = original.is_some_and(|(_, o)| o.encryption == EncryptionMethod::None);
    if let (false, true, Some((origin, _))) = (slot.needs_encode(), copy_raw, original) {
        let source = archive
            .as_mut()
            .ok_or_else(|| Error::Engine("archive data is not available".into()))?;
        if journal.is_renamed(slot) {
            log::debug!("copying entry {} under new name {}", index, name);
        }
        let file = source.by_index_raw(origin).map_err(map_zip_error)?;
        return writer
            .raw_copy_file_rename(file, name.to_string())
            .map_err(map_zip_error);
    }

    let modified = slot
        .modified
        .or(slot.content.as_ref().map(|c| c.modified))
        .or(original.and_then(|(_, o)| o.modified))
        .unwrap_or_else(Timestamp::now);

    let (method, level) = match (slot.compression, original) {
        (Some(setting), _) => setting,
        (None, Some((_, o))) if slot.content.is_none() && o.compression.is_settable() => {
            (o.compression, 0)
        }
        _ => (CompressionMethod::Default, 0),
    };

    // Existing encryption is kept unless overridden; it needs a password.
    let encryption: Option<(EncryptionMethod, Password)> = match (&slot.encryption, original) {
        (Some((EncryptionMethod::None, _)), _) => None,
        (Some((method, Some(password))), _) => Some((*method, password.clone())),
        (Some((_, None)), _) => return Err(Error::PasswordRequired),
        (None, Some((_, o))) if slot.content.is_none() && o.encryption != EncryptionMethod::None => {
            let Some(password) = default_password.cloned() else {
                log::warn!("{}: keeping an encrypted entry needs the default password", name);
                return Err(Error::PasswordRequired);
            };
            let method = if o.encryption.is_aes() {
                o.encryption
            } else {
                progress.warning(&format!(
                    "{}: re-encrypting {} entry with AES-256",
                    name, o.encryption
                ));
                EncryptionMethod::Aes256
            };
            Some((method, password))
        }
        _ => None,
    };

    let level = match (method, level) {
        (CompressionMethod::Store, _) | (_, 0) => None,
        (_, level) => Some(level as i64),
    };
    let is_dir = name.ends_with('/') && slot.content.as_ref().is_none_or(|c| c.size == 0);

    let options = SimpleFileOptions::default()
        .compression_method(zip_method(method))
        .compression_level(level)
        .last_modified_time(zip_time(modified));

    if is_dir {
        return writer.add_directory(name, options).map_err(map_zip_error);
    }

    let size = match (&slot.content, original) {
        (Some(content), _) => content.size,
        (None, Some((_, o))) => o.size,
        (None, None) => 0,
    };
    let options = options.large_file(size >= ZIP64_THRESHOLD);

    match &encryption {
        None => writer.start_file(name, options).map_err(map_zip_error)?,
        #[cfg(feature = "aes")]
        Some((method, password)) => {
            let mode = match method {
                EncryptionMethod::Aes128 => zip::AesMode::Aes128,
                EncryptionMethod::Aes192 => zip::AesMode::Aes192,
                _ => zip::AesMode::Aes256,
            };
            writer
                .start_file(name, options.with_aes_encryption(mode, password.as_str()))
                .map_err(map_zip_error)?
        }
        #[cfg(not(feature = "aes"))]
        Some(_) => {
            return Err(Error::UnsupportedFeature {
                feature: "AES encryption (enable the `aes` feature)",
            });
        }
    }

    match (&slot.content, original) {
        (Some(StagedContent { source: EntrySource::File { path, offset, .. }, size, .. }), _) => {
            let mut file = File::open(path)?;
            file.seek(SeekFrom::Start(*offset))?;
            let copied = io::copy(&mut file.take(*size), writer)?;
            if copied != *size {
                return Err(Error::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("{} shrank while staged", path.display()),
                )));
            }
        }
        (Some(content), _) => {
            writer.write_all(&staged_bytes(&content.source, content.size)?)?;
        }
        (None, Some((origin, o))) => {
            let decode_password = default_password
                .or(slot.encryption.as_ref().and_then(|(_, p)| p.as_ref()));
            let data = decode_original(archive, o, origin, index, name.to_string(), decode_password)?;
            writer.write_all(&data)?;
        }
        (None, None) => return Err(Error::Engine(format!("slot {} has no content", index))),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::RecordingProgress;
    use tempfile::TempDir;

    fn open(path: &Path, flags: OpenFlags) -> Result<ZipEngine> {
        ZipEngine::open(path, &OpenOptions::new().flags(flags))
    }

    fn commit(engine: ZipEngine) -> Result<()> {
        let mut recorder = RecordingProgress::new();
        engine.commit(&mut CommitProgress::new(&mut recorder))
    }

    fn read_all(engine: &mut ZipEngine, index: u64, password: Option<&Password>) -> Result<Vec<u8>> {
        let mut stream = engine.open_entry(index, password)?;
        let mut out = Vec::new();
        let mut buf = [0u8; 7];
        loop {
            let n = engine.read(&mut stream, &mut buf)?;
            if n == 0 {
                return Ok(out);
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn test_parse_aes_extra() {
        // unrelated field, then AES: version 2, "AE", strength 3, method 8
        let extra = [
            0x0A, 0x00, 0x02, 0x00, 0xFF, 0xFF, //
            0x01, 0x99, 0x07, 0x00, 0x02, 0x00, b'A', b'E', 0x03, 0x08, 0x00,
        ];
        assert_eq!(parse_aes_extra(&extra), Some((3, 8)));
        assert_eq!(parse_aes_extra(&[0x01, 0x99, 0x07]), None);
        assert_eq!(parse_aes_extra(&[]), None);
    }

    #[test]
    fn test_missing_without_create() {
        let dir = TempDir::new().unwrap();
        let err = open(&dir.path().join("none.zip"), OpenFlags::empty()).unwrap_err();
        assert!(matches!(err, Error::Open { reason: OpenFailure::NotFound, .. }));
    }

    #[test]
    fn test_create_commit_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.zip");
        let mut engine = open(&path, OpenFlags::CREATE).unwrap();
        let idx = engine
            .add(b"hello.txt", EntrySource::Bytes(Arc::from(&b"hello world"[..])))
            .unwrap();
        assert_eq!(idx, 0);
        engine.add(b"dir/", EntrySource::Directory).unwrap();
        assert_eq!(read_all(&mut engine, 0, None).unwrap(), b"hello world");
        commit(engine).unwrap();

        let mut engine = open(&path, OpenFlags::empty()).unwrap();
        assert_eq!(engine.slot_count(), 2);
        assert_eq!(engine.locate(b"dir/"), Some(1));
        let record = engine.stat(0).unwrap().unwrap();
        assert_eq!(record.size, 11);
        assert_eq!(record.crc32, Some(crc32fast::hash(b"hello world")));
        assert_eq!(read_all(&mut engine, 0, None).unwrap(), b"hello world");
    }

    #[test]
    fn test_skip_clamps() {
        let dir = TempDir::new().unwrap();
        let mut engine = open(&dir.path().join("s.zip"), OpenFlags::CREATE).unwrap();
        engine
            .add(b"x", EntrySource::Bytes(Arc::from(&b"0123456789"[..])))
            .unwrap();
        let mut stream = engine.open_entry(0, None).unwrap();
        assert_eq!(engine.skip(&mut stream, 4).unwrap(), 4);
        let mut buf = [0u8; 3];
        assert_eq!(engine.read(&mut stream, &mut buf).unwrap(), 3);
        assert_eq!(&buf, b"456");
        assert_eq!(engine.skip(&mut stream, 100).unwrap(), 3);
    }

    #[test]
    fn test_stream_bound_at_open() {
        let dir = TempDir::new().unwrap();
        let mut engine = open(&dir.path().join("b.zip"), OpenFlags::CREATE).unwrap();
        engine
            .add(b"a", EntrySource::Bytes(Arc::from(&b"first"[..])))
            .unwrap();
        let mut stream = engine.open_entry(0, None).unwrap();
        engine
            .add(b"a", EntrySource::Bytes(Arc::from(&b"second"[..])))
            .unwrap();
        engine.remove(0).unwrap();

        let mut buf = [0u8; 16];
        let n = engine.read(&mut stream, &mut buf).unwrap();
        assert_eq!(&buf[..n], b"first");
        assert!(engine.open_entry(0, None).is_err());
    }

    #[test]
    fn test_file_source_range() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src.bin");
        fs::write(&src, b"abcdefghij").unwrap();
        let mut engine = open(&dir.path().join("f.zip"), OpenFlags::CREATE).unwrap();
        let idx = engine
            .add(
                b"part",
                EntrySource::File {
                    path: src.clone(),
                    offset: 2,
                    length: Some(5),
                },
            )
            .unwrap();
        assert_eq!(engine.stat(idx).unwrap().unwrap().size, 5);
        assert_eq!(read_all(&mut engine, idx, None).unwrap(), b"cdefg");

        let err = engine
            .add(
                b"bad",
                EntrySource::File {
                    path: src,
                    offset: 8,
                    length: Some(5),
                },
            )
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_removing_everything_deletes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.zip");
        let mut engine = open(&path, OpenFlags::CREATE).unwrap();
        engine
            .add(b"a", EntrySource::Bytes(Arc::from(&b"1"[..])))
            .unwrap();
        commit(engine).unwrap();
        assert!(path.exists());

        let mut engine = open(&path, OpenFlags::empty()).unwrap();
        engine.remove(0).unwrap();
        commit(engine).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_untouched_archive_is_not_rewritten() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("same.zip");
        let mut engine = open(&path, OpenFlags::CREATE).unwrap();
        engine
            .add(b"a", EntrySource::Bytes(Arc::from(&b"1"[..])))
            .unwrap();
        commit(engine).unwrap();
        let before = fs::read(&path).unwrap();

        let engine = open(&path, OpenFlags::empty()).unwrap();
        assert!(!engine.has_changes());
        commit(engine).unwrap();
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_not_an_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("text.zip");
        fs::write(&path, b"definitely not a zip file").unwrap();
        let err = open(&path, OpenFlags::empty()).unwrap_err();
        assert!(matches!(err, Error::Open { reason: OpenFailure::NotAnArchive(_), .. }));
    }
}
