//! The archive session.
//!
//! An [`Archive`] owns one [`Engine`] behind an archive-wide mutex. Every
//! method takes `&self`, so a session can be shared between threads (wrap it
//! in an `Arc` or use scoped threads). The lock is held for a single engine
//! call at a time: two threads streaming different entries interleave at
//! read granularity.
//!
//! Modifications are staged and become durable only when the session is
//! closed. A session ends exactly once, either by [`Archive::close`]
//! (commit) or by [`Archive::discard`]; whichever comes first wins and later
//! calls to either are no-ops.
//!
//! # Example
//!
//! ```rust,no_run
//! use zipsession::{Archive, CompressionMethod, OpenFlags};
//!
//! let archive = Archive::open("notes.zip", OpenFlags::CREATE)?;
//! let index = archive.add_bytes("todo.txt", b"write more tests")?;
//! archive.set_compression_method(index, CompressionMethod::Deflate, 9)?;
//! for entry in archive.entries() {
//!     let entry = entry?;
//!     println!("{} ({} bytes)", entry.name(), entry.size());
//! }
//! archive.close()?;
//! # Ok::<(), zipsession::Error>(())
//! ```

mod stream;
mod table;

pub use self::stream::EntryStream;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use self::table::NameTable;
use crate::codec::NameCodec;
use crate::engine::{Engine, EntrySource, ZipEngine};
use crate::entry::Entry;
use crate::method::{CompressionMethod, EncryptionMethod};
use crate::options::{OpenFlags, OpenOptions};
use crate::password::{self, Password};
use crate::progress::{CommitProgress, NoProgress, ProgressListener};
use crate::timestamp::Timestamp;
use crate::{Error, Result, validate};

/// Lifecycle state of an [`Archive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveState {
    /// Accepting queries and modifications.
    Open,
    /// Closed by [`Archive::close`]; staged changes were committed.
    Closed,
    /// Closed by [`Archive::discard`]; staged changes were dropped.
    Discarded,
}

impl fmt::Display for ArchiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveState::Open => write!(f, "open"),
            ArchiveState::Closed => write!(f, "closed"),
            ArchiveState::Discarded => write!(f, "discarded"),
        }
    }
}

/// Acquires the session lock, recovering from poisoned state if necessary.
///
/// Every engine call completes or fails as a unit, so the guarded state is
/// consistent even if a thread panicked while holding the lock.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("archive mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// State shared by a session and the streams it hands out.
pub(crate) struct Shared<E: Engine> {
    inner: Mutex<Inner<E>>,
    path: PathBuf,
    flags: OpenFlags,
    codec: Arc<dyn NameCodec>,
}

impl<E: Engine> Shared<E> {
    fn lock(&self) -> MutexGuard<'_, Inner<E>> {
        lock_or_recover(&self.inner)
    }
}

/// Everything guarded by the session lock.
struct Inner<E: Engine> {
    state: ArchiveState,
    engine: Option<E>,
    default_password: Option<Password>,
    names: NameTable,
    streams: HashMap<u64, E::Stream>,
    next_stream: u64,
}

impl<E: Engine> Inner<E> {
    fn engine(&self) -> Result<&E> {
        match (self.state, self.engine.as_ref()) {
            (ArchiveState::Open, Some(engine)) => Ok(engine),
            _ => Err(Error::Closed),
        }
    }

    fn engine_mut(&mut self) -> Result<&mut E> {
        match (self.state, self.engine.as_mut()) {
            (ArchiveState::Open, Some(engine)) => Ok(engine),
            _ => Err(Error::Closed),
        }
    }

    /// The engine together with the name table.
    fn lookup_parts(&mut self) -> Result<(&mut E, &mut NameTable)> {
        match (self.state, self.engine.as_mut()) {
            (ArchiveState::Open, Some(engine)) => Ok((engine, &mut self.names)),
            _ => Err(Error::Closed),
        }
    }

    /// Ends the session, releasing every stream. Returns the engine if the
    /// session was still open.
    fn finish(&mut self, state: ArchiveState) -> Option<E> {
        if self.state != ArchiveState::Open {
            return None;
        }
        self.state = state;
        self.streams.clear();
        self.names.invalidate();
        self.engine.take()
    }
}

/// A session over one ZIP archive.
///
/// See the [module documentation](self) for the lifecycle and threading
/// model. Dropping a session that is still open discards its staged
/// changes and logs a warning; call [`close`](Self::close) to keep them.
pub struct Archive<E: Engine = ZipEngine> {
    shared: Arc<Shared<E>>,
}

impl Archive<ZipEngine> {
    /// Opens the ZIP archive at `path` with the given flags and default
    /// options.
    pub fn open(path: impl AsRef<Path>, flags: OpenFlags) -> Result<Self> {
        Self::open_with(path, OpenOptions::new().flags(flags))
    }

    /// Opens the ZIP archive at `path` with full options.
    pub fn open_with(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let engine = ZipEngine::open(path.as_ref(), &options)?;
        Ok(Self::with_engine(engine, path.as_ref(), options))
    }
}

impl<E: Engine> Archive<E> {
    /// Starts a session over an already opened engine.
    ///
    /// `path` is only reported back by [`path`](Self::path) and in log
    /// messages.
    pub fn with_engine(mut engine: E, path: impl Into<PathBuf>, options: OpenOptions) -> Self {
        engine.set_default_password(options.default_password.as_ref());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ArchiveState::Open,
                    engine: Some(engine),
                    default_password: options.default_password,
                    names: NameTable::new(options.name_cache),
                    streams: HashMap::new(),
                    next_stream: 0,
                }),
                path: path.into(),
                flags: options.flags,
                codec: options.codec,
            }),
        }
    }

    /// Location of the archive.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Flags the archive was opened with.
    pub fn flags(&self) -> OpenFlags {
        self.shared.flags
    }

    /// Codec used for entry names and the archive comment.
    pub fn codec(&self) -> &dyn NameCodec {
        self.shared.codec.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ArchiveState {
        self.shared.lock().state
    }

    /// Returns true if there are staged changes that [`close`](Self::close)
    /// would write.
    pub fn has_pending_changes(&self) -> Result<bool> {
        Ok(self.shared.lock().engine()?.has_changes())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Iterates over the live entries.
    ///
    /// The iterator is lazy: each step queries the engine, so entries staged
    /// by this thread are visible and removed ones are skipped. Call again to
    /// restart. After the session ends the iterator yields one
    /// [`Error::Closed`] and stops.
    pub fn entries(&self) -> Entries<'_, E> {
        Entries {
            archive: self,
            next: 0,
            done: false,
        }
    }

    /// Looks up an entry by name.
    pub fn entry(&self, name: &str) -> Result<Option<Entry>> {
        let mut inner = self.shared.lock();
        let (engine, names) = inner.lookup_parts()?;
        match names.lookup(&*engine, self.codec(), name)? {
            Some(index) => table::snapshot(&*engine, self.codec(), index),
            None => Ok(None),
        }
    }

    /// Looks up an entry by index.
    ///
    /// Returns `Ok(None)` for a removed slot and
    /// [`Error::InvalidIndex`] outside `0..slot count`.
    pub fn entry_at(&self, index: u64) -> Result<Option<Entry>> {
        let inner = self.shared.lock();
        table::snapshot(inner.engine()?, self.codec(), index)
    }

    /// Index of the entry called `name`.
    pub fn index_of(&self, name: &str) -> Result<Option<u64>> {
        let mut inner = self.shared.lock();
        let (engine, names) = inner.lookup_parts()?;
        names.lookup(&*engine, self.codec(), name)
    }

    /// Returns true if an entry called `name` exists.
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.index_of(name)?.is_some())
    }

    /// Number of live entries.
    pub fn len(&self) -> Result<u64> {
        let inner = self.shared.lock();
        table::live_count(inner.engine()?)
    }

    /// Returns true if the archive has no live entries.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // ------------------------------------------------------------------
    // Modification
    // ------------------------------------------------------------------

    /// Locks the session for a mutation. An ended session reports
    /// [`Error::Closed`] even if it was opened read-only.
    fn lock_writable(&self) -> Result<MutexGuard<'_, Inner<E>>> {
        let inner = self.shared.lock();
        inner.engine()?;
        if self.shared.flags.contains(OpenFlags::READ_ONLY) {
            return Err(Error::ReadOnly);
        }
        Ok(inner)
    }

    fn encode_name(&self, name: &str) -> Result<Vec<u8>> {
        if name.is_empty() {
            return Err(Error::invalid_argument("entry name is empty"));
        }
        self.shared.codec.encode(name)
    }

    fn add_source(&self, name: &str, source: EntrySource) -> Result<u64> {
        let raw = self.encode_name(name)?;
        let mut inner = self.lock_writable()?;
        let (engine, names) = inner.lookup_parts()?;
        let index = engine.add(&raw, source)?;
        names.invalidate();
        log::trace!("staged {} at index {}", name, index);
        Ok(index)
    }

    /// Stages an entry whose content is `length` bytes of the file at
    /// `source`, starting at `offset`. `None` takes everything up to the
    /// end of the file.
    ///
    /// The file is read when the archive is committed (or when the staged
    /// entry is streamed). If an entry called `name` exists, its content is
    /// replaced and its index returned.
    pub fn add_file(
        &self,
        name: &str,
        source: impl AsRef<Path>,
        offset: u64,
        length: Option<u64>,
    ) -> Result<u64> {
        self.add_source(
            name,
            EntrySource::File {
                path: source.as_ref().to_path_buf(),
                offset,
                length,
            },
        )
    }

    /// Stages an entry holding `data`.
    pub fn add_bytes(&self, name: &str, data: &[u8]) -> Result<u64> {
        self.add_source(name, EntrySource::Bytes(Arc::from(data)))
    }

    /// Stages a directory entry. A trailing `/` is appended if missing.
    pub fn add_directory(&self, name: &str) -> Result<u64> {
        if name.ends_with('/') {
            self.add_source(name, EntrySource::Directory)
        } else {
            self.add_source(&format!("{}/", name), EntrySource::Directory)
        }
    }

    /// Renames the entry at `index`.
    ///
    /// Returns `false` if the slot was removed. Fails if another entry
    /// already has `new_name`.
    pub fn rename(&self, index: u64, new_name: &str) -> Result<bool> {
        let raw = self.encode_name(new_name)?;
        let mut inner = self.lock_writable()?;
        let (engine, names) = inner.lookup_parts()?;
        if engine.stat(index)?.is_none() {
            return Ok(false);
        }
        engine.rename(index, &raw)?;
        names.invalidate();
        Ok(true)
    }

    /// Renames the entry `entry` refers to; `false` if it does not exist.
    pub fn rename_entry(&self, entry: &Entry, new_name: &str) -> Result<bool> {
        let raw = self.encode_name(new_name)?;
        let mut inner = self.lock_writable()?;
        let (engine, names) = inner.lookup_parts()?;
        let Some(index) = names.resolve(&*engine, entry)? else {
            return Ok(false);
        };
        engine.rename(index, &raw)?;
        names.invalidate();
        Ok(true)
    }

    /// Removes the entry at `index`; `false` if the slot was already removed.
    pub fn remove(&self, index: u64) -> Result<bool> {
        let mut inner = self.lock_writable()?;
        let (engine, names) = inner.lookup_parts()?;
        if engine.stat(index)?.is_none() {
            return Ok(false);
        }
        engine.remove(index)?;
        names.invalidate();
        Ok(true)
    }

    /// Removes the entry `entry` refers to; `false` if it does not exist.
    pub fn remove_entry(&self, entry: &Entry) -> Result<bool> {
        let mut inner = self.lock_writable()?;
        let (engine, names) = inner.lookup_parts()?;
        let Some(index) = names.resolve(&*engine, entry)? else {
            return Ok(false);
        };
        engine.remove(index)?;
        names.invalidate();
        Ok(true)
    }

    /// Removes the entry called `name`; `false` if there is none.
    pub fn remove_by_name(&self, name: &str) -> Result<bool> {
        let mut inner = self.lock_writable()?;
        let (engine, names) = inner.lookup_parts()?;
        let Some(index) = names.lookup(&*engine, self.codec(), name)? else {
            return Ok(false);
        };
        engine.remove(index)?;
        names.invalidate();
        Ok(true)
    }

    /// Sets how the entry at `index` is compressed on commit.
    ///
    /// `level` ranges over `0..=9`; 0 selects the method's default.
    pub fn set_compression_method(
        &self,
        index: u64,
        method: CompressionMethod,
        level: u32,
    ) -> Result<()> {
        validate::compression(method, level)?;
        self.lock_writable()?
            .engine_mut()?
            .set_compression(index, method, level)
    }

    /// Sets how the entry at `index` is encrypted on commit.
    ///
    /// The password is `password` if given, else the session default. Any
    /// method but [`EncryptionMethod::None`] needs one.
    pub fn set_encryption_method(
        &self,
        index: u64,
        method: EncryptionMethod,
        password: Option<&Password>,
    ) -> Result<()> {
        validate::encryption(method)?;
        if let Some(password) = password {
            if password.is_empty() && method != EncryptionMethod::None {
                return Err(Error::invalid_argument("password is empty"));
            }
        }
        let mut inner = self.lock_writable()?;
        let resolved = password::resolve(password, inner.default_password.as_ref()).cloned();
        validate::encryption_password(method, resolved.as_ref())?;
        inner
            .engine_mut()?
            .set_encryption(index, method, resolved.as_ref())
    }

    /// Sets the modification time of the entry at `index`.
    pub fn set_modified_time(&self, index: u64, time: Timestamp) -> Result<()> {
        self.lock_writable()?.engine_mut()?.set_modified_time(index, time)
    }

    /// Sets or clears the session default password.
    ///
    /// It is used whenever an operation is not given its own password, and
    /// to decode encrypted entries that must be re-encoded on commit.
    pub fn set_default_password(&self, password: Option<Password>) -> Result<()> {
        let mut inner = self.shared.lock();
        inner.engine_mut()?.set_default_password(password.as_ref());
        inner.default_password = password;
        Ok(())
    }

    /// The session default password.
    pub fn default_password(&self) -> Result<Option<Password>> {
        let inner = self.shared.lock();
        inner.engine()?;
        Ok(inner.default_password.clone())
    }

    /// The archive comment, decoded with the session codec.
    pub fn comment(&self) -> Result<String> {
        let raw = self.shared.lock().engine()?.comment();
        Ok(self.shared.codec.decode(&raw))
    }

    /// Sets the archive comment.
    pub fn set_comment(&self, text: &str) -> Result<()> {
        let raw = self.shared.codec.encode(text)?;
        self.lock_writable()?.engine_mut()?.set_comment(&raw)
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    /// Opens `entry` for reading.
    ///
    /// `entry` may come from a lookup or be standalone. The password is
    /// `password` if given, else the session default. A missing or wrong
    /// password is reported by the first read, as
    /// [`Error::WrongPassword`].
    pub fn input_stream(&self, entry: &Entry, password: Option<&Password>) -> Result<EntryStream<E>> {
        let mut inner = self.shared.lock();
        let (engine, names) = inner.lookup_parts()?;
        let index = names
            .resolve(&*engine, entry)?
            .ok_or_else(|| Error::EntryNotFound {
                name: entry.name().to_string(),
            })?;
        let current = table::snapshot(&*engine, self.codec(), index)?.ok_or_else(|| {
            Error::EntryNotFound {
                name: entry.name().to_string(),
            }
        })?;

        let resolved = password::resolve(password, inner.default_password.as_ref()).cloned();
        let stream = inner.engine_mut()?.open_entry(index, resolved.as_ref())?;
        let id = inner.next_stream;
        inner.next_stream += 1;
        inner.streams.insert(id, stream);
        drop(inner);
        log::trace!("opened stream {} for {}", id, current.name());
        Ok(EntryStream::new(Arc::clone(&self.shared), id, current))
    }

    /// Opens the entry called `name` for reading.
    pub fn input_stream_by_name(
        &self,
        name: &str,
        password: Option<&Password>,
    ) -> Result<EntryStream<E>> {
        let entry = self.entry(name)?.ok_or_else(|| Error::EntryNotFound {
            name: name.to_string(),
        })?;
        self.input_stream(&entry, password)
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Commits staged changes and ends the session.
    ///
    /// The engine is released even if the commit fails; the failure is
    /// returned afterwards. Closing an ended session does nothing.
    pub fn close(&self) -> Result<()> {
        self.close_with_progress(&mut NoProgress)
    }

    /// Like [`close`](Self::close), reporting commit progress to `listener`.
    ///
    /// On success the listener sees non-decreasing percentages ending in
    /// exactly one 100.
    pub fn close_with_progress(&self, listener: &mut dyn ProgressListener) -> Result<()> {
        // The lock is released before the commit runs; the session is
        // already closed to every other thread.
        let Some(engine) = self.shared.lock().finish(ArchiveState::Closed) else {
            return Ok(());
        };
        let mut progress = CommitProgress::new(listener);
        match engine.commit(&mut progress) {
            Ok(()) => {
                progress.finish();
                log::debug!("closed {}", self.shared.path.display());
                Ok(())
            }
            Err(e) => {
                log::debug!("commit of {} failed: {}", self.shared.path.display(), e);
                Err(e)
            }
        }
    }

    /// Drops staged changes and ends the session.
    ///
    /// The archive on disk is left as it was. Never reports progress.
    /// Discarding an ended session does nothing.
    pub fn discard(&self) -> Result<()> {
        if let Some(engine) = self.shared.lock().finish(ArchiveState::Discarded) {
            engine.discard();
        }
        Ok(())
    }
}

impl<E: Engine> fmt::Debug for Archive<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("path", &self.shared.path)
            .field("flags", &self.shared.flags)
            .field("codec", &self.shared.codec.label())
            .field("state", &self.state())
            .finish()
    }
}

impl<E: Engine> Drop for Archive<E> {
    fn drop(&mut self) {
        let Some(engine) = self.shared.lock().finish(ArchiveState::Discarded) else {
            return;
        };
        if engine.has_changes() {
            log::warn!(
                "archive {} dropped without close; discarding staged changes",
                self.shared.path.display()
            );
        }
        engine.discard();
    }
}

/// Lazy iterator over the live entries of an [`Archive`].
///
/// Created by [`Archive::entries`].
pub struct Entries<'a, E: Engine = ZipEngine> {
    archive: &'a Archive<E>,
    next: u64,
    done: bool,
}

impl<E: Engine> Iterator for Entries<'_, E> {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let inner = self.archive.shared.lock();
        let engine = match inner.engine() {
            Ok(engine) => engine,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        while self.next < engine.slot_count() {
            let index = self.next;
            self.next += 1;
            match table::snapshot(engine, self.archive.codec(), index) {
                Ok(Some(entry)) => return Some(Ok(entry)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        self.done = true;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_archive_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Archive>();
        assert_send_sync::<Arc<Archive>>();
    }

    #[test]
    fn test_state_transitions() {
        let dir = TempDir::new().unwrap();
        let archive = Archive::open(dir.path().join("s.zip"), OpenFlags::CREATE).unwrap();
        assert_eq!(archive.state(), ArchiveState::Open);
        archive.discard().unwrap();
        assert_eq!(archive.state(), ArchiveState::Discarded);
        archive.close().unwrap();
        assert_eq!(archive.state(), ArchiveState::Discarded);
        assert!(archive.entry("x").unwrap_err().is_closed());
    }

    #[test]
    fn test_entries_after_close_yields_one_error() {
        let dir = TempDir::new().unwrap();
        let archive = Archive::open(dir.path().join("e.zip"), OpenFlags::CREATE).unwrap();
        archive.close().unwrap();
        let mut entries = archive.entries();
        assert!(entries.next().unwrap().unwrap_err().is_closed());
        assert!(entries.next().is_none());
    }

    #[test]
    fn test_add_directory_appends_slash() {
        let dir = TempDir::new().unwrap();
        let archive = Archive::open(dir.path().join("d.zip"), OpenFlags::CREATE).unwrap();
        let index = archive.add_directory("docs").unwrap();
        let entry = archive.entry_at(index).unwrap().unwrap();
        assert_eq!(entry.name(), "docs/");
        assert!(entry.is_directory());
        archive.discard().unwrap();
    }

    #[test]
    fn test_name_cache_follows_renames() {
        let dir = TempDir::new().unwrap();
        let options = OpenOptions::new().name_cache(8);
        let archive = Archive::open_with(dir.path().join("c.zip"), options).unwrap();
        let index = archive.add_bytes("a.txt", b"a").unwrap();
        assert_eq!(archive.index_of("a.txt").unwrap(), Some(index));
        assert!(archive.rename(index, "b.txt").unwrap());
        assert_eq!(archive.index_of("a.txt").unwrap(), None);
        assert_eq!(archive.index_of("b.txt").unwrap(), Some(index));
        archive.discard().unwrap();
    }
}
