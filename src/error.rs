//! Error types for archive sessions.
//!
//! This module provides the [`Error`] enum which represents every failure a
//! session, stream or engine can report, along with a convenient
//! [`Result<T>`] type alias.
//!
//! # Error Handling
//!
//! All fallible operations in this crate return `Result<T, Error>`. Lookup
//! misses are not errors: [`Archive::entry`] returns `Ok(None)` and
//! [`Archive::remove_by_name`] returns `Ok(false)`.
//!
//! ```rust,no_run
//! use zipsession::{Archive, Error, OpenFlags};
//!
//! fn describe(path: &str) -> zipsession::Result<()> {
//!     match Archive::open(path, OpenFlags::READ_ONLY) {
//!         Ok(archive) => {
//!             println!("{} entries", archive.len()?);
//!             archive.close()
//!         }
//!         Err(Error::Open { reason, .. }) => {
//!             eprintln!("Cannot open {}: {}", path, reason);
//!             Ok(())
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```
//!
//! ## Errors Inside `std::io::Read`
//!
//! [`EntryStream`] implements [`std::io::Read`], so its failures travel as
//! [`std::io::Error`]. The original [`Error`] is kept as the inner error and
//! can be recovered with [`Error::downcast_io`]:
//!
//! ```rust
//! use std::io;
//! use zipsession::Error;
//!
//! let io_err: io::Error = Error::Closed.into();
//! assert!(matches!(Error::downcast_io(&io_err), Some(Error::Closed)));
//! ```
//!
//! [`Archive::entry`]: crate::Archive::entry
//! [`Archive::remove_by_name`]: crate::Archive::remove_by_name
//! [`EntryStream`]: crate::EntryStream

use std::fmt;
use std::io;
use std::path::PathBuf;

/// How a wrong password was detected.
///
/// Most archive formats cannot validate a password without running the
/// decryption pipeline, so wrong passwords surface on the first read of an
/// entry stream rather than when the stream is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PasswordDetectionMethod {
    /// The entry is encrypted and no password was supplied or configured.
    PasswordMissing,

    /// The password verification value stored in the entry header did not
    /// match the value derived from the supplied password.
    ///
    /// AES entries carry a two-byte verifier, traditional PKWARE entries a
    /// one-byte check value. This is the cheapest detection path.
    VerificationValue,

    /// Decrypted and decompressed data failed its CRC-32 check.
    CrcMismatch,

    /// The decrypted bytes were rejected by the decompressor.
    DecompressionFailure,
}

impl fmt::Display for PasswordDetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PasswordMissing => write!(f, "no password available"),
            Self::VerificationValue => write!(f, "password verification value mismatch"),
            Self::CrcMismatch => write!(f, "CRC mismatch after decryption"),
            Self::DecompressionFailure => write!(f, "decompression failure"),
        }
    }
}

/// Why an archive could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OpenFailure {
    /// The file does not exist and `CREATE` was not requested.
    NotFound,
    /// The file exists and `EXCLUSIVE` was requested.
    AlreadyExists,
    /// The file exists but is not a readable ZIP archive.
    NotAnArchive(String),
    /// `CHECK_CONSISTENCY` found an entry whose data cannot be located.
    Inconsistent(String),
    /// The flag combination cannot be honoured.
    ConflictingFlags(&'static str),
    /// Any other operating system failure.
    Io(io::ErrorKind),
}

impl fmt::Display for OpenFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "no such file"),
            Self::AlreadyExists => write!(f, "file already exists"),
            Self::NotAnArchive(msg) => write!(f, "not a zip archive ({})", msg),
            Self::Inconsistent(msg) => write!(f, "consistency check failed ({})", msg),
            Self::ConflictingFlags(msg) => write!(f, "conflicting open flags ({})", msg),
            Self::Io(kind) => write!(f, "{}", kind),
        }
    }
}

/// Helper struct for formatting WrongPassword error messages.
struct WrongPasswordDisplay<'a> {
    entry_index: Option<u64>,
    entry_name: Option<&'a str>,
    detection_method: PasswordDetectionMethod,
}

impl fmt::Display for WrongPasswordDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Wrong password")?;
        match (self.entry_index, self.entry_name) {
            (Some(idx), Some(name)) => write!(f, " for entry {} ({})", idx, name)?,
            (Some(idx), None) => write!(f, " for entry {}", idx)?,
            (None, Some(name)) => write!(f, " for entry '{}'", name)?,
            (None, None) => {}
        }
        write!(f, ": {}", self.detection_method)
    }
}

/// The main error type for archive session operations.
///
/// # Error Categories
///
/// | Category | Variants | Typical Cause |
/// |----------|----------|---------------|
/// | Open | [`Open`][Self::Open] | Bad path, flag conflict, not a ZIP |
/// | Lifecycle | [`Closed`][Self::Closed], [`ReadOnly`][Self::ReadOnly] | Use after close/discard, mutation of a read-only session |
/// | Arguments | [`InvalidArgument`][Self::InvalidArgument], [`InvalidIndex`][Self::InvalidIndex], [`InvalidCompressionLevel`][Self::InvalidCompressionLevel], [`PasswordRequired`][Self::PasswordRequired] | Rejected before the engine is touched |
/// | Encryption | [`WrongPassword`][Self::WrongPassword] | Bad or missing password on first read |
/// | Engine | [`Io`][Self::Io], [`InvalidFormat`][Self::InvalidFormat], [`CrcMismatch`][Self::CrcMismatch], [`UnsupportedMethod`][Self::UnsupportedMethod], [`UnsupportedFeature`][Self::UnsupportedFeature], [`Engine`][Self::Engine] | Underlying container or disk failure |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred while reading or writing the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The archive could not be acquired under the requested flags.
    ///
    /// No session is produced when this error is returned.
    #[error("Cannot open archive {}: {reason}", .path.display())]
    Open {
        /// The location that was being opened.
        path: PathBuf,
        /// Why the open failed.
        reason: OpenFailure,
    },

    /// The archive was already closed or discarded, or the stream was
    /// orphaned by closing its archive.
    #[error("Archive is closed")]
    Closed,

    /// A mutation was attempted on a session opened with `READ_ONLY`.
    #[error("Archive was opened read-only")]
    ReadOnly,

    /// A parameter was rejected before reaching the engine.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// An entry index outside `0..count`.
    #[error("Entry index {index} out of range (archive has {count} slots)")]
    InvalidIndex {
        /// The requested index.
        index: u64,
        /// The number of index slots in the archive.
        count: u64,
    },

    /// Compression level outside `0..=9`.
    #[error("Invalid compression level {level}: must be 0-9")]
    InvalidCompressionLevel {
        /// The rejected level.
        level: u32,
    },

    /// An encryption method other than `NONE` was requested but neither a
    /// per-call password nor a session default password is available.
    #[error("Password required: no per-call or default password available")]
    PasswordRequired,

    /// The password is incorrect or missing for an encrypted entry.
    ///
    /// Surfaced on the first read of an entry stream, never when the stream
    /// is opened. Streams over empty entries never decode, so an empty
    /// encrypted entry reads as empty whatever the password.
    #[error("{}", WrongPasswordDisplay { entry_index: *entry_index, entry_name: entry_name.as_deref(), detection_method: *detection_method })]
    WrongPassword {
        /// The entry index where the wrong password was detected (if known).
        entry_index: Option<u64>,
        /// The entry name where the wrong password was detected (if known).
        entry_name: Option<String>,
        /// How the wrong password was detected.
        detection_method: PasswordDetectionMethod,
    },

    /// An operation required an entry that does not exist.
    ///
    /// Plain lookups and removals report misses as `None`/`false` instead.
    #[error("Entry not found: {name}")]
    EntryNotFound {
        /// The name that was looked up.
        name: String,
    },

    /// The archive structure is invalid or corrupt.
    #[error("Invalid ZIP format: {0}")]
    InvalidFormat(String),

    /// The CRC-32 of decoded data does not match the stored value.
    #[error("CRC mismatch for entry {entry_index}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// The entry index with the CRC mismatch.
        entry_index: u64,
        /// The entry name (if known).
        entry_name: Option<String>,
        /// The CRC stored in the archive.
        expected: u32,
        /// The CRC of the decoded data.
        actual: u32,
    },

    /// The entry uses a compression method this build cannot decode or encode.
    #[error("Unsupported method: {method:#x}")]
    UnsupportedMethod {
        /// The ZIP method code.
        method: u16,
    },

    /// The archive uses a feature that is not supported.
    #[error("Unsupported feature: {feature}")]
    UnsupportedFeature {
        /// The name of the unsupported feature.
        feature: &'static str,
    },

    /// Any other failure reported by the archive engine.
    #[error("Archive engine error: {0}")]
    Engine(String),
}

impl Error {
    /// Returns `true` for errors raised by argument validation.
    ///
    /// These are reported before the shared archive is touched and are safe
    /// to retry with corrected arguments.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_)
                | Error::InvalidIndex { .. }
                | Error::InvalidCompressionLevel { .. }
                | Error::PasswordRequired
        )
    }

    /// Returns `true` if the archive (or the stream's archive) is closed.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Closed)
    }

    /// Returns `true` if this is an encryption-related error.
    pub fn is_encryption_error(&self) -> bool {
        matches!(self, Error::WrongPassword { .. } | Error::PasswordRequired)
    }

    /// Returns `true` if this error is related to unsupported features or methods.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            Error::UnsupportedMethod { .. } | Error::UnsupportedFeature { .. }
        )
    }

    /// Returns `true` if this error might be recoverable.
    ///
    /// - `WrongPassword` / `PasswordRequired`: retry with a (different) password
    /// - argument errors: retry with corrected arguments
    /// - `Io` (transient kinds only): `WouldBlock`, `Interrupted`, `TimedOut`
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::WrongPassword { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            e => e.is_invalid_argument(),
        }
    }

    /// Returns the entry index associated with this error, if any.
    pub fn entry_index(&self) -> Option<u64> {
        match self {
            Error::WrongPassword { entry_index, .. } => *entry_index,
            Error::CrcMismatch { entry_index, .. } => Some(*entry_index),
            Error::InvalidIndex { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// Returns the entry name associated with this error, if any.
    pub fn entry_name(&self) -> Option<&str> {
        match self {
            Error::WrongPassword { entry_name, .. } => entry_name.as_deref(),
            Error::CrcMismatch { entry_name, .. } => entry_name.as_deref(),
            Error::EntryNotFound { name } => Some(name.as_str()),
            _ => None,
        }
    }

    /// Creates a WrongPassword error with full context.
    pub fn wrong_password(
        entry_index: Option<u64>,
        entry_name: Option<String>,
        detection_method: PasswordDetectionMethod,
    ) -> Self {
        Error::WrongPassword {
            entry_index,
            entry_name,
            detection_method,
        }
    }

    /// Creates an InvalidArgument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates an Open error.
    pub fn open(path: impl Into<PathBuf>, reason: OpenFailure) -> Self {
        Error::Open {
            path: path.into(),
            reason,
        }
    }

    /// Recovers the crate error carried inside an [`io::Error`] produced by
    /// an [`EntryStream`](crate::EntryStream) read.
    pub fn downcast_io(err: &io::Error) -> Option<&Error> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Error>())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        if let Error::Io(e) = err {
            return e;
        }
        let kind = match &err {
            Error::WrongPassword { .. } | Error::CrcMismatch { .. } | Error::InvalidFormat(_) => {
                io::ErrorKind::InvalidData
            }
            e if e.is_invalid_argument() => io::ErrorKind::InvalidInput,
            Error::EntryNotFound { .. } => io::ErrorKind::NotFound,
            Error::UnsupportedMethod { .. } | Error::UnsupportedFeature { .. } => {
                io::ErrorKind::Unsupported
            }
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// A specialized Result type for archive session operations.
pub type Result<T> = std::result::Result<T, Error>;
