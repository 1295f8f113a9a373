//! # zipsession
//!
//! Session-based read/write access to ZIP archives.
//!
//! An [`Archive`] is one open session over one archive file. Entries can be
//! listed, looked up by name or index, streamed back (optionally decrypting
//! them), added, renamed and removed, and each entry can be given its own
//! compression and encryption method. Modifications are staged and written
//! in one pass when the session is [closed](Archive::close); a session can
//! instead be [discarded](Archive::discard), leaving the file untouched.
//!
//! A session is `Send + Sync` and every method takes `&self`, so several
//! threads can stream entries of the same archive at once.
//!
//! ## Quick Start
//!
//! ### Creating an Archive
//!
//! ```rust,no_run
//! use zipsession::{Archive, CompressionMethod, OpenFlags, Result};
//!
//! fn main() -> Result<()> {
//!     let archive = Archive::open("new.zip", OpenFlags::CREATE)?;
//!
//!     // Add data from memory and from disk
//!     archive.add_bytes("hello.txt", b"Hello, World!")?;
//!     let index = archive.add_file("big.log", "big.log", 0, None)?;
//!     archive.set_compression_method(index, CompressionMethod::Deflate, 9)?;
//!     archive.add_directory("empty")?;
//!
//!     // Nothing is written before close
//!     archive.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ### Reading Entries
//!
//! ```rust,no_run
//! use std::io::Read;
//! use zipsession::{Archive, OpenFlags, Result};
//!
//! fn main() -> Result<()> {
//!     let archive = Archive::open("new.zip", OpenFlags::READ_ONLY)?;
//!     for entry in archive.entries() {
//!         let entry = entry?;
//!         println!("{}: {} bytes", entry.name(), entry.size());
//!     }
//!
//!     if let Some(entry) = archive.entry("hello.txt")? {
//!         let mut text = String::new();
//!         archive.input_stream(&entry, None)?.read_to_string(&mut text)?;
//!         println!("{}", text);
//!     }
//!     archive.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ### Encrypted Entries
//!
//! ```rust,ignore
//! # #[cfg(feature = "aes")]
//! use zipsession::{Archive, EncryptionMethod, OpenFlags, Password, Result};
//!
//! # #[cfg(feature = "aes")]
//! fn main() -> Result<()> {
//!     let archive = Archive::open("secret.zip", OpenFlags::CREATE)?;
//!     let index = archive.add_bytes("secret.txt", b"Secret data")?;
//!     archive.set_encryption_method(
//!         index,
//!         EncryptionMethod::Aes256,
//!         Some(&Password::new("correct horse")),
//!     )?;
//!     archive.close()?;
//!     Ok(())
//! }
//! # #[cfg(not(feature = "aes"))]
//! # fn main() {}
//! ```
//!
//! A missing or wrong password is detected on the first read of a stream
//! and reported as [`Error::WrongPassword`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `deflate` | Yes | Deflate compression |
//! | `bzip2` | Yes | BZip2 compression |
//! | `aes` | Yes | WinZip AES-128/192/256 encryption |
//! | `cli` | No | Command-line interface tool |
//!
//! Stored entries and traditional PKWARE decryption are always available.
//!
//! ## Entry Names
//!
//! Names are encoded with the session's [`NameCodec`](codec::NameCodec),
//! UTF-8 by default. Archives written by legacy tools often use a local code
//! page instead:
//!
//! ```rust,no_run
//! use zipsession::{Archive, OpenFlags, OpenOptions};
//!
//! let options = OpenOptions::new()
//!     .flags(OpenFlags::READ_ONLY)
//!     .charset("GBK")?;
//! let archive = Archive::open_with("legacy.zip", options)?;
//! # Ok::<(), zipsession::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`:
//!
//! ```rust,no_run
//! use zipsession::{Archive, Error, OpenFlags};
//!
//! fn open_archive(path: &str) -> zipsession::Result<()> {
//!     match Archive::open(path, OpenFlags::empty()) {
//!         Ok(archive) => {
//!             println!("Opened archive with {} entries", archive.len()?);
//!             archive.close()
//!         }
//!         Err(Error::Open { reason, .. }) => {
//!             eprintln!("Cannot open {}: {}", path, reason);
//!             Ok(())
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! # fn main() {}
//! ```
//!
//! ## Minimum Supported Rust Version (MSRV)
//!
//! This crate requires **Rust 1.85** or later.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod archive;
pub mod codec;
pub mod engine;
pub mod entry;
pub mod error;
pub mod method;
pub mod options;
pub mod password;
pub mod progress;
pub mod timestamp;
pub mod validate;

pub use archive::{Archive, ArchiveState, Entries, EntryStream};
pub use codec::{EncodingCodec, NameCodec, Utf8Codec};
pub use entry::Entry;
pub use error::{Error, OpenFailure, PasswordDetectionMethod, Result};
pub use method::{CompressionMethod, EncryptionMethod};
pub use options::{OpenFlags, OpenOptions};
pub use password::Password;
pub use progress::{AtomicProgress, NoProgress, ProgressListener, progress_fn};
pub use timestamp::Timestamp;
