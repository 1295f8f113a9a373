//! Compression and encryption method identifiers.
//!
//! The numeric codes match the ZIP application note and libzip:
//!
//! | Compression | Code | Encryption | Code |
//! |-------------|------|------------|------|
//! | `Default` | -1 | `None` | 0 |
//! | `Store` | 0 | `TradPkware` | 1 |
//! | `Deflate` | 8 | `Aes128` | 0x0101 |
//! | `Bzip2` | 12 | `Aes192` | 0x0102 |
//! | | | `Aes256` | 0x0103 |
//! | | | `Unknown` | 0xFFFF |

use std::fmt;

use crate::{Error, Result};

/// Compression method of an entry.
///
/// `Other` only appears when reading entries written by other tools with a
/// method this crate does not write (LZMA, Zstandard, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CompressionMethod {
    /// Let the engine pick (Deflate when available, otherwise Store).
    #[default]
    Default,
    /// No compression.
    Store,
    /// Deflate.
    Deflate,
    /// BZip2.
    Bzip2,
    /// Any other method code found in an archive.
    Other(u16),
}

impl CompressionMethod {
    /// Code for [`CompressionMethod::Default`].
    pub const DEFAULT_CODE: i32 = -1;
    /// Code for [`CompressionMethod::Store`].
    pub const STORE_CODE: i32 = 0;
    /// Code for [`CompressionMethod::Deflate`].
    pub const DEFLATE_CODE: i32 = 8;
    /// Code for [`CompressionMethod::Bzip2`].
    pub const BZIP2_CODE: i32 = 12;

    /// Parses a method code accepted by
    /// [`Archive::set_compression_method`](crate::Archive::set_compression_method).
    ///
    /// Unknown codes are rejected with [`Error::InvalidArgument`].
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            Self::DEFAULT_CODE => Ok(Self::Default),
            Self::STORE_CODE => Ok(Self::Store),
            Self::DEFLATE_CODE => Ok(Self::Deflate),
            Self::BZIP2_CODE => Ok(Self::Bzip2),
            other => Err(Error::invalid_argument(format!(
                "unknown compression method {}",
                other
            ))),
        }
    }

    /// Maps a method code read from an archive header.
    pub fn from_zip_code(code: u16) -> Self {
        match code {
            0 => Self::Store,
            8 => Self::Deflate,
            12 => Self::Bzip2,
            other => Self::Other(other),
        }
    }

    /// Returns the numeric code.
    pub fn code(&self) -> i32 {
        match self {
            Self::Default => Self::DEFAULT_CODE,
            Self::Store => Self::STORE_CODE,
            Self::Deflate => Self::DEFLATE_CODE,
            Self::Bzip2 => Self::BZIP2_CODE,
            Self::Other(code) => *code as i32,
        }
    }

    /// Returns true if this method can be requested for new entries.
    pub fn is_settable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }

    /// Human-readable method name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Store => "store",
            Self::Deflate => "deflate",
            Self::Bzip2 => "bzip2",
            Self::Other(_) => "other",
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(code) => write!(f, "method {}", code),
            m => f.write_str(m.name()),
        }
    }
}

/// Encryption method of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum EncryptionMethod {
    /// Not encrypted.
    #[default]
    None,
    /// Traditional PKWARE ("ZipCrypto"). Decode-only.
    TradPkware,
    /// WinZip AES with a 128-bit key.
    Aes128,
    /// WinZip AES with a 192-bit key.
    Aes192,
    /// WinZip AES with a 256-bit key.
    Aes256,
    /// Encrypted with a method this crate cannot identify. Read-back only.
    Unknown,
}

impl EncryptionMethod {
    /// Code for [`EncryptionMethod::None`].
    pub const NONE_CODE: u16 = 0;
    /// Code for [`EncryptionMethod::TradPkware`].
    pub const TRAD_PKWARE_CODE: u16 = 1;
    /// Code for [`EncryptionMethod::Aes128`].
    pub const AES_128_CODE: u16 = 0x0101;
    /// Code for [`EncryptionMethod::Aes192`].
    pub const AES_192_CODE: u16 = 0x0102;
    /// Code for [`EncryptionMethod::Aes256`].
    pub const AES_256_CODE: u16 = 0x0103;
    /// Code for [`EncryptionMethod::Unknown`].
    pub const UNKNOWN_CODE: u16 = 0xFFFF;

    /// Parses an encryption method code.
    ///
    /// `UNKNOWN` parses (it is a valid read-back value); whether it may be set
    /// is decided by [`validate::encryption`](crate::validate::encryption).
    pub fn from_code(code: u16) -> Result<Self> {
        match code {
            Self::NONE_CODE => Ok(Self::None),
            Self::TRAD_PKWARE_CODE => Ok(Self::TradPkware),
            Self::AES_128_CODE => Ok(Self::Aes128),
            Self::AES_192_CODE => Ok(Self::Aes192),
            Self::AES_256_CODE => Ok(Self::Aes256),
            Self::UNKNOWN_CODE => Ok(Self::Unknown),
            other => Err(Error::invalid_argument(format!(
                "unknown encryption method {:#06x}",
                other
            ))),
        }
    }

    /// Maps a WinZip AES strength byte (1, 2, 3) to a method.
    pub fn from_aes_strength(strength: u8) -> Self {
        match strength {
            1 => Self::Aes128,
            2 => Self::Aes192,
            3 => Self::Aes256,
            _ => Self::Unknown,
        }
    }

    /// Returns the numeric code.
    pub fn code(&self) -> u16 {
        match self {
            Self::None => Self::NONE_CODE,
            Self::TradPkware => Self::TRAD_PKWARE_CODE,
            Self::Aes128 => Self::AES_128_CODE,
            Self::Aes192 => Self::AES_192_CODE,
            Self::Aes256 => Self::AES_256_CODE,
            Self::Unknown => Self::UNKNOWN_CODE,
        }
    }

    /// Returns true for the WinZip AES variants.
    pub fn is_aes(&self) -> bool {
        matches!(self, Self::Aes128 | Self::Aes192 | Self::Aes256)
    }

    /// Human-readable method name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::TradPkware => "zipcrypto",
            Self::Aes128 => "aes128",
            Self::Aes192 => "aes192",
            Self::Aes256 => "aes256",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
