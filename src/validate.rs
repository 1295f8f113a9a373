//! Parameter validation for compression and encryption settings.
//!
//! Everything here is pure: no I/O and no locking. Session methods call these
//! before taking the archive lock, so a rejected argument never reaches the
//! engine.

use crate::method::{CompressionMethod, EncryptionMethod};
use crate::password::Password;
use crate::{Error, Result};

/// Highest accepted compression level.
pub const MAX_COMPRESSION_LEVEL: u32 = 9;

/// Validates a compression method and level for a set operation.
///
/// Level 0 means "engine default" for compressing methods and is ignored for
/// `Store`.
pub fn compression(method: CompressionMethod, level: u32) -> Result<()> {
    if level > MAX_COMPRESSION_LEVEL {
        return Err(Error::InvalidCompressionLevel { level });
    }
    if !method.is_settable() {
        return Err(Error::invalid_argument(format!(
            "compression {} cannot be set on entries",
            method
        )));
    }
    Ok(())
}

/// Parses and validates a raw compression method code and level.
pub fn compression_code(code: i32, level: u32) -> Result<CompressionMethod> {
    let method = CompressionMethod::from_code(code)?;
    compression(method, level)?;
    Ok(method)
}

/// Validates an encryption method for a set operation.
///
/// `Unknown` is only ever a read-back value, and traditional PKWARE is
/// decode-only.
pub fn encryption(method: EncryptionMethod) -> Result<()> {
    match method {
        EncryptionMethod::Unknown => Err(Error::invalid_argument(
            "encryption method UNKNOWN is read-only",
        )),
        EncryptionMethod::TradPkware => Err(Error::invalid_argument(
            "traditional PKWARE encryption is decode-only",
        )),
        _ => Ok(()),
    }
}

/// Validates that an encrypting method has a password to work with.
///
/// `password` is the already resolved password (per-call or default).
pub fn encryption_password(method: EncryptionMethod, password: Option<&Password>) -> Result<()> {
    match (method, password) {
        (EncryptionMethod::None, _) => Ok(()),
        (_, Some(p)) if !p.is_empty() => Ok(()),
        (_, Some(_)) => Err(Error::invalid_argument("encryption password is empty")),
        (_, None) => Err(Error::PasswordRequired),
    }
}
