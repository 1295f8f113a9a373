//! Password handling for ZIP encryption.
//!
//! [`Password`] keeps its bytes in zeroizing storage. [`resolve`] implements
//! the lookup order used by every encrypting or decrypting session call:
//! per-call override, then the session default, then nothing.

use zeroize::Zeroizing;

/// A password for entry encryption/decryption.
///
/// The password is wiped from memory when dropped and never shown in
/// `Debug` output.
#[derive(Clone)]
pub struct Password {
    inner: Zeroizing<String>,
}

impl Password {
    /// Creates a new password from a string.
    pub fn new<S: Into<String>>(password: S) -> Self {
        Self {
            inner: Zeroizing::new(password.into()),
        }
    }

    /// Returns the password as a string slice.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Returns the password bytes as fed to the ZIP key derivation.
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Returns true if the password is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the length of the password in characters.
    pub fn len(&self) -> usize {
        self.inner.chars().count()
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for Password {}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl From<&str> for Password {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Password {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Picks the password for one operation.
///
/// Returns `per_call` when given, otherwise the session `default`, otherwise
/// `None`. Absence is valid for unencrypted entries.
pub fn resolve<'a>(
    per_call: Option<&'a Password>,
    default: Option<&'a Password>,
) -> Option<&'a Password> {
    per_call.or(default)
}
