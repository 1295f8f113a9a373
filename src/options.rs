//! Open flags and session options.

use std::fmt;
use std::num::NonZeroUsize;
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use crate::codec::{NameCodec, Utf8Codec};
use crate::password::Password;
use crate::{Error, Result};

/// Bit-combinable open mode flags.
///
/// ```rust
/// use zipsession::OpenFlags;
///
/// let flags = OpenFlags::CREATE | OpenFlags::TRUNCATE;
/// assert!(flags.contains(OpenFlags::TRUNCATE));
/// assert_eq!(flags.bits(), 9);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpenFlags(u32);

impl OpenFlags {
    /// Create the archive if it does not exist.
    pub const CREATE: OpenFlags = OpenFlags(1);
    /// Fail if the archive already exists.
    pub const EXCLUSIVE: OpenFlags = OpenFlags(2);
    /// Validate every entry's header and data bounds on open.
    pub const CHECK_CONSISTENCY: OpenFlags = OpenFlags(4);
    /// Treat existing contents as empty.
    pub const TRUNCATE: OpenFlags = OpenFlags(8);
    /// Reject every mutation.
    pub const READ_ONLY: OpenFlags = OpenFlags(16);

    const ALL: u32 = 31;

    /// No flags: open an existing archive for reading and writing.
    pub const fn empty() -> Self {
        OpenFlags(0)
    }

    /// Parses a raw bit set, rejecting unknown bits.
    pub fn from_bits(bits: u32) -> Result<Self> {
        if bits & !Self::ALL != 0 {
            return Err(Error::invalid_argument(format!(
                "unknown open flag bits {:#x}",
                bits & !Self::ALL
            )));
        }
        Ok(OpenFlags(bits))
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every flag in `other` is set.
    pub const fn contains(self, other: OpenFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for OpenFlags {
    type Output = OpenFlags;

    fn bitor(self, rhs: OpenFlags) -> OpenFlags {
        OpenFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for OpenFlags {
    fn bitor_assign(&mut self, rhs: OpenFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for OpenFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(OpenFlags, &str); 5] = [
            (OpenFlags::CREATE, "CREATE"),
            (OpenFlags::EXCLUSIVE, "EXCLUSIVE"),
            (OpenFlags::CHECK_CONSISTENCY, "CHECK_CONSISTENCY"),
            (OpenFlags::TRUNCATE, "TRUNCATE"),
            (OpenFlags::READ_ONLY, "READ_ONLY"),
        ];
        let set: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if set.is_empty() {
            write!(f, "OpenFlags(empty)")
        } else {
            write!(f, "OpenFlags({})", set.join(" | "))
        }
    }
}

/// Options for opening an [`Archive`](crate::Archive).
///
/// # Example
///
/// ```rust
/// use zipsession::{OpenFlags, OpenOptions, Password};
///
/// let options = OpenOptions::new()
///     .flags(OpenFlags::CREATE | OpenFlags::EXCLUSIVE)
///     .charset("GBK").unwrap()
///     .name_cache(256)
///     .default_password(Password::new("secret"));
/// assert!(options.flags_value().contains(OpenFlags::EXCLUSIVE));
/// ```
#[derive(Clone)]
pub struct OpenOptions {
    pub(crate) flags: OpenFlags,
    pub(crate) codec: Arc<dyn NameCodec>,
    pub(crate) name_cache: Option<NonZeroUsize>,
    pub(crate) default_password: Option<Password>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            flags: OpenFlags::CREATE,
            codec: Arc::new(Utf8Codec),
            name_cache: None,
            default_password: None,
        }
    }
}

impl fmt::Debug for OpenOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenOptions")
            .field("flags", &self.flags)
            .field("codec", &self.codec.label())
            .field("name_cache", &self.name_cache)
            .field("default_password", &self.default_password.is_some())
            .finish()
    }
}

impl OpenOptions {
    /// Creates options with default settings: `CREATE`, UTF-8 names, no cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Sets the name codec.
    pub fn codec(mut self, codec: Arc<dyn NameCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Sets the name codec from a charset label such as `"GBK"`.
    pub fn charset(self, label: &str) -> Result<Self> {
        Ok(self.codec(crate::codec::codec_for_label(Some(label))?))
    }

    /// Enables a name→index cache holding up to `capacity` names.
    ///
    /// A capacity of 0 disables the cache.
    pub fn name_cache(mut self, capacity: usize) -> Self {
        self.name_cache = NonZeroUsize::new(capacity);
        self
    }

    /// Sets the initial session default password.
    pub fn default_password(mut self, password: Password) -> Self {
        self.default_password = Some(password);
        self
    }

    /// Returns the configured flags.
    pub fn flags_value(&self) -> OpenFlags {
        self.flags
    }

    /// Returns the configured codec.
    pub fn codec_value(&self) -> &Arc<dyn NameCodec> {
        &self.codec
    }

    /// Rejects flag combinations that cannot be honoured.
    pub(crate) fn validate_flags(&self) -> std::result::Result<(), &'static str> {
        let flags = self.flags;
        if flags.contains(OpenFlags::READ_ONLY) {
            if flags.contains(OpenFlags::TRUNCATE) {
                return Err("READ_ONLY with TRUNCATE");
            }
            if flags.contains(OpenFlags::CREATE) {
                return Err("READ_ONLY with CREATE");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits() {
        assert_eq!(OpenFlags::CREATE.bits(), 1);
        assert_eq!(OpenFlags::EXCLUSIVE.bits(), 2);
        assert_eq!(OpenFlags::CHECK_CONSISTENCY.bits(), 4);
        assert_eq!(OpenFlags::TRUNCATE.bits(), 8);
        assert_eq!(OpenFlags::READ_ONLY.bits(), 16);
        assert!(OpenFlags::empty().is_empty());
    }

    #[test]
    fn test_from_bits() {
        let flags = OpenFlags::from_bits(1 | 8).unwrap();
        assert!(flags.contains(OpenFlags::CREATE));
        assert!(flags.contains(OpenFlags::TRUNCATE));
        assert!(!flags.contains(OpenFlags::READ_ONLY));
        assert!(OpenFlags::from_bits(32).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_flags_debug() {
        let flags = OpenFlags::CREATE | OpenFlags::READ_ONLY;
        assert_eq!(format!("{:?}", flags), "OpenFlags(CREATE | READ_ONLY)");
        assert_eq!(format!("{:?}", OpenFlags::empty()), "OpenFlags(empty)");
    }

    #[test]
    fn test_conflicting_flags() {
        let options = OpenOptions::new().flags(OpenFlags::READ_ONLY | OpenFlags::TRUNCATE);
        assert!(options.validate_flags().is_err());
        let options = OpenOptions::new().flags(OpenFlags::READ_ONLY);
        assert!(options.validate_flags().is_ok());
        assert!(OpenOptions::new().validate_flags().is_ok());
    }

    #[test]
    fn test_options_builder() {
        let options = OpenOptions::new()
            .name_cache(0)
            .charset("windows-1252")
            .unwrap();
        assert!(options.name_cache.is_none());
        assert_eq!(options.codec_value().label(), "windows-1252");
        let debug = format!("{:?}", options.default_password(Password::new("pw")));
        assert!(!debug.contains("pw\""));
    }
}
