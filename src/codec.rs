//! Entry name and comment transcoding.
//!
//! ZIP stores names as bytes. Entries flagged with the UTF-8 bit (general
//! purpose flag 11) are always UTF-8; everything else is in whatever code page
//! the writer used. A [`NameCodec`] turns those bytes into strings and back.
//!
//! Name lookups compare encoded bytes, never decoded strings, so a lossy
//! codec cannot make two different entries collide.
//!
//! # Example
//!
//! ```rust
//! use zipsession::codec::{EncodingCodec, NameCodec};
//!
//! let gbk = EncodingCodec::for_label("GBK").unwrap();
//! let raw = gbk.encode("中文.txt").unwrap();
//! assert_eq!(gbk.decode(&raw), "中文.txt");
//! ```

use std::fmt;
use std::sync::Arc;

use encoding_rs::Encoding;

use crate::{Error, Result};

/// General purpose flag bit marking UTF-8 names and comments.
pub const UTF8_FLAG: u16 = 1 << 11;

/// Encodes entry names and comments to bytes and decodes them back.
pub trait NameCodec: Send + Sync + fmt::Debug {
    /// Encodes a name. Fails if the name cannot be represented.
    fn encode(&self, name: &str) -> Result<Vec<u8>>;

    /// Decodes raw bytes. Unmappable sequences become U+FFFD.
    fn decode(&self, raw: &[u8]) -> String;

    /// The WHATWG label of the encoding.
    fn label(&self) -> &str;
}

/// Decodes a header field, honouring the UTF-8 flag.
pub(crate) fn decode_field(codec: &dyn NameCodec, raw: &[u8], flags: u16) -> String {
    if flags & UTF8_FLAG != 0 {
        String::from_utf8_lossy(raw).into_owned()
    } else {
        codec.decode(raw)
    }
}

/// The default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Codec;

impl NameCodec for Utf8Codec {
    fn encode(&self, name: &str) -> Result<Vec<u8>> {
        Ok(name.as_bytes().to_vec())
    }

    fn decode(&self, raw: &[u8]) -> String {
        String::from_utf8_lossy(raw).into_owned()
    }

    fn label(&self) -> &str {
        "utf-8"
    }
}

/// A codec backed by any `encoding_rs` encoding (GBK, Shift_JIS, windows-1252, ...).
#[derive(Clone, Copy)]
pub struct EncodingCodec {
    encoding: &'static Encoding,
}

impl EncodingCodec {
    /// Wraps an encoding.
    ///
    /// UTF-16 encodings are rejected: `encoding_rs` cannot encode into them
    /// and ZIP names are never stored that way.
    pub fn new(encoding: &'static Encoding) -> Result<Self> {
        if encoding.output_encoding() != encoding {
            return Err(Error::invalid_argument(format!(
                "encoding {} cannot be used for entry names",
                encoding.name()
            )));
        }
        Ok(Self { encoding })
    }

    /// Looks up an encoding by WHATWG label (case-insensitive).
    pub fn for_label(label: &str) -> Result<Self> {
        let encoding = Encoding::for_label(label.trim().as_bytes())
            .ok_or_else(|| Error::invalid_argument(format!("unknown charset '{}'", label)))?;
        Self::new(encoding)
    }
}

impl fmt::Debug for EncodingCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EncodingCodec")
            .field(&self.encoding.name())
            .finish()
    }
}

impl NameCodec for EncodingCodec {
    fn encode(&self, name: &str) -> Result<Vec<u8>> {
        let (bytes, _, unmappable) = self.encoding.encode(name);
        if unmappable {
            return Err(Error::invalid_argument(format!(
                "name '{}' cannot be encoded as {}",
                name,
                self.encoding.name()
            )));
        }
        Ok(bytes.into_owned())
    }

    fn decode(&self, raw: &[u8]) -> String {
        let (text, _) = self.encoding.decode_without_bom_handling(raw);
        text.into_owned()
    }

    fn label(&self) -> &str {
        self.encoding.name()
    }
}

/// Returns a shared codec for a charset label; `None` means UTF-8.
pub fn codec_for_label(label: Option<&str>) -> Result<Arc<dyn NameCodec>> {
    match label {
        None => Ok(Arc::new(Utf8Codec)),
        Some(l) if l.eq_ignore_ascii_case("utf-8") || l.eq_ignore_ascii_case("utf8") => {
            Ok(Arc::new(Utf8Codec))
        }
        Some(l) => Ok(Arc::new(EncodingCodec::for_label(l)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_codec() {
        let codec = Utf8Codec;
        assert_eq!(codec.encode("dir/ä.txt").unwrap(), "dir/ä.txt".as_bytes());
        assert_eq!(codec.decode(b"plain"), "plain");
        assert_eq!(codec.decode(&[0x66, 0xFF]), "f\u{FFFD}");
    }

    #[test]
    fn test_gbk_round_trip() {
        let codec = EncodingCodec::for_label("gbk").unwrap();
        let raw = codec.encode("测试").unwrap();
        assert_eq!(raw, vec![0xB2, 0xE2, 0xCA, 0xD4]);
        assert_eq!(codec.decode(&raw), "测试");
        assert_eq!(codec.label(), "GBK");
    }

    #[test]
    fn test_unmappable_name_rejected() {
        let codec = EncodingCodec::for_label("windows-1252").unwrap();
        assert!(codec.encode("café").is_ok());
        assert!(codec.encode("中").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_unknown_and_utf16_labels() {
        assert!(EncodingCodec::for_label("no-such-charset").is_err());
        assert!(EncodingCodec::for_label("utf-16le").is_err());
    }

    #[test]
    fn test_decode_field_honours_utf8_flag() {
        let gbk = EncodingCodec::for_label("GBK").unwrap();
        let utf8 = "测试".as_bytes();
        assert_eq!(decode_field(&gbk, utf8, UTF8_FLAG), "测试");
        assert_ne!(decode_field(&gbk, utf8, 0), "测试");
    }

    #[test]
    fn test_codec_for_label() {
        assert_eq!(codec_for_label(None).unwrap().label(), "utf-8");
        assert_eq!(codec_for_label(Some("UTF8")).unwrap().label(), "utf-8");
        assert_eq!(codec_for_label(Some("shift_jis")).unwrap().label(), "Shift_JIS");
    }
}
