//! Provide methods and data structures for character encodings.
//!
//! Included documents are read as raw bytes; this module detects their
//! encoding from the byte order mark or the XML declaration and decodes
//! them to UTF-8 with `encoding_rs`.

use std::{borrow::Cow, fmt::Display, str::FromStr};

use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE, WINDOWS_1252};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XmlCharEncoding {
    None,
    UTF8,
    UTF16LE,
    UTF16BE,
    UCS4LE,
    UCS4BE,
    EBCDIC,
    /// Any other encoding known to `encoding_rs`, found by its label.
    Other(&'static Encoding),
}

impl XmlCharEncoding {
    pub fn get_name(&self) -> Option<&'static str> {
        match *self {
            Self::UTF8 => Some("UTF-8"),
            Self::UTF16LE | Self::UTF16BE => Some("UTF-16"),
            Self::UCS4LE | Self::UCS4BE => Some("ISO-10646-UCS-4"),
            Self::EBCDIC => Some("EBCDIC"),
            Self::Other(enc) => Some(enc.name()),
            Self::None => None,
        }
    }

    fn as_encoding_rs(&self) -> Result<&'static Encoding, EncodingError> {
        match *self {
            Self::None | Self::UTF8 => Ok(UTF_8),
            Self::UTF16LE => Ok(UTF_16LE),
            Self::UTF16BE => Ok(UTF_16BE),
            Self::Other(enc) => Ok(enc),
            Self::UCS4LE | Self::UCS4BE | Self::EBCDIC => Err(EncodingError::Other {
                msg: format!("unsupported encoding {}", self.get_name().unwrap_or("?")).into(),
            }),
        }
    }
}

impl FromStr for XmlCharEncoding {
    type Err = EncodingError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let name = name.trim();
        if name.is_empty() {
            return Ok(XmlCharEncoding::None);
        }
        let upper = name.to_uppercase();
        match upper.as_str() {
            "UTF-8" | "UTF8" => Ok(XmlCharEncoding::UTF8),
            // the byte order decides, little endian otherwise
            "UTF-16" | "UTF16" => Ok(XmlCharEncoding::UTF16LE),
            "UTF-16LE" => Ok(XmlCharEncoding::UTF16LE),
            "UTF-16BE" => Ok(XmlCharEncoding::UTF16BE),
            "ISO-10646-UCS-4" | "UCS-4" | "UCS4" => Ok(XmlCharEncoding::UCS4LE),
            // encoding_rs maps these labels to windows-1252
            "ISO-8859-1" | "ISO-LATIN-1" | "LATIN1" => Ok(XmlCharEncoding::Other(WINDOWS_1252)),
            _ => Encoding::for_label(name.as_bytes())
                .map(XmlCharEncoding::Other)
                .ok_or_else(|| EncodingError::Other {
                    msg: format!("unknown encoding '{name}'").into(),
                }),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EncodingError {
    /// Malformed byte sequence is found.
    ///
    /// `offset` is the position of the first byte that could not be decoded.
    Malformed { offset: usize },
    /// Other errors.
    Other { msg: Cow<'static, str> },
}

impl EncodingError {
    pub fn malformed(&self) -> bool {
        matches!(self, EncodingError::Malformed { .. })
    }
}

impl Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Encoding Error: ")?;
        match self {
            Self::Malformed { offset } => write!(f, "Malformed byte sequence at {offset}"),
            Self::Other { msg } => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for EncodingError {}

/// Guess the encoding of a document from its first four bytes.
pub fn detect_encoding(input: &[u8]) -> XmlCharEncoding {
    match input {
        [0x00, 0x00, 0x00, 0x3C, ..] => XmlCharEncoding::UCS4BE,
        [0x3C, 0x00, 0x00, 0x00, ..] => XmlCharEncoding::UCS4LE,
        [0x4C, 0x6F, 0xA7, 0x94, ..] => XmlCharEncoding::EBCDIC,
        [0x3C, 0x3F, 0x78, 0x6D, ..] => XmlCharEncoding::UTF8,
        [0x3C, 0x00, 0x3F, 0x00, ..] => XmlCharEncoding::UTF16LE,
        [0x00, 0x3C, 0x00, 0x3F, ..] => XmlCharEncoding::UTF16BE,
        // UTF-8 BOM
        [0xEF, 0xBB, 0xBF, ..] => XmlCharEncoding::UTF8,
        // UTF-16 BOM (BE)
        [0xFE, 0xFF, ..] => XmlCharEncoding::UTF16BE,
        // UTF-16 BOM (LE)
        [0xFF, 0xFE, ..] => XmlCharEncoding::UTF16LE,
        _ => XmlCharEncoding::None,
    }
}

/// Extract the `encoding` pseudo-attribute of an XML declaration written in
/// an ASCII compatible encoding.
fn declared_encoding(input: &[u8]) -> Option<&str> {
    let input = input.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(input);
    let decl = input.strip_prefix(b"<?xml")?;
    let end = decl.windows(2).position(|w| w == b"?>")?;
    let decl = std::str::from_utf8(&decl[..end]).ok()?;
    let (_, rest) = decl.split_once("encoding")?;
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|&c| c == '"' || c == '\'')?;
    let rest = &rest[1..];
    rest.find(quote).map(|end| &rest[..end])
}

/// Decode a whole document to UTF-8.
///
/// The byte order mark wins over the declared encoding; a document with
/// neither is read as UTF-8. A UTF-8 input without BOM is borrowed.
pub fn decode_document(input: &[u8]) -> Result<Cow<'_, str>, EncodingError> {
    let mut enc = detect_encoding(input);
    if matches!(enc, XmlCharEncoding::None | XmlCharEncoding::UTF8) {
        if let Some(name) = declared_encoding(input) {
            enc = match name.parse::<XmlCharEncoding>()? {
                // a UTF-16 declaration in an ASCII compatible document is a lie
                XmlCharEncoding::UTF16LE | XmlCharEncoding::UTF16BE => XmlCharEncoding::UTF8,
                other => other,
            };
        }
    }

    let encoding = enc.as_encoding_rs()?;
    let (input, encoding) = match Encoding::for_bom(input) {
        Some((bom_encoding, len)) => (&input[len..], bom_encoding),
        None => (input, encoding),
    };
    if encoding == UTF_8 {
        return std::str::from_utf8(input)
            .map(Cow::Borrowed)
            .map_err(|e| EncodingError::Malformed {
                offset: e.valid_up_to(),
            });
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(input)
        .ok_or_else(|| {
            let (_, had_errors) = encoding.decode_without_bom_handling(input);
            debug_assert!(had_errors);
            EncodingError::Other {
                msg: format!("malformed {} byte sequence", encoding.name()).into(),
            }
        })
}
