//! Text encodings for the String/Char/Unicode radices

use super::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Replacement glyph for malformed input
pub const PLACEHOLDER: char = '\u{FFFD}';

/// Text encoding type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextEncoding {
    /// UTF-8 encoding
    #[default]
    #[serde(rename = "utf-8")]
    Utf8,
    /// ASCII (7-bit)
    #[serde(rename = "ascii")]
    Ascii,
    /// Latin-1 (ISO-8859-1)
    #[serde(rename = "latin-1")]
    Latin1,
    /// UTF-16, little endian
    #[serde(rename = "utf-16le")]
    Utf16Le,
    /// UTF-16, big endian
    #[serde(rename = "utf-16be")]
    Utf16Be,
}

/// What to do with a byte order mark at the start of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BomPolicy {
    /// Drop the BOM
    #[default]
    Strip,
    /// Show the BOM as U+FEFF
    Keep,
}

/// Result of decoding one character from the front of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharStep {
    /// A character and the number of bytes it used
    Char(char, usize),
    /// The given number of leading bytes are malformed
    Invalid(usize),
    /// The buffer ends inside a valid but unfinished sequence
    Incomplete,
}

impl TextEncoding {
    /// Byte order mark, for encodings that have one
    pub fn bom(self) -> Option<&'static [u8]> {
        match self {
            Self::Utf8 => Some(&[0xEF, 0xBB, 0xBF]),
            Self::Utf16Le => Some(&[0xFF, 0xFE]),
            Self::Utf16Be => Some(&[0xFE, 0xFF]),
            Self::Ascii | Self::Latin1 => None,
        }
    }

    /// Bytes per code unit
    pub fn unit_len(self) -> usize {
        match self {
            Self::Utf16Le | Self::Utf16Be => 2,
            Self::Utf8 | Self::Ascii | Self::Latin1 => 1,
        }
    }

    /// Decode the first character of `buf`
    ///
    /// `buf` must not be empty.
    pub fn next_char(self, buf: &[u8]) -> CharStep {
        match self {
            Self::Ascii => {
                if buf[0].is_ascii() {
                    CharStep::Char(char::from(buf[0]), 1)
                } else {
                    CharStep::Invalid(1)
                }
            }
            Self::Latin1 => CharStep::Char(char::from(buf[0]), 1),
            Self::Utf8 => next_utf8(buf),
            Self::Utf16Le => next_utf16(buf, u16::from_le_bytes),
            Self::Utf16Be => next_utf16(buf, u16::from_be_bytes),
        }
    }

    /// Decode a complete buffer, replacing malformed input with [`PLACEHOLDER`]
    pub fn decode_lossy(self, bytes: &[u8]) -> String {
        let mut output = String::with_capacity(bytes.len());
        let mut pos = 0;

        while pos < bytes.len() {
            match self.next_char(&bytes[pos..]) {
                CharStep::Char(c, len) => {
                    output.push(c);
                    pos += len;
                }
                CharStep::Invalid(len) => {
                    output.push(PLACEHOLDER);
                    pos += len;
                }
                CharStep::Incomplete => {
                    output.push(PLACEHOLDER);
                    break;
                }
            }
        }

        output
    }

    /// Encode text; characters the encoding cannot represent become `?`
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            Self::Utf8 => text.as_bytes().to_vec(),
            Self::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
            Self::Latin1 => text
                .chars()
                .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
                .collect(),
            Self::Utf16Le => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            Self::Utf16Be => text.encode_utf16().flat_map(u16::to_be_bytes).collect(),
        }
    }

    /// Encode text that may contain escape sequences
    ///
    /// Supported escapes: `\r`, `\n`, `\t`, `\0`, `\e` (ESC), `\\` and `\xNN`
    /// (a raw byte, inserted as-is regardless of the encoding).
    pub fn encode_escaped(self, text: &str) -> Result<Vec<u8>, CodecError> {
        let mut output = Vec::with_capacity(text.len());
        let mut literal = String::new();
        let mut chars = text.chars().enumerate();

        while let Some((pos, c)) = chars.next() {
            if c != '\\' {
                literal.push(c);
                continue;
            }

            let escaped = match chars.next() {
                Some((_, 'r')) => '\r',
                Some((_, 'n')) => '\n',
                Some((_, 't')) => '\t',
                Some((_, '0')) => '\0',
                Some((_, 'e')) => '\x1b',
                Some((_, '\\')) => '\\',
                Some((_, 'x')) => {
                    let digits: String = chars.by_ref().take(2).map(|(_, d)| d).collect();
                    if digits.len() != 2 {
                        return Err(CodecError::InvalidFormat(
                            "Incomplete hex sequence".to_string(),
                        ));
                    }
                    let byte = u8::from_str_radix(&digits, 16).map_err(|_| {
                        CodecError::InvalidFormat(format!("Invalid hex sequence: \\x{}", digits))
                    })?;
                    output.extend(self.encode(&literal));
                    literal.clear();
                    output.push(byte);
                    continue;
                }
                Some((_, other)) => return Err(CodecError::InvalidCharacter(pos + 1, other)),
                None => '\\',
            };
            literal.push(escaped);
        }

        output.extend(self.encode(&literal));
        Ok(output)
    }

    /// Canonical encoding name
    pub fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
            Self::Utf16Le => "utf-16le",
            Self::Utf16Be => "utf-16be",
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TextEncoding {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            "utf-16le" | "utf-16" | "utf16le" => Ok(Self::Utf16Le),
            "utf-16be" | "utf16be" => Ok(Self::Utf16Be),
            _ => Err(CodecError::UnknownEncoding(s.to_string())),
        }
    }
}

fn next_utf8(buf: &[u8]) -> CharStep {
    let lead = buf[0];
    let width = match lead {
        0x00..=0x7F => return CharStep::Char(char::from(lead), 1),
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => return CharStep::Invalid(1),
    };

    for k in 1..width {
        let Some(&byte) = buf.get(k) else {
            return CharStep::Incomplete;
        };
        let valid = match (k, lead) {
            (1, 0xE0) => (0xA0..=0xBF).contains(&byte),
            (1, 0xED) => (0x80..=0x9F).contains(&byte),
            (1, 0xF0) => (0x90..=0xBF).contains(&byte),
            (1, 0xF4) => (0x80..=0x8F).contains(&byte),
            _ => (0x80..=0xBF).contains(&byte),
        };
        if !valid {
            return CharStep::Invalid(k);
        }
    }

    match std::str::from_utf8(&buf[..width]) {
        Ok(s) => s
            .chars()
            .next()
            .map_or(CharStep::Invalid(width), |c| CharStep::Char(c, width)),
        Err(_) => CharStep::Invalid(1),
    }
}

fn next_utf16(buf: &[u8], unit: fn([u8; 2]) -> u16) -> CharStep {
    if buf.len() < 2 {
        return CharStep::Incomplete;
    }
    let first = unit([buf[0], buf[1]]);

    match first {
        0xD800..=0xDBFF => {
            if buf.len() < 4 {
                return CharStep::Incomplete;
            }
            let second = unit([buf[2], buf[3]]);
            if !(0xDC00..=0xDFFF).contains(&second) {
                return CharStep::Invalid(2);
            }
            let code = 0x10000 + ((u32::from(first) - 0xD800) << 10) + (u32::from(second) - 0xDC00);
            char::from_u32(code).map_or(CharStep::Invalid(4), |c| CharStep::Char(c, 4))
        }
        0xDC00..=0xDFFF => CharStep::Invalid(2),
        _ => char::from_u32(u32::from(first)).map_or(CharStep::Invalid(2), |c| CharStep::Char(c, 2)),
    }
}

/// Mnemonic for a control character, e.g. `<CR>`
pub fn control_mnemonic(c: char) -> String {
    const C0: [&str; 32] = [
        "NUL", "SOH", "STX", "ETX", "EOT", "ENQ", "ACK", "BEL", "BS", "TAB", "LF", "VT", "FF",
        "CR", "SO", "SI", "DLE", "DC1", "DC2", "DC3", "DC4", "NAK", "SYN", "ETB", "CAN", "EM",
        "SUB", "ESC", "FS", "GS", "RS", "US",
    ];

    let code = u32::from(c);
    match code {
        0x00..=0x1F => format!("<{}>", C0[code as usize]),
        0x7F => "<DEL>".to_string(),
        _ => format!("<U+{:04X}>", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_multibyte() {
        assert_eq!(TextEncoding::Utf8.next_char("é".as_bytes()), CharStep::Char('é', 2));
        assert_eq!(TextEncoding::Utf8.next_char(&[0xE2, 0x82]), CharStep::Incomplete);
        assert_eq!(TextEncoding::Utf8.next_char(&[0xE2, 0x41]), CharStep::Invalid(1));
        assert_eq!(TextEncoding::Utf8.next_char(&[0xFF]), CharStep::Invalid(1));
    }

    #[test]
    fn test_utf16_surrogates() {
        let bytes = TextEncoding::Utf16Le.encode("😀");
        assert_eq!(bytes.len(), 4);
        assert_eq!(TextEncoding::Utf16Le.next_char(&bytes), CharStep::Char('😀', 4));
        assert_eq!(TextEncoding::Utf16Le.next_char(&bytes[..3]), CharStep::Incomplete);
        assert_eq!(TextEncoding::Utf16Be.next_char(&[0xDC, 0x00]), CharStep::Invalid(2));
    }

    #[test]
    fn test_decode_lossy_replaces_errors() {
        assert_eq!(TextEncoding::Utf8.decode_lossy(b"ab\xFFcd"), "ab\u{FFFD}cd");
        assert_eq!(TextEncoding::Ascii.decode_lossy(&[0x41, 0xC0]), "A\u{FFFD}");
        assert_eq!(TextEncoding::Latin1.decode_lossy(&[0xE9]), "é");
    }

    #[test]
    fn test_encode_escaped() {
        let bytes = TextEncoding::Utf8.encode_escaped("PONG\\r\\n").unwrap();
        assert_eq!(bytes, b"PONG\r\n");

        let bytes = TextEncoding::Utf8.encode_escaped("\\x00\\xffA").unwrap();
        assert_eq!(bytes, vec![0x00, 0xFF, b'A']);

        let bytes = TextEncoding::Utf16Le.encode_escaped("\\r\\n").unwrap();
        assert_eq!(bytes, vec![0x0D, 0x00, 0x0A, 0x00]);
    }

    #[test]
    fn test_encode_escaped_rejects_bad_sequences() {
        assert!(TextEncoding::Utf8.encode_escaped("\\x4").is_err());
        assert!(TextEncoding::Utf8.encode_escaped("\\q").is_err());
    }

    #[test]
    fn test_encoding_names() {
        assert_eq!("UTF-8".parse::<TextEncoding>().unwrap(), TextEncoding::Utf8);
        assert_eq!("iso-8859-1".parse::<TextEncoding>().unwrap(), TextEncoding::Latin1);
        assert!(matches!(
            "ebcdic".parse::<TextEncoding>(),
            Err(CodecError::UnknownEncoding(_))
        ));
    }

    #[test]
    fn test_control_mnemonic() {
        assert_eq!(control_mnemonic('\r'), "<CR>");
        assert_eq!(control_mnemonic('\x07'), "<BEL>");
        assert_eq!(control_mnemonic('\x7f'), "<DEL>");
    }
}
