//! Byte decoder for the terminal monitor
//!
//! Maps raw transport bytes to display elements under one of seven radices:
//! - String / Char: text decoded with a [`TextEncoding`]
//! - Bin / Oct / Dec / Hex: one fixed-width token per byte
//! - Unicode: one `U+XXXX` token per decoded character
//!
//! The decoder keeps a small carry per direction so a multi-byte sequence
//! split across two reads decodes exactly as if it had arrived in one.

pub mod numeric;
mod text;

pub use text::{control_mnemonic, BomPolicy, CharStep, TextEncoding, PLACEHOLDER};

use crate::core::line::{ByteStreamElement, Direction, ElementKind, Origin};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Display radix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Radix {
    /// Continuous text
    #[default]
    String,
    /// Text, one character per space-separated token
    Char,
    /// Binary, 8 digits per byte
    Bin,
    /// Octal, 3 digits per byte
    Oct,
    /// Decimal, 3 digits per byte
    Dec,
    /// Hexadecimal, 2 digits per byte
    Hex,
    /// Unicode code points
    Unicode,
}

impl Radix {
    /// All radices in display order
    pub const ALL: [Radix; 7] = [
        Radix::String,
        Radix::Char,
        Radix::Bin,
        Radix::Oct,
        Radix::Dec,
        Radix::Hex,
        Radix::Unicode,
    ];

    /// Whether bytes go through the text encoding first
    pub fn is_text(self) -> bool {
        matches!(self, Self::String | Self::Char | Self::Unicode)
    }

    /// Separator placed between elements of a rendered line
    pub fn separator(self) -> &'static str {
        match self {
            Self::String => "",
            _ => " ",
        }
    }

    /// Token suffix shown when the radix indicator is enabled
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Self::Bin => Some("b"),
            Self::Oct => Some("o"),
            Self::Dec => Some("d"),
            Self::Hex => Some("h"),
            Self::String | Self::Char | Self::Unicode => None,
        }
    }

    /// Lowercase radix name
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Char => "char",
            Self::Bin => "bin",
            Self::Oct => "oct",
            Self::Dec => "dec",
            Self::Hex => "hex",
            Self::Unicode => "unicode",
        }
    }
}

impl fmt::Display for Radix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Radix {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" | "str" | "text" => Ok(Self::String),
            "char" | "chr" => Ok(Self::Char),
            "bin" | "binary" => Ok(Self::Bin),
            "oct" | "octal" => Ok(Self::Oct),
            "dec" | "decimal" => Ok(Self::Dec),
            "hex" | "hexadecimal" => Ok(Self::Hex),
            "unicode" | "uni" => Ok(Self::Unicode),
            _ => Err(CodecError::UnknownRadix(s.to_string())),
        }
    }
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Invalid input format
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Invalid character
    #[error("Invalid character at position {0}: {1}")]
    InvalidCharacter(usize, char),

    /// Encoding name not recognized
    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),

    /// Radix name not recognized
    #[error("Unknown radix: {0}")]
    UnknownRadix(String),
}

/// Display settings of a terminal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Radix used for both directions
    pub radix: Radix,
    /// Use the per-direction overrides below
    pub separate_tx_rx: bool,
    /// Tx radix when `separate_tx_rx` is set
    pub tx_radix: Option<Radix>,
    /// Rx radix when `separate_tx_rx` is set
    pub rx_radix: Option<Radix>,
    /// Text encoding for the text radices and for trigger matching
    pub encoding: TextEncoding,
    /// Byte order mark handling
    pub bom: BomPolicy,
    /// Render control characters as mnemonics such as `<CR>`
    pub replace_control_chars: bool,
    /// Append a radix suffix to numeric tokens
    pub show_radix: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            radix: Radix::String,
            separate_tx_rx: false,
            tx_radix: None,
            rx_radix: None,
            encoding: TextEncoding::Utf8,
            bom: BomPolicy::Strip,
            replace_control_chars: true,
            show_radix: false,
        }
    }
}

impl DisplaySettings {
    /// Effective radix of a direction
    pub fn radix_for(&self, direction: Direction) -> Radix {
        if !self.separate_tx_rx {
            return self.radix;
        }
        let explicit = match direction {
            Direction::Tx => self.tx_radix,
            Direction::Rx => self.rx_radix,
        };
        explicit.unwrap_or(self.radix)
    }
}

#[derive(Debug)]
struct StreamState {
    pending: Vec<u8>,
    pending_origin: Origin,
    at_start: bool,
}

impl Default for StreamState {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            pending_origin: Origin::Remote,
            at_start: true,
        }
    }
}

/// Stateful decoder from raw bytes to [`ByteStreamElement`]s
#[derive(Debug)]
pub struct ByteDecoder {
    settings: DisplaySettings,
    streams: [StreamState; 2],
}

impl ByteDecoder {
    /// Create a decoder for the given display settings
    pub fn new(settings: DisplaySettings) -> Self {
        Self {
            settings,
            streams: Default::default(),
        }
    }

    /// Current display settings
    pub fn settings(&self) -> &DisplaySettings {
        &self.settings
    }

    /// Effective radix of a direction
    pub fn radix(&self, direction: Direction) -> Radix {
        self.settings.radix_for(direction)
    }

    /// Decode the bytes of one transport read
    pub fn decode(
        &mut self,
        direction: Direction,
        origin: Origin,
        raw: &[u8],
        timestamp: DateTime<Local>,
    ) -> Vec<ByteStreamElement> {
        let radix = self.radix(direction);
        if !radix.is_text() {
            return raw
                .iter()
                .map(|&byte| {
                    ByteStreamElement::new(
                        vec![byte],
                        numeric::format_byte(radix, byte, self.settings.show_radix),
                        ElementKind::Data,
                        direction,
                        origin,
                        timestamp,
                    )
                })
                .collect();
        }

        let encoding = self.settings.encoding;
        let state = &mut self.streams[direction.index()];
        let mut buf = std::mem::take(&mut state.pending);
        buf.extend_from_slice(raw);

        let mut pos = 0;
        if state.at_start && !buf.is_empty() {
            if let Some(bom) = encoding.bom() {
                if buf.starts_with(bom) {
                    state.at_start = false;
                    if self.settings.bom == BomPolicy::Strip {
                        pos = bom.len();
                    }
                } else if bom.starts_with(&buf) {
                    state.pending = buf;
                    state.pending_origin = origin;
                    return Vec::new();
                } else {
                    state.at_start = false;
                }
            } else {
                state.at_start = false;
            }
        }

        let mut elements = Vec::with_capacity(buf.len() - pos);
        while pos < buf.len() {
            match encoding.next_char(&buf[pos..]) {
                CharStep::Char(c, len) => {
                    let (text, kind) = self.render_char(radix, c);
                    elements.push(ByteStreamElement::new(
                        buf[pos..pos + len].to_vec(),
                        text,
                        kind,
                        direction,
                        origin,
                        timestamp,
                    ));
                    pos += len;
                }
                CharStep::Invalid(len) => {
                    elements.push(error_element(
                        buf[pos..pos + len].to_vec(),
                        direction,
                        origin,
                        timestamp,
                    ));
                    pos += len;
                }
                CharStep::Incomplete => {
                    let state = &mut self.streams[direction.index()];
                    state.pending = buf[pos..].to_vec();
                    state.pending_origin = origin;
                    break;
                }
            }
        }

        elements
    }

    /// Turn a dangling partial sequence of a direction into an error element
    pub fn flush(
        &mut self,
        direction: Direction,
        timestamp: DateTime<Local>,
    ) -> Option<ByteStreamElement> {
        let state = &mut self.streams[direction.index()];
        if state.pending.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut state.pending);
        Some(error_element(
            bytes,
            direction,
            state.pending_origin,
            timestamp,
        ))
    }

    /// Forget carried bytes and BOM state of both directions
    pub fn reset(&mut self) {
        self.streams = Default::default();
    }

    fn render_char(&self, radix: Radix, c: char) -> (String, ElementKind) {
        let control = c.is_control() || c == '\u{FEFF}';
        let kind = if control {
            ElementKind::Control
        } else {
            ElementKind::Data
        };

        let text = match radix {
            Radix::Unicode => format!("U+{:04X}", u32::from(c)),
            _ if control && self.settings.replace_control_chars => control_mnemonic(c),
            _ => c.to_string(),
        };
        (text, kind)
    }
}

fn error_element(
    bytes: Vec<u8>,
    direction: Direction,
    origin: Origin,
    timestamp: DateTime<Local>,
) -> ByteStreamElement {
    ByteStreamElement::new(
        bytes,
        PLACEHOLDER.to_string(),
        ElementKind::Error,
        direction,
        origin,
        timestamp,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decoder(radix: Radix) -> ByteDecoder {
        ByteDecoder::new(DisplaySettings {
            radix,
            ..Default::default()
        })
    }

    fn texts(elements: &[ByteStreamElement]) -> Vec<&str> {
        elements.iter().map(|e| e.text.as_str()).collect()
    }

    #[test]
    fn test_string_radix_with_mnemonics() {
        let mut dec = decoder(Radix::String);
        let out = dec.decode(Direction::Rx, Origin::Remote, b"OK\r\n", Local::now());
        assert_eq!(texts(&out), vec!["O", "K", "<CR>", "<LF>"]);
        assert_eq!(out[2].kind, ElementKind::Control);
    }

    #[test]
    fn test_numeric_radices() {
        let now = Local::now();
        let out = decoder(Radix::Hex).decode(Direction::Rx, Origin::Remote, &[0x0D, 0xFF], now);
        assert_eq!(texts(&out), vec!["0D", "FF"]);

        let out = decoder(Radix::Bin).decode(Direction::Rx, Origin::Remote, &[3], now);
        assert_eq!(texts(&out), vec!["00000011"]);

        let out = decoder(Radix::Dec).decode(Direction::Tx, Origin::Local, &[42], now);
        assert_eq!(texts(&out), vec!["042"]);
    }

    #[test]
    fn test_unicode_radix() {
        let mut dec = decoder(Radix::Unicode);
        let out = dec.decode(Direction::Rx, Origin::Remote, "Aé".as_bytes(), Local::now());
        assert_eq!(texts(&out), vec!["U+0041", "U+00E9"]);
    }

    #[test]
    fn test_split_multibyte_is_carried() {
        let mut dec = decoder(Radix::String);
        let now = Local::now();
        let bytes = "€".as_bytes();

        assert!(dec.decode(Direction::Rx, Origin::Remote, &bytes[..1], now).is_empty());
        assert!(dec.decode(Direction::Rx, Origin::Remote, &bytes[1..2], now).is_empty());
        let out = dec.decode(Direction::Rx, Origin::Remote, &bytes[2..], now);
        assert_eq!(texts(&out), vec!["€"]);
        assert_eq!(out[0].bytes, bytes);
    }

    #[test]
    fn test_carry_is_per_direction() {
        let mut dec = decoder(Radix::String);
        let now = Local::now();
        let bytes = "é".as_bytes();

        dec.decode(Direction::Rx, Origin::Remote, &bytes[..1], now);
        let tx = dec.decode(Direction::Tx, Origin::Local, b"A", now);
        assert_eq!(texts(&tx), vec!["A"]);
        let rx = dec.decode(Direction::Rx, Origin::Remote, &bytes[1..], now);
        assert_eq!(texts(&rx), vec!["é"]);
    }

    #[test]
    fn test_malformed_input_continues() {
        let mut dec = decoder(Radix::String);
        let out = dec.decode(Direction::Rx, Origin::Remote, b"a\xFF\xE2\x41b", Local::now());
        assert_eq!(texts(&out), vec!["a", "\u{FFFD}", "\u{FFFD}", "A", "b"]);
        assert!(out[1].is_error());
        assert_eq!(out[2].bytes, vec![0xE2]);
    }

    #[test]
    fn test_flush_pending_sequence() {
        let mut dec = decoder(Radix::String);
        let now = Local::now();
        dec.decode(Direction::Rx, Origin::Remote, &[0xE2, 0x82], now);
        let flushed = dec.flush(Direction::Rx, now).unwrap();
        assert!(flushed.is_error());
        assert_eq!(flushed.bytes, vec![0xE2, 0x82]);
        assert!(dec.flush(Direction::Rx, now).is_none());
    }

    #[test]
    fn test_bom_policy() {
        let now = Local::now();
        let input = [0xEF, 0xBB, 0xBF, b'H'];

        let mut strip = decoder(Radix::String);
        let out = strip.decode(Direction::Rx, Origin::Remote, &input, now);
        assert_eq!(texts(&out), vec!["H"]);

        let mut keep = ByteDecoder::new(DisplaySettings {
            bom: BomPolicy::Keep,
            ..Default::default()
        });
        let out = keep.decode(Direction::Rx, Origin::Remote, &input, now);
        assert_eq!(texts(&out), vec!["<U+FEFF>", "H"]);
    }

    #[test]
    fn test_bom_split_across_reads() {
        let mut dec = decoder(Radix::String);
        let now = Local::now();
        assert!(dec.decode(Direction::Rx, Origin::Remote, &[0xEF, 0xBB], now).is_empty());
        let out = dec.decode(Direction::Rx, Origin::Remote, &[0xBF, b'X'], now);
        assert_eq!(texts(&out), vec!["X"]);

        // Only the start of a stream is checked
        let out = dec.decode(Direction::Rx, Origin::Remote, &[0xEF, 0xBB, 0xBF], now);
        assert_eq!(texts(&out), vec!["<U+FEFF>"]);
    }

    #[test]
    fn test_separate_tx_rx_override() {
        let settings = DisplaySettings {
            radix: Radix::String,
            separate_tx_rx: true,
            tx_radix: Some(Radix::Hex),
            rx_radix: None,
            ..Default::default()
        };
        assert_eq!(settings.radix_for(Direction::Tx), Radix::Hex);
        assert_eq!(settings.radix_for(Direction::Rx), Radix::String);

        let shared = DisplaySettings {
            separate_tx_rx: false,
            ..settings
        };
        assert_eq!(shared.radix_for(Direction::Tx), Radix::String);
    }

    #[test]
    fn test_hex_round_trip() {
        let bytes: Vec<u8> = (0..=255).collect();
        let mut dec = decoder(Radix::Hex);
        let out = dec.decode(Direction::Rx, Origin::Remote, &bytes, Local::now());
        let shown = texts(&out).join(" ");
        assert_eq!(numeric::parse_tokens(Radix::Hex, &shown).unwrap(), bytes);
    }

    #[test]
    fn test_radix_names() {
        for radix in Radix::ALL {
            assert_eq!(radix.name().parse::<Radix>().unwrap(), radix);
        }
        assert!("base64".parse::<Radix>().is_err());
    }
}
