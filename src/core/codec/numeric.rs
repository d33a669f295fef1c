//! Fixed-width numeric tokens for the Bin/Oct/Dec/Hex radices

use super::{CodecError, Radix};

/// Format one byte as a fixed-width token of the given numeric radix
///
/// Text radices fall back to hexadecimal.
pub fn format_byte(radix: Radix, byte: u8, show_radix: bool) -> String {
    let token = match radix {
        Radix::Bin => format!("{:08b}", byte),
        Radix::Oct => format!("{:03o}", byte),
        Radix::Dec => format!("{:03}", byte),
        _ => format!("{:02X}", byte),
    };

    match radix.suffix() {
        Some(suffix) if show_radix => format!("{}{}", token, suffix),
        _ => token,
    }
}

/// Parse displayed numeric tokens back into bytes
///
/// Tokens are whitespace separated; a trailing radix suffix (`h`, `d`, `o`,
/// `b`) and, for hex, a `0x` prefix, `,` separators and runs of digit pairs
/// (`0615`) are accepted.
pub fn parse_tokens(radix: Radix, text: &str) -> Result<Vec<u8>, CodecError> {
    let base = match radix {
        Radix::Bin => 2,
        Radix::Oct => 8,
        Radix::Dec => 10,
        Radix::Hex => 16,
        other => {
            return Err(CodecError::InvalidFormat(format!(
                "{} is not a numeric radix",
                other
            )))
        }
    };

    let mut output = Vec::new();

    for raw in text.split(|c: char| c.is_whitespace() || c == ',') {
        if raw.is_empty() {
            continue;
        }

        let mut token = raw;
        if radix == Radix::Hex {
            token = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
        }
        if let Some(suffix) = radix.suffix() {
            token = token
                .strip_suffix(suffix)
                .or_else(|| token.strip_suffix(suffix.to_ascii_uppercase().as_str()))
                .unwrap_or(token);
        }

        // Contiguous hex digit pairs, e.g. "0615"
        if radix == Radix::Hex && token.len() > 2 {
            let bytes = hex::decode(token).map_err(|_| {
                CodecError::InvalidFormat(format!("Invalid {} token: {}", radix, raw))
            })?;
            output.extend(bytes);
            continue;
        }

        let byte = u8::from_str_radix(token, base)
            .map_err(|_| CodecError::InvalidFormat(format!("Invalid {} token: {}", radix, raw)))?;
        output.push(byte);
    }

    Ok(output)
}
