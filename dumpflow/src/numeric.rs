/*!
Numeric attribute decoding.

Index attributes carry numbers either as decimal digits or as `0x` prefixed
hexadecimal strings. Pointers of 64-bit processes are printed with all 16 hex
digits, which do not fit a signed 64-bit parse once the top bit is set, so those
are split into two 32-bit halves and recombined.
*/

use crate::error::{Error, ErrorKind, ErrorOrigin, Result};

/// Number of hex digits that triggers the split-and-shift path.
const SPLIT_HEX_DIGITS: usize = 16;

/// Decodes a numeric attribute value.
///
/// `None` yields `default`. A `0x` prefix selects base 16, everything else is parsed
/// as base 10. Malformed text is an error.
///
/// # Examples
///
/// ```
/// use dumpflow::numeric::decode_long;
///
/// assert_eq!(decode_long(Some("0x10"), 0).unwrap(), 16);
/// assert_eq!(decode_long(Some("42"), 0).unwrap(), 42);
/// assert_eq!(decode_long(None, -1).unwrap(), -1);
/// assert_eq!(decode_long(Some("0xffffffffffffffff"), 0).unwrap(), -1);
/// ```
pub fn decode_long(text: Option<&str>, default: i64) -> Result<i64> {
    let text = match text {
        Some(text) => text.trim(),
        None => return Ok(default),
    };

    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        decode_hex(hex)
    } else {
        text.parse::<i64>().map_err(|err| {
            Error(ErrorOrigin::Numeric, ErrorKind::InvalidNumber)
                .log_debug(format!("`{}`: {}", text, err))
        })
    }
}

fn decode_hex(hex: &str) -> Result<i64> {
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error(ErrorOrigin::Numeric, ErrorKind::InvalidNumber)
            .log_debug(format!("`0x{}` is not a hexadecimal number", hex)));
    }

    if hex.len() == SPLIT_HEX_DIGITS {
        let (high, low) = hex.split_at(SPLIT_HEX_DIGITS / 2);
        let high = parse_u32_hex(high)? as u64;
        let low = parse_u32_hex(low)? as u64;
        Ok(((high << 32) | low) as i64)
    } else {
        i64::from_str_radix(hex, 16).map_err(|err| {
            Error(ErrorOrigin::Numeric, ErrorKind::InvalidNumber)
                .log_debug(format!("`0x{}`: {}", hex, err))
        })
    }
}

fn parse_u32_hex(half: &str) -> Result<u32> {
    u32::from_str_radix(half, 16).map_err(|err| {
        Error(ErrorOrigin::Numeric, ErrorKind::InvalidNumber)
            .log_debug(format!("`{}`: {}", half, err))
    })
}

/// Extracts a `key=value` field from loosely formatted text.
///
/// The key only matches where it starts a token and is directly followed by `=`, so
/// `Signal_Number` does not match inside `J9Generic_Signal_Number` or `Signal_Numbers=1`.
/// The value runs from the `=` to the next whitespace
/// and is always read as hexadecimal. A missing key yields 0.
///
/// # Examples
///
/// ```
/// use dumpflow::numeric::decode_keyed_long;
///
/// let text = "J9Generic_Signal_Number=00000004 Signal_Number=0000000B";
/// assert_eq!(decode_keyed_long(text, "Signal_Number").unwrap(), 0xb);
/// assert_eq!(decode_keyed_long(text, "J9Generic_Signal_Number").unwrap(), 4);
/// assert_eq!(decode_keyed_long(text, "Error_Value").unwrap(), 0);
/// ```
pub fn decode_keyed_long(raw_text: &str, key: &str) -> Result<i64> {
    if key.is_empty() {
        return Ok(0);
    }

    let mut search = 0;
    while let Some(found) = raw_text[search..].find(key) {
        let start = search + found;
        let starts_token = raw_text[..start]
            .chars()
            .next_back()
            .map_or(true, char::is_whitespace);

        if starts_token {
            if let Some(value) = raw_text[start + key.len()..].strip_prefix('=') {
                let end = value.find(char::is_whitespace).unwrap_or(value.len());
                return decode_long(Some(&format!("0x{}", &value[..end])), 0);
            }
        }

        search = start + key.len();
    }

    Ok(0)
}
