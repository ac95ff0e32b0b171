//! Number parsing and result formatting for the command line

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How a read result is printed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Dec,
    Hex,
    /// Hex followed by the decimal value in parentheses
    #[default]
    Both,
}

/// Parse an unsigned number the way C's `strtoull(s, NULL, 0)` does,
/// ignoring `_` separators: `0x` prefix is hex, a leading `0` is octal.
///
/// Returns `None` unless the text starts with a digit. As with `strtoull`,
/// parsing stops at the first character that is not a valid digit.
pub fn parse_number(text: &str) -> Option<u64> {
    let cleaned: String = text.trim().chars().filter(|&c| c != '_').collect();

    if !cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let (digits, radix) = if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        (hex, 16)
    } else if cleaned.len() > 1 && cleaned.starts_with('0') {
        (&cleaned[1..], 8)
    } else {
        (cleaned.as_str(), 10)
    };

    let end = digits
        .find(|c: char| !c.is_digit(radix))
        .unwrap_or(digits.len());
    if end == 0 {
        // "0x" with nothing after it, or "0" followed by junk
        return Some(0);
    }

    u64::from_str_radix(&digits[..end], radix).ok()
}

/// Render a read result
pub fn format_value(value: u64, mode: DisplayMode, wide: bool) -> String {
    let high = (value >> 32) as u32;
    let low = value as u32;

    match mode {
        DisplayMode::Both => {
            if high == 0 {
                format!("0x{:08X} ({})", low, value)
            } else {
                format!("0x{:08X}{:08X} ({})", high, low, value)
            }
        }
        DisplayMode::Hex => {
            if wide {
                format!("{:08X}{:08X}", high, low)
            } else {
                format!("{:08X}", low)
            }
        }
        DisplayMode::Dec => value.to_string(),
    }
}
