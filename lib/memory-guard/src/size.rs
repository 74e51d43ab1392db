//! Human-readable size parsing.
//!
//! Sizes are an integer optionally followed by a binary unit: `42`, `42KB`, `42 k`, `42MB`. Every unit is a power of
//! 1024, including `KB`.

use std::{num::IntErrorKind, sync::LazyLock};

use regex::Regex;
use snafu::{OptionExt as _, Snafu};

/// Long-form unit names, indexed by their power of 1024.
pub const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Single-letter unit names, indexed by their power of 1024.
pub const SHORT_UNITS: [&str; 6] = ["B", "K", "M", "G", "T", "P"];

const UNIT_BASE: i64 = 1024;

// A digit run followed by a non-empty suffix. The suffix cannot start with a digit, so the digit run is always taken
// in full, and cannot contain a decimal point, so fractional magnitudes never reach the unit lookup.
static SIZE_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([0-9]+)([^0-9.][^.]*)$").unwrap());

/// A size parsing error.
#[derive(Clone, Debug, Eq, PartialEq, Snafu)]
#[snafu(context(suffix(false)))]
pub enum SizeParseError {
    /// The input is neither an integer nor an integer followed by a suffix.
    #[snafu(display("The value \"{}\" is not a human representation of size", input))]
    InvalidFormat {
        /// Original input.
        input: String,
    },

    /// The input has a suffix which is not a known unit.
    #[snafu(display(
        "The unit \"{}\" does not exist for \"{}\". Only available: {}",
        suffix,
        input,
        UNITS.join(", ")
    ))]
    UnknownUnit {
        /// Original input.
        input: String,

        /// The suffix, with surrounding whitespace trimmed.
        suffix: String,
    },

    /// The input describes more bytes than fit in an `i64`.
    #[snafu(display("The value \"{}\" is too large to be represented in bytes", input))]
    TooLarge {
        /// Original input.
        input: String,
    },
}

/// Parses a human representation of size into a number of bytes.
///
/// A plain integer, optionally signed, is returned as-is. Otherwise, the input must be a run of digits followed by a
/// unit from [`UNITS`] or [`SHORT_UNITS`], matched case-insensitively and optionally separated by whitespace.
///
/// # Errors
///
/// - [`SizeParseError::InvalidFormat`] if the input does not start with a digit run, or contains a decimal point
/// - [`SizeParseError::UnknownUnit`] if the suffix is not a known unit
/// - [`SizeParseError::TooLarge`] if the result does not fit in an `i64`
pub fn parse_size(input: &str) -> Result<i64, SizeParseError> {
    match input.parse::<i64>() {
        Ok(bytes) => return Ok(bytes),
        Err(e) if is_overflow(e.kind()) => return TooLarge { input }.fail(),
        Err(_) => {}
    }

    let captures = SIZE_PATTERN.captures(input).context(InvalidFormat { input })?;
    let number = captures[1]
        .parse::<i64>()
        .ok()
        .context(TooLarge { input })?;

    let suffix = captures[2].trim();
    let exponent = unit_exponent(suffix).context(UnknownUnit { input, suffix })?;

    UNIT_BASE
        .checked_pow(exponent)
        .and_then(|multiplier| number.checked_mul(multiplier))
        .context(TooLarge { input })
}

/// Gets the power of 1024 for the given unit, if it is a known unit.
///
/// Long-form names are tried before single-letter names. Matching is case-insensitive.
pub fn unit_exponent(unit: &str) -> Option<u32> {
    let unit = unit.to_ascii_uppercase();
    UNITS
        .iter()
        .position(|candidate| *candidate == unit)
        .or_else(|| SHORT_UNITS.iter().position(|candidate| *candidate == unit))
        .map(|idx| idx as u32)
}

fn is_overflow(kind: &IntErrorKind) -> bool {
    matches!(kind, IntErrorKind::PosOverflow | IntErrorKind::NegOverflow)
}
