//! Compact duration strings used by every window and step field.
//!
//! The grammar is deliberately narrow: one run of ASCII digits followed by a
//! single unit character. Stored pipeline definitions depend on it, so compound
//! forms ("1h30m") and fractions are rejected.

use crate::error::DurationError;

/// Seconds per unit character, or `None` for anything outside `s`, `m`, `h`, `d`.
pub fn unit_seconds(unit: char) -> Option<u64> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(3_600),
        'd' => Some(86_400),
        _ => None,
    }
}

/// Parse a duration such as `"15m"` into whole seconds.
pub fn parse_duration(input: &str) -> Result<u64, DurationError> {
    if input.is_empty() {
        return Err(DurationError::Empty);
    }

    let unit = match input.chars().last() {
        Some(c) => c,
        None => return Err(DurationError::Empty),
    };
    if unit.is_ascii_digit() {
        return Err(DurationError::MissingUnit(input.to_string()));
    }
    let multiplier = unit_seconds(unit).ok_or_else(|| DurationError::UnknownUnit {
        input: input.to_string(),
        unit,
    })?;

    let magnitude = &input[..input.len() - unit.len_utf8()];
    if magnitude.is_empty() || !magnitude.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DurationError::InvalidMagnitude(input.to_string()));
    }
    let n: u64 = magnitude
        .parse()
        .map_err(|_| DurationError::Overflow(input.to_string()))?;

    n.checked_mul(multiplier)
        .ok_or_else(|| DurationError::Overflow(input.to_string()))
}

/// Parse a duration straight into a [`chrono::Duration`] for window arithmetic.
pub fn parse_chrono(input: &str) -> Result<chrono::Duration, DurationError> {
    let secs = parse_duration(input)?;
    let secs = i64::try_from(secs).map_err(|_| DurationError::Overflow(input.to_string()))?;
    chrono::Duration::try_seconds(secs).ok_or_else(|| DurationError::Overflow(input.to_string()))
}
