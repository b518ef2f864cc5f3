//! Unit normalization for raw popularity readings, plus artist key slugging.
//!
//! Converts human-readable magnitude strings ("25.4M", "1,234 posts") and
//! already-numeric values into non-negative counts. Anything that cannot be
//! read becomes a missing reading, never zero.

use any_ascii::any_ascii;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::error::ParseError;
use crate::models::{MissingReason, NormalizedMetric, RawMeasurement, RawValue, Reading, Unit};

// ============================================================================
// REGEX PATTERNS
// ============================================================================

/// Number with optional thousands separators, fraction and magnitude suffix
/// (letter or spelled out), followed by digit-free noise such as " posts".
pub static MAGNITUDE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?P<int>[0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)?(?:\.(?P<frac>[0-9]+))?\s*(?:(?P<suffix>thousand|million|billion|[kmb])\b)?(?P<rest>[^0-9]*)$",
    )
    .unwrap()
});

/// Everything that is not an ASCII letter or digit (artist key slugging)
pub static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Check if a character is a Unicode combining mark (diacritical mark).
pub fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1AB0..=0x1AFF | 0x1DC0..=0x1DFF | 0xFE20..=0xFE2F)
}

/// Fold Unicode text to ASCII by applying NFKD decomposition and removing combining marks.
/// e.g., "Beyoncé" → "beyonce", "Motörhead" → "motorhead"
pub fn fold_to_ascii(s: &str) -> String {
    let stripped: String = s.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    // Transliterate any remaining non-ASCII (Cyrillic, CJK, etc.)
    any_ascii(&stripped).to_lowercase()
}

/// Canonical artist slug used as ArtistKey.
/// "Taylor Swift" → "taylorswift", "Simon & Garfunkel" → "simonandgarfunkel"
pub fn artist_slug(name: &str) -> String {
    let folded = fold_to_ascii(&name.replace('&', " and "));
    NON_ALPHANUMERIC.replace_all(&folded, "").into_owned()
}

fn suffix_exponent(suffix: &str) -> u32 {
    match suffix.to_ascii_lowercase().as_str() {
        "k" | "thousand" => 3,
        "m" | "million" => 6,
        "b" | "billion" => 9,
        _ => 0,
    }
}

/// Trailing noise that could hide a magnitude: letters glued to the number
/// ("25.4Mposts", "980views") or a word starting like a suffix ("5 bn", "2 Millions").
fn is_ambiguous_noise(rest: &str) -> bool {
    if rest.starts_with(|c: char| c.is_alphabetic()) {
        return true;
    }
    rest.trim_start()
        .starts_with(|c: char| matches!(c.to_ascii_lowercase(), 'k' | 'm' | 'b'))
}

// ============================================================================
// MAGNITUDE PARSING
// ============================================================================

/// Validate an already-numeric count.
pub fn validate_count(value: f64) -> Result<f64, ParseError> {
    if !value.is_finite() {
        return Err(ParseError::NotFinite);
    }
    if value < 0.0 {
        return Err(ParseError::Negative(value));
    }
    // Collapse -0.0
    Ok(value + 0.0)
}

/// Parse a magnitude string into a count.
///
/// The digits are accumulated as an integer and scaled by a power of ten, so
/// `"25.4M"` is exactly `25_400_000.0` rather than `25.4 * 1e6`.
pub fn parse_magnitude(text: &str) -> Result<f64, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    if let Some(unsigned) = trimmed.strip_prefix('-') {
        return match parse_magnitude(unsigned) {
            Ok(v) if v > 0.0 => Err(ParseError::Negative(-v)),
            Ok(v) => Ok(v),
            Err(_) => Err(ParseError::Unrecognized(text.to_string())),
        };
    }

    let caps = MAGNITUDE_PATTERN
        .captures(trimmed)
        .ok_or_else(|| ParseError::Unrecognized(text.to_string()))?;

    let int_part = caps.name("int").map(|m| m.as_str().replace(',', ""));
    let frac_part = caps.name("frac").map(|m| m.as_str());
    if int_part.is_none() && frac_part.is_none() {
        return Err(ParseError::Unrecognized(text.to_string()));
    }

    let rest = caps.name("rest").map_or("", |m| m.as_str());
    if is_ambiguous_noise(rest) {
        return Err(ParseError::Unrecognized(text.to_string()));
    }

    let exponent = caps.name("suffix").map_or(0, |m| suffix_exponent(m.as_str()));

    let mut digits = int_part.unwrap_or_default();
    let frac_len = frac_part.map_or(0, |f| f.len()) as u32;
    if let Some(f) = frac_part {
        digits.push_str(f);
    }

    let mantissa: u64 = digits
        .parse()
        .map_err(|_| ParseError::OutOfRange(text.to_string()))?;

    if exponent >= frac_len {
        let scale = 10u64
            .checked_pow(exponent - frac_len)
            .ok_or_else(|| ParseError::OutOfRange(text.to_string()))?;
        let count = mantissa
            .checked_mul(scale)
            .ok_or_else(|| ParseError::OutOfRange(text.to_string()))?;
        Ok(count as f64)
    } else {
        // Fractional count, e.g. "1.2345K"; one correctly rounded division
        Ok(mantissa as f64 / 10f64.powi((frac_len - exponent) as i32))
    }
}

/// Parse either form of raw value.
pub fn parse_raw_value(raw: &RawValue) -> Result<f64, ParseError> {
    match raw {
        RawValue::Number(n) => validate_count(*n),
        RawValue::Text(s) => parse_magnitude(s),
    }
}

// ============================================================================
// MEASUREMENT NORMALIZATION
// ============================================================================

/// Normalize one measurement into a present metric or a missing marker.
///
/// Unconfirmed measurements are missing regardless of their raw value.
pub fn normalize_measurement(measurement: &RawMeasurement) -> Reading {
    if !measurement.confirmed {
        debug!(
            artist = %measurement.artist,
            source = %measurement.source,
            "unconfirmed reading treated as missing"
        );
        return Reading::Missing(MissingReason::Unconfirmed);
    }

    let Some(raw) = &measurement.raw_value else {
        return Reading::Missing(MissingReason::NoReading);
    };

    match parse_raw_value(raw) {
        Ok(value) => Reading::Present(NormalizedMetric {
            artist: measurement.artist.clone(),
            source: measurement.source,
            value,
            unit: Unit::Count,
        }),
        Err(e) => {
            warn!(
                artist = %measurement.artist,
                source = %measurement.source,
                raw = %raw,
                error = %e,
                "unparsable reading treated as missing"
            );
            Reading::Missing(MissingReason::Unparsable(e))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
