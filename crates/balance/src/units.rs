//! Fixed-point conversion between base units and display strings.
//!
//! Display strings always carry a fractional part with trailing zeros
//! trimmed: `1000.0`, `0.5`, `12.000001`.

use alloy_primitives::{
    utils::{self, ParseUnits},
    U256,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnitsError {
    #[error("amount is empty")]
    Empty,

    #[error("invalid amount: {0:?}")]
    Invalid(String),

    #[error("too many decimals: {given} given, token has {decimals}")]
    TooManyDecimals { given: usize, decimals: u8 },

    #[error("amount does not fit in 256 bits")]
    Overflow,
}

/// Largest unit exponent `alloy_primitives::utils` accepts.
const MAX_UNIT: u8 = 77;

/// Render `raw` base units with `decimals` fractional digits.
pub fn format_units(raw: U256, decimals: u8) -> String {
    let full = match utils::format_units(raw, decimals) {
        Ok(full) => full,
        // Past the largest unit every 256-bit amount is a pure fraction.
        Err(_) => format!(
            "0.{digits:0>width$}",
            digits = raw.to_string(),
            width = usize::from(decimals)
        ),
    };

    trim_fraction(&full)
}

/// Parse a decimal amount such as `1000`, `0.25` or `.5` into base units.
///
/// Unlike `alloy_primitives::utils::parse_units`, excess fractional digits
/// are an error rather than truncated, and signs or exponents are rejected.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256, UnitsError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(UnitsError::Empty);
    }

    let (whole, fraction) = input.split_once('.').unwrap_or((input, ""));

    let is_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (whole.is_empty() && fraction.is_empty()) || !is_digits(whole) || !is_digits(fraction) {
        return Err(UnitsError::Invalid(input.to_string()));
    }

    if fraction.len() > usize::from(decimals) {
        return Err(UnitsError::TooManyDecimals {
            given: fraction.len(),
            decimals,
        });
    }

    if decimals > MAX_UNIT {
        return parse_wide(whole, fraction, decimals);
    }

    // Only digits reach alloy, so its sole failure left is overflow.
    match utils::parse_units(input, decimals) {
        Ok(ParseUnits::U256(raw)) => Ok(raw),
        Ok(ParseUnits::I256(_)) => Err(UnitsError::Invalid(input.to_string())),
        Err(_) => Err(UnitsError::Overflow),
    }
}

/// `1000.000` -> `1000.0`, `0.2500` -> `0.25`.
fn trim_fraction(full: &str) -> String {
    let Some((whole, fraction)) = full.split_once('.') else {
        return format!("{full}.0");
    };

    let fraction = fraction.trim_end_matches('0');
    let fraction = if fraction.is_empty() { "0" } else { fraction };

    format!("{whole}.{fraction}")
}

fn parse_wide(whole: &str, fraction: &str, decimals: u8) -> Result<U256, UnitsError> {
    let digits = format!("{whole}{fraction}");
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }

    let scale = U256::from(10u64)
        .checked_pow(U256::from(usize::from(decimals) - fraction.len()))
        .ok_or(UnitsError::Overflow)?;

    U256::from_str_radix(digits, 10)
        .ok()
        .and_then(|value| value.checked_mul(scale))
        .ok_or(UnitsError::Overflow)
}
