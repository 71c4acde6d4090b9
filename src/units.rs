//! Conversion between raw integer amounts and human-readable decimals.

use ethereum_types::U256;

use crate::error::{OrchestratorError, Result};

/// Largest decimals value whose scale `10^decimals` fits in a `U256`.
pub const MAX_DECIMALS: u8 = 77;

/// Formats a raw amount with `decimals` fractional digits, trimming trailing
/// zeros (e.g. `400000` with 6 decimals is `"0.4"`). Works on the decimal
/// digits, so any `decimals` value is accepted.
pub fn format_units(amount: U256, decimals: u8) -> String {
    let digits = amount.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = format!("{:0>width$}", digits, width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{}.{}", whole, fraction)
    }
}

/// Parses a decimal string into a raw amount with `decimals` fractional digits.
///
/// More fractional digits than `decimals` is an error rather than a silent
/// truncation.
pub fn parse_units(value: &str, decimals: u8) -> Result<U256> {
    let value = value.trim();
    let invalid = || OrchestratorError::Validation(format!("invalid decimal amount '{}'", value));

    let (whole, fraction) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if fraction.len() > decimals as usize {
        return Err(OrchestratorError::Validation(format!(
            "amount '{}' has more than {} fractional digits",
            value, decimals
        )));
    }

    let digits = format!(
        "{}{:0<width$}",
        if whole.is_empty() { "0" } else { whole },
        fraction,
        width = decimals as usize
    );
    U256::from_dec_str(&digits).map_err(|_| invalid())
}
