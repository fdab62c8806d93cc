//! Token amounts in base units (lamports / atomic storage units).

/// Amount in base units.
pub type Amount = u64;

/// Base units in one whole token (9 decimals).
pub const BASE_UNITS_PER_TOKEN: u64 = 1_000_000_000;

/// Convert whole tokens to base units, rounding to the nearest unit.
///
/// Negative and non-finite inputs map to zero.
pub fn to_base_units(tokens: f64) -> Amount {
    if !tokens.is_finite() || tokens <= 0.0 {
        return 0;
    }
    (tokens * BASE_UNITS_PER_TOKEN as f64).round() as Amount
}

/// Convert base units to whole tokens.
pub fn from_base_units(amount: Amount) -> f64 {
    amount as f64 / BASE_UNITS_PER_TOKEN as f64
}

/// Format an amount with 5 decimals, the precision batch reports use.
pub fn format_amount(amount: Amount) -> String {
    format!("{:.5}", from_base_units(amount))
}
