//! Discount derivation from a printed receipt total
//!
//! The discount is 10% of the first number found in the total text, rounded
//! to cents. Rounding adds `f64::EPSILON` before scaling and then rounds half
//! away from zero, so a product that lands a hair under a half cent because of
//! binary representation (e.g. `0.35 * 0.1`) still rounds up.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Error, Result};

/// Share of the total credited to the running aggregate
pub const DISCOUNT_RATE: f64 = 0.10;

fn number_token() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[+-]?\d+(\.\d+)?").expect("valid regex"))
}

/// Parse the first signed or unsigned decimal number in `total`
///
/// Thousands separators are not understood: `"1,234.56"` parses as `1`.
pub fn parse_total_amount(total: &str) -> Result<f64> {
    let token = number_token()
        .find(total)
        .ok_or_else(|| Error::NoNumericTotal(total.to_string()))?;

    token
        .as_str()
        .parse::<f64>()
        .map_err(|_| Error::NoNumericTotal(total.to_string()))
}

/// Round to two decimal places, half away from zero, after an epsilon nudge
pub fn round_cents(value: f64) -> f64 {
    ((value + f64::EPSILON) * 100.0).round() / 100.0
}

/// Derive the discount for a printed total
///
/// Fails with [`Error::NoNumericTotal`] when the text has no number, with
/// [`Error::NegativeTotal`] when the number is below zero and with
/// [`Error::TotalOutOfRange`] when it is too large to give a finite discount.
pub fn derive_discount(total: &str) -> Result<f64> {
    let amount = parse_total_amount(total)?;
    if amount < 0.0 {
        return Err(Error::NegativeTotal(amount));
    }

    let discount = round_cents(amount * DISCOUNT_RATE);
    if !discount.is_finite() {
        return Err(Error::TotalOutOfRange(total.to_string()));
    }
    Ok(discount)
}
