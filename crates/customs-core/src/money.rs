//! # Money Module
//!
//! The value-type boundary between decimal strings and [`Decimal`].
//!
//! ## Why Decimal Strings?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In binary floating point:                                              │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  Duty is charged on CIF × rate, VAT on a base that already contains    │
//! │  the duty. Float drift compounds through the cascade.                  │
//! │                                                                         │
//! │  OUR SOLUTION: rust_decimal + decimal strings at every boundary        │
//! │    "1050.00" ──► Decimal ──► cascade ──► Decimal ──► "52.5"            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Parse Or Zero
//! Every value entering the engine goes through [`decimal_or_zero`]. Missing,
//! blank, or unparsable input is zero. There is no other ingestion path.
//! A well-formed number too large for [`Decimal`] is also zero, with a
//! warning logged.
//!
//! ```rust
//! use customs_core::money::{decimal_or_zero, to_decimal_string};
//!
//! assert_eq!(to_decimal_string(decimal_or_zero(Some(" 12.50 "))), "12.5");
//! assert!(decimal_or_zero(Some("n/a")).is_zero());
//! assert!(decimal_or_zero(None).is_zero());
//! ```

use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::warn;

/// Parses a decimal string, treating missing or malformed input as zero.
///
/// Accepts plain (`"1234.56"`) and scientific (`"1.2e3"`) notation.
pub fn decimal_or_zero(raw: Option<&str>) -> Decimal {
    let Some(raw) = raw else {
        return Decimal::ZERO;
    };

    let raw = raw.trim();
    if raw.is_empty() {
        return Decimal::ZERO;
    }

    match Decimal::from_str(raw).or_else(|_| Decimal::from_scientific(raw)) {
        Ok(value) => value,
        Err(_) => {
            if is_out_of_range(raw) {
                warn!(value = raw, "Decimal value out of range, reading it as zero");
            }
            Decimal::ZERO
        }
    }
}

/// A finite number that `Decimal` cannot hold.
fn is_out_of_range(raw: &str) -> bool {
    raw.parse::<f64>().is_ok_and(f64::is_finite)
}

/// Serializes a computed value back into its canonical decimal string.
///
/// Trailing zeros are stripped so re-running a calculation writes
/// byte-identical strings.
pub fn to_decimal_string(value: Decimal) -> String {
    value.normalize().to_string()
}

/// `part / whole`, or zero when `whole` is zero.
pub fn ratio(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    part.checked_div(whole).unwrap_or(Decimal::ZERO)
}

/// Item invoice value: `cost × unit_count`, `None` on overflow.
#[inline]
pub fn line_total(cost: Decimal, unit_count: i64) -> Option<Decimal> {
    cost.checked_mul(Decimal::from(unit_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_plain_and_padded() {
        assert_eq!(decimal_or_zero(Some("1050.25")), dec!(1050.25));
        assert_eq!(decimal_or_zero(Some("  0.18\n")), dec!(0.18));
        assert_eq!(decimal_or_zero(Some("-3")), dec!(-3));
    }

    #[test]
    fn test_parse_scientific() {
        assert_eq!(decimal_or_zero(Some("1.5e3")), dec!(1500));
        assert_eq!(decimal_or_zero(Some("2e-2")), dec!(0.02));
    }

    #[test]
    fn test_garbage_is_zero() {
        assert_eq!(decimal_or_zero(None), Decimal::ZERO);
        assert_eq!(decimal_or_zero(Some("")), Decimal::ZERO);
        assert_eq!(decimal_or_zero(Some("   ")), Decimal::ZERO);
        assert_eq!(decimal_or_zero(Some("12,5")), Decimal::ZERO);
        assert_eq!(decimal_or_zero(Some("NaN")), Decimal::ZERO);
    }

    #[test]
    fn test_out_of_range_is_zero() {
        let raw = "1000000000000000000000000000000";
        assert!(is_out_of_range(raw));
        assert_eq!(decimal_or_zero(Some(raw)), Decimal::ZERO);
        assert_eq!(decimal_or_zero(Some("1e40")), Decimal::ZERO);
        assert!(is_out_of_range("1e40"));
    }

    #[test]
    fn test_malformed_is_not_out_of_range() {
        assert!(!is_out_of_range("12,5"));
        assert!(!is_out_of_range("NaN"));
        assert!(!is_out_of_range("inf"));
    }

    #[test]
    fn test_decimal_string_is_normalized() {
        assert_eq!(to_decimal_string(dec!(52.5000)), "52.5");
        assert_eq!(to_decimal_string(dec!(100.00)), "100");
        assert_eq!(to_decimal_string(Decimal::ZERO), "0");
    }

    #[test]
    fn test_ratio_with_zero_whole() {
        assert_eq!(ratio(dec!(1000), dec!(0)), Decimal::ZERO);
        assert_eq!(ratio(dec!(1000), dec!(2000)), dec!(0.5));
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(dec!(12.50), 8), Some(dec!(100.00)));
        assert_eq!(line_total(dec!(3.3), 0), Some(Decimal::ZERO));
    }

    #[test]
    fn test_line_total_overflow() {
        assert_eq!(line_total(Decimal::MAX, 2), None);
        assert_eq!(line_total(dec!(1000000000000000000), i64::MAX), None);
    }
}
