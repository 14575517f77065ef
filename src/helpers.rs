//! Shared helpers for Decimal ↔ f64 conversions.
//!
//! Predictions come out of the models as f64 while every stored column is a
//! fixed-scale NUMERIC. Two conversion flavours exist:
//!
//! - `f64_to_decimal_dp`: lossy, never fails (non-finite → 0). Used for
//!   coordinates that were already validated.
//! - `try_f64_to_decimal`: strict, returns `None` when the value is non-finite
//!   or does not fit the column's precision. Used for predicted values, where a
//!   failure means "skip this field".

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

/// Convert an f64 to Decimal rounded to `dp` decimal places.
///
/// Returns `Decimal::ZERO` for non-finite inputs.
pub(crate) fn f64_to_decimal_dp(v: f64, dp: u32) -> Decimal {
    if !v.is_finite() {
        tracing::warn!(
            "f64_to_decimal_dp received non-finite value {}, defaulting to 0",
            v
        );
        return Decimal::ZERO;
    }
    Decimal::from_f64(v)
        .map(|d| d.round_dp(dp))
        .unwrap_or_default()
}

/// Convert an f64 to a Decimal that fits a NUMERIC(`precision`, `scale`) column.
///
/// Returns `None` for NaN/±Inf and for values whose integer part needs more
/// than `precision - scale` digits.
pub(crate) fn try_f64_to_decimal(v: f64, precision: u32, scale: u32) -> Option<Decimal> {
    if !v.is_finite() {
        return None;
    }
    let d = Decimal::from_f64(v)?.round_dp(scale);
    let limit = Decimal::from_i128_with_scale(10i128.pow(precision - scale), 0);
    if d.abs() >= limit {
        return None;
    }
    Some(d)
}

/// Convert a Decimal to f64, defaulting to 0.0 for values that can't be represented.
pub(crate) fn dec_to_f64(d: Decimal) -> f64 {
    d.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_f64_to_decimal_dp_rounds() {
        let d = f64_to_decimal_dp(25.6866149, 6);
        assert_eq!(d, Decimal::from_str("25.686615").unwrap());
    }

    #[test]
    fn test_f64_to_decimal_dp_nan() {
        assert_eq!(f64_to_decimal_dp(f64::NAN, 6), Decimal::ZERO);
    }

    #[test]
    fn test_try_f64_to_decimal_normal() {
        assert_eq!(
            try_f64_to_decimal(28.04, 4, 1),
            Some(Decimal::from_str("28.0").unwrap())
        );
    }

    #[test]
    fn test_try_f64_to_decimal_overflow() {
        // NUMERIC(4,1) tops out at 999.9
        assert_eq!(try_f64_to_decimal(1000.0, 4, 1), None);
        assert!(try_f64_to_decimal(999.9, 4, 1).is_some());
    }

    #[test]
    fn test_try_f64_to_decimal_non_finite() {
        assert_eq!(try_f64_to_decimal(f64::NAN, 12, 6), None);
        assert_eq!(try_f64_to_decimal(f64::INFINITY, 12, 6), None);
        assert_eq!(try_f64_to_decimal(f64::NEG_INFINITY, 12, 6), None);
    }

    #[test]
    fn test_try_f64_to_decimal_negative() {
        assert_eq!(
            try_f64_to_decimal(-0.1234567, 12, 6),
            Some(Decimal::from_str("-0.123457").unwrap())
        );
    }

    #[test]
    fn test_dec_to_f64_normal() {
        let d = Decimal::from_str("3.14").unwrap();
        assert!((dec_to_f64(d) - 3.14).abs() < 1e-10);
    }
}
