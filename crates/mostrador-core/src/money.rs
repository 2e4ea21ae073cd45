//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every amount in Mostrador is stored as integer cents (centavos).      │
//! │                                                                         │
//! │    0.1 + 0.2 in floating point  = 0.30000000000000004                  │
//! │    10 + 20 cents in i64         = 30                                   │
//! │                                                                         │
//! │  The cut-off (corte) compares expected vs counted cash to the cent,    │
//! │  so rounding drift is not acceptable anywhere in the pipeline.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Overflow
//! Amounts are bounded at the input edge by
//! [`MAX_AMOUNT_CENTS`](crate::MAX_AMOUNT_CENTS), and every operation here is
//! checked: arithmetic that would leave the i64 range returns `None` instead
//! of panicking or wrapping.
//!
//! ## Usage
//! ```rust
//! use mostrador_core::money::Money;
//!
//! let unit = Money::from_cents(2550);                      // $25.50
//! let line = unit.checked_mul_quantity(3).unwrap();        // $76.50
//! assert_eq!(line.cents(), 7650);
//! assert_eq!(Money::from_cents(i64::MAX).checked_mul_quantity(2), None);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::types::TaxRate;

/// A monetary value in the smallest currency unit (cents).
///
/// Signed: refunds and cash differences can be negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies a unit amount by a line quantity.
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    #[inline]
    pub const fn checked_sub(&self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Calculates tax on this amount, rounding half away from zero.
    ///
    /// ## Implementation
    /// Integer math on i128: `(amount * bps ± 5000) / 10000`. `None` when the
    /// result does not fit in i64.
    ///
    /// ## Example
    /// ```rust
    /// use mostrador_core::money::Money;
    /// use mostrador_core::types::TaxRate;
    ///
    /// // $10.03 at 16% = $1.6048 → $1.60
    /// assert_eq!(Money::from_cents(1003).calculate_tax(TaxRate::from_bps(1600)).unwrap().cents(), 160);
    /// // $0.25 at 16% = $0.04 exactly
    /// assert_eq!(Money::from_cents(25).calculate_tax(TaxRate::from_bps(1600)).unwrap().cents(), 4);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Option<Money> {
        let product = self.0 as i128 * rate.bps() as i128;
        let rounded = if product >= 0 {
            (product + 5000) / 10000
        } else {
            (product - 5000) / 10000
        };
        i64::try_from(rounded).ok().map(Money)
    }

    /// Returns `self - other`, or `None` if the result would be negative.
    pub fn checked_sub_non_negative(&self, other: Money) -> Option<Money> {
        self.checked_sub(other).filter(|diff| diff.0 >= 0)
    }
}

/// Formats as `$1,234.56` style without thousands separators: `$1234.56`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}${}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "$10.99");
        assert_eq!(Money::from_cents(5).to_string(), "$0.05");
        assert_eq!(Money::from_cents(-550).to_string(), "-$5.50");
    }

    #[test]
    fn test_tax_rounds_half_up() {
        let tax = |cents: i64, bps: u32| {
            Money::from_cents(cents)
                .calculate_tax(TaxRate::from_bps(bps))
                .unwrap()
                .cents()
        };
        // $0.50 at 1% = 0.5 cents → 1 cent
        assert_eq!(tax(50, 100), 1);
        // $0.49 at 1% = 0.49 cents → 0
        assert_eq!(tax(49, 100), 0);
        // Negative amounts round symmetrically
        assert_eq!(tax(-50, 100), -1);
    }

    #[test]
    fn test_tax_zero_rate() {
        assert!(Money::from_cents(12345)
            .calculate_tax(TaxRate::zero())
            .unwrap()
            .is_zero());
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(
            Money::from_cents(299).checked_mul_quantity(3),
            Some(Money::from_cents(897))
        );
        assert_eq!(
            Money::from_cents(100).checked_add(Money::from_cents(-150)),
            Some(Money::from_cents(-50))
        );
        assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul_quantity(3), None);
        assert_eq!(Money::from_cents(i64::MAX).checked_add(Money::from_cents(1)), None);
        assert_eq!(Money::from_cents(i64::MIN).checked_sub(Money::from_cents(1)), None);
        // 200% of i64::MAX does not fit
        assert_eq!(
            Money::from_cents(i64::MAX).calculate_tax(TaxRate::from_bps(20_000)),
            None
        );
    }

    #[test]
    fn test_checked_sub_non_negative() {
        let a = Money::from_cents(500);
        assert_eq!(a.checked_sub_non_negative(Money::from_cents(200)), Some(Money::from_cents(300)));
        assert_eq!(a.checked_sub_non_negative(Money::from_cents(600)), None);
        assert_eq!(
            Money::from_cents(i64::MAX).checked_sub_non_negative(Money::from_cents(-1)),
            None
        );
    }
}
