//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In floating point:                                                     │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  A commission run touches thousands of amounts; accumulated float      │
//! │  drift shows up as off-by-a-cent rows that never reconcile.            │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    Every amount is carried as i64 cents from the remote ledger         │
//! │    through the commission engine to the output table.                  │
//! │    Decimal conversion happens only at presentation.                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use ledgerline_core::money::Money;
//! use ledgerline_core::rates::Rate;
//!
//! // Create from cents (the remote ledger already speaks minor units)
//! let sales = Money::from_cents(10_000); // $100.00
//!
//! // Apply a commission rate with half-up rounding
//! let commission = sales.apply_rate(Rate::from_bps(4_000)); // 40%
//! assert_eq!(commission.cents(), 4_000); // $40.00
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use crate::rates::Rate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents for USD).
///
/// ## Design Decisions
/// - **i64 (signed)**: refunds, residual tips, and net take can go negative
/// - **Single field tuple struct**: zero-cost abstraction over i64
/// - **Derives**: full serde support for JSON serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps a negative value to zero.
    ///
    /// Over-discounted line items can produce a negative (gross − discount);
    /// sales aggregates treat those lines as zero rather than letting them
    /// eat into the rest of the group.
    #[inline]
    pub const fn clamp_non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Applies a commission rate, rounding half-up to the cent.
    ///
    /// ## Implementation
    /// Integer math throughout: `(cents * bps + 5000) / 10000`. The +5000
    /// term provides half-up rounding (5000/10000 = 0.5). i128 intermediate
    /// prevents overflow on large amounts.
    ///
    /// ## Example
    /// ```rust
    /// use ledgerline_core::money::Money;
    /// use ledgerline_core::rates::Rate;
    ///
    /// let sales = Money::from_cents(5_000);          // $50.00
    /// let commission = sales.apply_rate(Rate::from_bps(1_000)); // 10%
    /// assert_eq!(commission.cents(), 500);           // $5.00
    /// ```
    pub fn apply_rate(&self, rate: Rate) -> Money {
        let cents = (self.0 as i128 * rate.bps() as i128 + 5_000) / 10_000;
        Money::from_cents(cents as i64)
    }

    /// Formats the value as a plain decimal string ("12.34", "-0.50").
    ///
    /// This is the presentation form used by the output table display;
    /// internal storage stays in integer cents.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows money in a human-readable dollar format (debugging only).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}${}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Summation over line-item iterators.
impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_decimal_string() {
        assert_eq!(Money::from_cents(1099).to_decimal_string(), "10.99");
        assert_eq!(Money::from_cents(-50).to_decimal_string(), "-0.50");
        assert_eq!(Money::from_cents(0).to_decimal_string(), "0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((-a).cents(), -1000);
    }

    #[test]
    fn test_sum() {
        let lines = [Money::from_cents(100), Money::from_cents(250), Money::from_cents(-50)];
        let total: Money = lines.into_iter().sum();
        assert_eq!(total.cents(), 300);
    }

    #[test]
    fn test_zero_and_checks() {
        let zero = Money::zero();
        assert!(zero.is_zero());
        assert!(!zero.is_negative());

        let refund = Money::from_cents(-550);
        assert!(!refund.is_zero());
        assert!(refund.is_negative());
    }

    #[test]
    fn test_clamp_non_negative() {
        assert_eq!(Money::from_cents(-550).clamp_non_negative().cents(), 0);
        assert_eq!(Money::from_cents(550).clamp_non_negative().cents(), 550);
    }

    #[test]
    fn test_apply_rate_exact() {
        // $100.00 at 40% = $40.00
        let sales = Money::from_cents(10_000);
        assert_eq!(sales.apply_rate(Rate::from_bps(4_000)).cents(), 4_000);
    }

    #[test]
    fn test_apply_rate_half_up() {
        // $0.05 at 50% = 2.5 cents → rounds half-up to 3 cents
        let amount = Money::from_cents(5);
        assert_eq!(amount.apply_rate(Rate::from_bps(5_000)).cents(), 3);
    }

    #[test]
    fn test_apply_zero_rate() {
        let sales = Money::from_cents(12_345);
        assert_eq!(sales.apply_rate(Rate::zero()).cents(), 0);
    }
}
