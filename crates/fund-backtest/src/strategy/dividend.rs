//! Dividend Detection
//!
//! Unit net value drops by the distributed amount on a payout day while
//! cumulative net value does not. The gap between their day-over-day moves,
//! scaled by shares held, is the cash dividend.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{BacktestError, Result};
use crate::model::PricePoint;

/// Smallest dividend cash value treated as a real distribution.
///
/// Anything at or below this is rounding noise in the published net values.
/// Raising it hides small payouts; lowering it lets noise through.
pub const DIVIDEND_TOLERANCE: Decimal = dec!(0.0001);

/// A detected dividend and the shares it buys back
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dividend {
    pub cash_value: Decimal,
    pub shares: Decimal,
}

/// Detects dividends between consecutive price points
#[derive(Clone, Copy, Debug)]
pub struct DividendDetector {
    tolerance: Decimal,
}

impl Default for DividendDetector {
    fn default() -> Self {
        Self {
            tolerance: DIVIDEND_TOLERANCE,
        }
    }
}

impl DividendDetector {
    pub const fn with_tolerance(tolerance: Decimal) -> Self {
        Self { tolerance }
    }

    /// Implied dividend cash for `shares_held`, which may be negative or noise.
    /// `None` when it leaves the decimal range.
    pub fn cash_value(
        previous: &PricePoint,
        current: &PricePoint,
        shares_held: Decimal,
    ) -> Option<Decimal> {
        let cumulative_move = current.cumulative_net_value - previous.cumulative_net_value;
        let unit_move = current.unit_net_value - previous.unit_net_value;
        cumulative_move
            .checked_sub(unit_move)
            .and_then(|gap| shares_held.checked_mul(gap))
    }

    /// The dividend reinvested on `current`, if any
    pub fn detect(
        &self,
        previous: &PricePoint,
        current: &PricePoint,
        shares_held: Decimal,
    ) -> Result<Option<Dividend>> {
        let overflow = || BacktestError::OutOfRange { date: current.date };

        let cash_value = Self::cash_value(previous, current, shares_held).ok_or_else(overflow)?;
        if cash_value <= self.tolerance {
            return Ok(None);
        }

        let shares = cash_value
            .checked_div(current.unit_net_value)
            .ok_or_else(overflow)?;
        tracing::debug!(date = %current.date, %cash_value, %shares, "dividend detected");
        Ok(Some(Dividend { cash_value, shares }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_unit_drop_with_flat_cumulative() {
        let previous = PricePoint::new(day(3), dec!(10), dec!(10));
        let current = PricePoint::new(day(4), dec!(9), dec!(10));

        let dividend = DividendDetector::default()
            .detect(&previous, &current, dec!(10))
            .unwrap()
            .unwrap();
        assert_eq!(dividend.cash_value, dec!(10));
        assert_eq!(dividend.shares.round_dp(3), dec!(1.111));
    }

    #[test]
    fn test_no_dividend_when_values_move_together() {
        let previous = PricePoint::new(day(3), dec!(1.20), dec!(2.50));
        let current = PricePoint::new(day(4), dec!(1.25), dec!(2.55));
        assert!(
            DividendDetector::default()
                .detect(&previous, &current, dec!(1000))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_negative_gap_is_ignored() {
        let previous = PricePoint::new(day(3), dec!(1.00), dec!(1.00));
        let current = PricePoint::new(day(4), dec!(1.10), dec!(1.05));
        assert!(DividendDetector::cash_value(&previous, &current, dec!(100)).unwrap() < Decimal::ZERO);
        assert!(
            DividendDetector::default()
                .detect(&previous, &current, dec!(100))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn test_noise_below_tolerance() {
        let previous = PricePoint::new(day(3), dec!(1.0000), dec!(1.0000));
        let current = PricePoint::new(day(4), dec!(1.0000), dec!(1.00001));
        // 1 share * 0.00001 is below the tolerance
        assert!(
            DividendDetector::default()
                .detect(&previous, &current, dec!(1))
                .unwrap()
                .is_none()
        );
        assert!(
            DividendDetector::with_tolerance(Decimal::ZERO)
                .detect(&previous, &current, dec!(1))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_reinvestment_overflow_is_an_error() {
        let previous = PricePoint::new(day(3), dec!(1), dec!(1));
        let current = PricePoint::new(day(4), Decimal::new(1, 20), dec!(1));
        let shares_held = Decimal::from_i128_with_scale(10_i128.pow(12), 0);

        let err = DividendDetector::default()
            .detect(&previous, &current, shares_held)
            .unwrap_err();
        assert!(matches!(err, BacktestError::OutOfRange { date } if date == day(4)));
    }
}
