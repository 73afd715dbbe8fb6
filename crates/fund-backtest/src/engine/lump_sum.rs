//! Lump-Sum Comparator
//!
//! Values a single upfront investment on the first day of the range through
//! the cumulative net value ratio, which already embeds reinvested dividends.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{SimulationRun, annualized_return_rate, return_rate};
use crate::error::{BacktestError, Result};
use crate::model::{LumpSumPoint, PricePoint};

/// Lump-sum baseline for a fixed principal
#[derive(Clone, Copy, Debug)]
pub struct LumpSumComparator {
    principal: Decimal,
    start_date: NaiveDate,
}

impl LumpSumComparator {
    pub const fn new(principal: Decimal, start_date: NaiveDate) -> Self {
        Self {
            principal,
            start_date,
        }
    }

    /// Principal equal to the run's final total DCA investment
    pub fn sized_to(run: &SimulationRun, start_date: NaiveDate) -> Self {
        Self::new(run.final_state.total_investment, start_date)
    }

    pub const fn principal(&self) -> Decimal {
        self.principal
    }

    /// One valuation per point; the first point is the purchase day
    pub fn project(&self, points: &[PricePoint]) -> Result<Vec<LumpSumPoint>> {
        let Some(base) = points.first().map(|p| p.cumulative_net_value) else {
            return Ok(Vec::new());
        };

        points
            .iter()
            .enumerate()
            .map(|(index, point)| -> Result<LumpSumPoint> {
                let value = self
                    .principal
                    .checked_mul(point.cumulative_net_value)
                    .and_then(|scaled| scaled.checked_div(base))
                    .ok_or(BacktestError::OutOfRange { date: point.date })?;
                let annualized = if index == 0 {
                    Decimal::ZERO
                } else {
                    annualized_return_rate(
                        value,
                        self.principal,
                        (point.date - self.start_date).num_days(),
                    )
                };
                Ok(LumpSumPoint {
                    date: point.date,
                    value,
                    return_rate: return_rate(value, self.principal),
                    annualized_return_rate: annualized,
                })
            })
            .collect()
    }
}
