//! Portfolio Accumulator
//!
//! Single-fund state machine. Each price point is folded into an explicit
//! [`PortfolioState`] by [`PortfolioAccumulator::step`], which returns the next
//! state together with the emitted row and records.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use super::{SimulationParameters, annualized_return_rate, return_rate};
use crate::error::{BacktestError, Result};
use crate::model::{BacktestRow, InvestmentRecord, PricePoint, PriceSeries};
use crate::strategy::{DividendDetector, InvestmentScheduler};

/// Running totals of one accumulation run
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PortfolioState {
    /// Sum of scheduled purchase amounts only, never dividends
    pub total_investment: Decimal,
    pub total_shares: Decimal,
    pub last_investment_date: Option<NaiveDate>,
    pub previous_point: Option<PricePoint>,
}

impl PortfolioState {
    /// `None` when the holding's value leaves the decimal range
    pub fn current_value(&self, point: &PricePoint) -> Option<Decimal> {
        self.total_shares.checked_mul(point.unit_net_value)
    }

    /// Falls back to the day's unit value while no shares are held
    pub fn average_cost(&self, point: &PricePoint) -> Option<Decimal> {
        if self.total_shares.is_zero() {
            return Some(point.unit_net_value);
        }
        self.total_investment.checked_div(self.total_shares)
    }
}

/// Output of folding one price point
#[derive(Clone, Debug)]
pub struct StepOutcome {
    pub state: PortfolioState,
    pub row: BacktestRow,
    pub records: Vec<InvestmentRecord>,
}

/// Rows, records and the terminal state of one run
#[derive(Clone, Debug, Default)]
pub struct SimulationRun {
    pub rows: Vec<BacktestRow>,
    pub records: Vec<InvestmentRecord>,
    pub final_state: PortfolioState,
}

impl SimulationRun {
    pub fn last_row(&self) -> Option<&BacktestRow> {
        self.rows.last()
    }

    pub fn purchases(&self) -> impl Iterator<Item = &InvestmentRecord> {
        self.records.iter().filter(|r| r.is_purchase())
    }

    pub fn dividends(&self) -> impl Iterator<Item = &InvestmentRecord> {
        self.records.iter().filter(|r| !r.is_purchase())
    }
}

/// Folds a fund's price points into portfolio snapshots
#[derive(Clone, Copy, Debug)]
pub struct PortfolioAccumulator {
    params: SimulationParameters,
    scheduler: InvestmentScheduler,
    detector: DividendDetector,
}

impl PortfolioAccumulator {
    pub fn new(params: SimulationParameters) -> Self {
        Self {
            params,
            scheduler: InvestmentScheduler::new(params.frequency),
            detector: DividendDetector::default(),
        }
    }

    pub const fn with_detector(mut self, detector: DividendDetector) -> Self {
        self.detector = detector;
        self
    }

    pub const fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Fold one point into `state`.
    ///
    /// `is_last` marks the final point of the range, which never triggers a purchase.
    /// Fails with [`BacktestError::OutOfRange`] when shares, value or totals
    /// overflow the decimal range.
    pub fn step(
        &self,
        mut state: PortfolioState,
        point: &PricePoint,
        is_last: bool,
    ) -> Result<StepOutcome> {
        let overflow = || BacktestError::OutOfRange { date: point.date };
        let mut records = Vec::new();
        let is_first = state.previous_point.is_none();

        if !is_last && self.scheduler.should_invest(point.date, state.last_investment_date) {
            let amount = self.params.investment_amount;
            let shares = amount.checked_div(point.unit_net_value).ok_or_else(overflow)?;
            state.total_investment = state.total_investment.checked_add(amount).ok_or_else(overflow)?;
            state.total_shares = state.total_shares.checked_add(shares).ok_or_else(overflow)?;
            state.last_investment_date = Some(point.date);
            records.push(InvestmentRecord::purchase(point, amount, shares));
        }

        let dividend = match state.previous_point.as_ref() {
            Some(previous) if state.total_shares > Decimal::ZERO => {
                self.detector.detect(previous, point, state.total_shares)?
            }
            _ => None,
        };
        if let Some(dividend) = dividend {
            state.total_shares = state
                .total_shares
                .checked_add(dividend.shares)
                .ok_or_else(overflow)?;
            records.push(InvestmentRecord::dividend(
                point,
                dividend.cash_value,
                dividend.shares,
            ));
        }

        let current_value = state.current_value(point).ok_or_else(overflow)?;
        let annualized = if is_first {
            Decimal::ZERO
        } else {
            annualized_return_rate(
                current_value,
                state.total_investment,
                self.params.days_since_start(point.date),
            )
        };

        let row = BacktestRow {
            date: point.date,
            unit_price: point.unit_net_value,
            cumulative_price: point.cumulative_net_value,
            total_investment: state.total_investment,
            total_shares: state.total_shares,
            average_cost: state.average_cost(point).ok_or_else(overflow)?,
            current_value,
            return_rate: return_rate(current_value, state.total_investment),
            annualized_return_rate: annualized,
            lump_sum: None,
        };

        state.previous_point = Some(point.clone());

        Ok(StepOutcome {
            state,
            row,
            records,
        })
    }

    /// Run over points already restricted to the parameter range, in date order
    pub fn run(&self, points: &[PricePoint]) -> Result<SimulationRun> {
        let last_index = points.len().saturating_sub(1);
        let mut run = SimulationRun::default();

        for (index, point) in points.iter().enumerate() {
            let state = std::mem::take(&mut run.final_state);
            let outcome = self.step(state, point, index == last_index)?;
            run.rows.push(outcome.row);
            run.records.extend(outcome.records);
            run.final_state = outcome.state;
        }

        tracing::debug!(
            points = points.len(),
            records = run.records.len(),
            total_investment = %run.final_state.total_investment,
            "accumulation finished"
        );
        Ok(run)
    }

    /// Restrict `series` to the parameter range and run
    pub fn run_series(&self, series: &PriceSeries) -> Result<SimulationRun> {
        self.run(series.in_range(self.params.start_date, self.params.end_date))
    }
}
