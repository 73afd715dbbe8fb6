//! Backtest Engine
//!
//! Pure, synchronous simulation over already-fetched price series.
//!
//! ```text
//! PriceSeries ──▶ InvestmentScheduler ─┐
//!             ──▶ DividendDetector ────┼──▶ PortfolioAccumulator ──▶ rows ──▶ StatsSummarizer
//!                                      │            │
//!                                      │    LumpSumComparator (single)
//!                                      └──▶ MultiFundAggregator (N accumulators, merged by date)
//! ```

mod accumulator;
mod lump_sum;
mod multi;
mod stats;

pub use accumulator::{PortfolioAccumulator, PortfolioState, SimulationRun, StepOutcome};
pub use lump_sum::LumpSumComparator;
pub use multi::{FundOutcome, MultiFundAggregator, MultiFundRun, NOMINAL_UNIT};
pub use stats::{
    BacktestSummary, FundSummary, LumpSumSummary, MultiFundSummary, StatsSummarizer,
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};
use crate::model::{BacktestRow, InvestmentRecord, MultiFundRow, PriceSeries};
use crate::strategy::Frequency;

/// Decimal places kept for annualized rates computed through `f64`
const ANNUALIZED_DP: u32 = 6;

const DAYS_PER_YEAR: f64 = 365.0;

/// Validated inputs shared by every fund of a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub investment_amount: Decimal,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl SimulationParameters {
    pub fn new(
        investment_amount: Decimal,
        frequency: Frequency,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Self> {
        if investment_amount <= Decimal::ZERO {
            return Err(BacktestError::NonPositiveAmount(investment_amount));
        }
        if start_date > end_date {
            return Err(BacktestError::InvalidDateRange {
                start: start_date,
                end: end_date,
            });
        }

        Ok(Self {
            investment_amount,
            frequency,
            start_date,
            end_date,
        })
    }

    /// Days from the start of the range to `date`
    pub fn days_since_start(&self, date: NaiveDate) -> i64 {
        (date - self.start_date).num_days()
    }
}

/// Profit over principal in percent, `0` when nothing is invested or the
/// ratio leaves the decimal range
pub fn return_rate(current_value: Decimal, invested: Decimal) -> Decimal {
    if invested <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    current_value
        .checked_sub(invested)
        .and_then(|profit| profit.checked_div(invested))
        .and_then(|ratio| ratio.checked_mul(dec!(100)))
        .unwrap_or(Decimal::ZERO)
}

/// Compound annual growth rate in percent: `((1 + r)^(365 / days) - 1) * 100`.
///
/// Returns `0` for no principal, `days <= 0`, or a non-finite / out-of-range result.
pub fn annualized_return_rate(current_value: Decimal, invested: Decimal, days: i64) -> Decimal {
    if invested <= Decimal::ZERO || days <= 0 {
        return Decimal::ZERO;
    }

    let Some(growth) = current_value.checked_div(invested).and_then(|g| g.to_f64()) else {
        return Decimal::ZERO;
    };

    #[allow(clippy::cast_precision_loss)]
    let rate = (growth.powf(DAYS_PER_YEAR / days as f64) - 1.0) * 100.0;
    if !rate.is_finite() {
        return Decimal::ZERO;
    }

    Decimal::from_f64(rate).map_or(Decimal::ZERO, |r| r.round_dp(ANNUALIZED_DP))
}

/// Result of a single-fund backtest
#[derive(Clone, Debug)]
pub struct SingleBacktest {
    /// Chronological, each row carrying its lump-sum comparison
    pub rows: Vec<BacktestRow>,

    /// Chronological
    pub records: Vec<InvestmentRecord>,

    pub summary: BacktestSummary,
}

/// Result of a multi-fund backtest
#[derive(Clone, Debug)]
pub struct MultiBacktest {
    pub rows: Vec<MultiFundRow>,

    /// Chronological, empty for lump-sum comparisons
    pub records: Vec<InvestmentRecord>,

    pub summary: MultiFundSummary,
}

/// DCA over one fund, compared against a lump sum of equal total principal
pub fn backtest_single(series: &PriceSeries, params: &SimulationParameters) -> Result<SingleBacktest> {
    let points = series.in_range(params.start_date, params.end_date);
    if points.is_empty() {
        return Err(BacktestError::NoDataInRange {
            fund: series.code().to_string(),
            start: params.start_date,
            end: params.end_date,
        });
    }

    let run = PortfolioAccumulator::new(*params).run(points)?;
    let lump_sum = LumpSumComparator::sized_to(&run, params.start_date).project(points)?;
    let summary = StatsSummarizer::single(&run, &lump_sum);

    let SimulationRun { mut rows, records, .. } = run;
    for (row, lump) in rows.iter_mut().zip(lump_sum) {
        row.lump_sum = Some(lump);
    }

    tracing::info!(
        fund = series.code(),
        frequency = %params.frequency,
        rows = rows.len(),
        purchases = summary.purchase_count,
        profit_rate = %summary.profit_rate,
        "single-fund backtest complete"
    );

    Ok(SingleBacktest {
        rows,
        records,
        summary,
    })
}

/// Independent DCA per fund, merged by date
pub fn backtest_multi_dca(funds: &[PriceSeries], params: &SimulationParameters) -> Result<MultiBacktest> {
    let run = MultiFundAggregator::new(*params).run_dca(funds)?;
    finish_multi(run, params, "multi-dca")
}

/// Independent lump sum of [`NOMINAL_UNIT`] per fund, merged by date
pub fn backtest_multi_lump_sum(
    funds: &[PriceSeries],
    params: &SimulationParameters,
) -> Result<MultiBacktest> {
    let run = MultiFundAggregator::new(*params).run_lump_sum(funds)?;
    finish_multi(run, params, "multi-lumpsum")
}

fn finish_multi(run: MultiFundRun, params: &SimulationParameters, mode: &str) -> Result<MultiBacktest> {
    let summary = StatsSummarizer::multi(&run.outcomes, params)?;

    tracing::info!(
        mode,
        funds = run.outcomes.len(),
        rows = run.rows.len(),
        best = %summary.best_fund_id,
        worst = %summary.worst_fund_id,
        "multi-fund backtest complete"
    );

    Ok(MultiBacktest {
        rows: run.rows,
        records: run.records,
        summary,
    })
}
