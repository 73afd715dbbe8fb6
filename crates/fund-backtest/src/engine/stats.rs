//! Stats Summarizer
//!
//! Reduces final rows into the headline numbers of a response.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    FundOutcome, SimulationParameters, SimulationRun, annualized_return_rate, return_rate,
};
use crate::error::{BacktestError, Result};
use crate::model::LumpSumPoint;

/// Lump-sum baseline at the end of the range
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LumpSumSummary {
    pub principal: Decimal,
    pub final_value: Decimal,
    pub profit: Decimal,
    pub profit_rate: Decimal,
    pub annualized_return_rate: Decimal,
}

/// Single-fund headline numbers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestSummary {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub total_investment: Decimal,
    pub current_value: Decimal,
    pub total_shares: Decimal,
    pub average_cost: Decimal,
    pub profit: Decimal,

    /// Percent
    pub profit_rate: Decimal,

    /// Percent, carried from the last row
    pub annualized_return_rate: Decimal,

    pub purchase_count: usize,
    pub dividend_count: usize,

    /// Shares added by reinvested dividends
    pub dividend_shares: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lump_sum: Option<LumpSumSummary>,
}

/// One fund's line in a multi-fund summary
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundSummary {
    pub code: String,
    pub total_investment: Decimal,
    pub current_value: Decimal,
    pub profit: Decimal,
    pub profit_rate: Decimal,
    pub annualized_return_rate: Decimal,
}

/// Aggregate and per-fund headline numbers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiFundSummary {
    pub total_investment: Decimal,
    pub current_value: Decimal,
    pub profit: Decimal,
    pub profit_rate: Decimal,
    pub annualized_return_rate: Decimal,

    /// Code of the fund with the highest profit rate
    pub best_fund_id: String,

    /// Code of the fund with the lowest profit rate
    pub worst_fund_id: String,

    /// Best minus worst profit rate, in percentage points
    pub performance_difference: Decimal,

    /// Mean of per-fund profit rates
    pub average_return: Decimal,

    pub funds: Vec<FundSummary>,
}

fn checked_sum(mut values: impl Iterator<Item = Decimal>) -> Option<Decimal> {
    values.try_fold(Decimal::ZERO, Decimal::checked_add)
}

/// Summary reductions
pub struct StatsSummarizer;

impl StatsSummarizer {
    /// Summary of a DCA run and its lump-sum projection
    pub fn single(run: &SimulationRun, lump_sum: &[LumpSumPoint]) -> BacktestSummary {
        let Some(last) = run.last_row() else {
            return BacktestSummary::default();
        };

        let lump_sum = lump_sum.last().map(|end| {
            let principal = run.final_state.total_investment;
            LumpSumSummary {
                principal,
                final_value: end.value,
                profit: end.value - principal,
                profit_rate: return_rate(end.value, principal),
                annualized_return_rate: end.annualized_return_rate,
            }
        });

        BacktestSummary {
            start_date: run.rows.first().map(|r| r.date),
            end_date: Some(last.date),
            total_investment: last.total_investment,
            current_value: last.current_value,
            total_shares: last.total_shares,
            average_cost: last.average_cost,
            profit: last.profit(),
            profit_rate: return_rate(last.current_value, last.total_investment),
            annualized_return_rate: last.annualized_return_rate,
            purchase_count: run.purchases().count(),
            dividend_count: run.dividends().count(),
            dividend_shares: run.dividends().map(|r| r.shares).sum(),
            lump_sum,
        }
    }

    /// Aggregate over each fund's own final outcome, ties resolved to the
    /// lowest fund position
    pub fn multi(outcomes: &[FundOutcome], params: &SimulationParameters) -> Result<MultiFundSummary> {
        let funds: Vec<FundSummary> = outcomes
            .iter()
            .map(|o| FundSummary {
                code: o.code.clone(),
                total_investment: o.total_investment,
                current_value: o.current_value,
                profit: o.current_value - o.total_investment,
                profit_rate: return_rate(o.current_value, o.total_investment),
                annualized_return_rate: annualized_return_rate(
                    o.current_value,
                    o.total_investment,
                    params.days_since_start(o.last_date),
                ),
            })
            .collect();

        let Some(first) = funds.first() else {
            return Ok(MultiFundSummary::default());
        };

        let mut best = first;
        let mut worst = first;
        for fund in &funds[1..] {
            if fund.profit_rate > best.profit_rate {
                best = fund;
            }
            if fund.profit_rate < worst.profit_rate {
                worst = fund;
            }
        }

        let last_date = outcomes.iter().map(|o| o.last_date).max().unwrap_or(params.start_date);
        let overflow = || BacktestError::OutOfRange { date: last_date };

        let total_investment = checked_sum(funds.iter().map(|f| f.total_investment)).ok_or_else(overflow)?;
        let current_value = checked_sum(funds.iter().map(|f| f.current_value)).ok_or_else(overflow)?;
        let rate_sum = checked_sum(funds.iter().map(|f| f.profit_rate)).ok_or_else(overflow)?;
        let performance_difference = best
            .profit_rate
            .checked_sub(worst.profit_rate)
            .ok_or_else(overflow)?;

        Ok(MultiFundSummary {
            total_investment,
            current_value,
            profit: current_value - total_investment,
            profit_rate: return_rate(current_value, total_investment),
            annualized_return_rate: annualized_return_rate(
                current_value,
                total_investment,
                params.days_since_start(last_date),
            ),
            best_fund_id: best.code.clone(),
            worst_fund_id: worst.code.clone(),
            performance_difference,
            average_return: rate_sum / Decimal::from(funds.len()),
            funds,
        })
    }
}
