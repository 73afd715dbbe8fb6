//! Domain Models
//!
//! Core data types for fund backtesting.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// One day of a fund's net-asset-value history
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawPricePoint")]
pub struct PricePoint {
    /// Trading date
    pub date: NaiveDate,

    /// Per-share price excluding distributed dividends
    pub unit_net_value: Decimal,

    /// Per-share value with all dividends reinvested
    pub cumulative_net_value: Decimal,
}

impl PricePoint {
    pub const fn new(date: NaiveDate, unit_net_value: Decimal, cumulative_net_value: Decimal) -> Self {
        Self {
            date,
            unit_net_value,
            cumulative_net_value,
        }
    }

    /// A point whose unit and cumulative values coincide (no dividend history)
    pub const fn flat(date: NaiveDate, net_value: Decimal) -> Self {
        Self::new(date, net_value, net_value)
    }
}

/// Wire shape accepted from callers and the fetch script.
///
/// The script names the unit value `netValue` and may omit the cumulative
/// value, in which case it equals the unit value.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPricePoint {
    date: NaiveDate,
    #[serde(alias = "netValue")]
    unit_net_value: Decimal,
    #[serde(default)]
    cumulative_net_value: Option<Decimal>,
}

impl From<RawPricePoint> for PricePoint {
    fn from(raw: RawPricePoint) -> Self {
        Self {
            date: raw.date,
            unit_net_value: raw.unit_net_value,
            cumulative_net_value: raw.cumulative_net_value.unwrap_or(raw.unit_net_value),
        }
    }
}

/// Validated, date-sorted price history for one fund
#[derive(Clone, Debug)]
pub struct PriceSeries {
    code: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Validate and sort a copy of `points`.
    ///
    /// Duplicate dates collapse to the last reported point.
    pub fn new(code: impl Into<String>, mut points: Vec<PricePoint>) -> Result<Self> {
        let code = code.into();
        if points.is_empty() {
            return Err(BacktestError::EmptySeries(code));
        }

        if let Some(bad) = points
            .iter()
            .find(|p| p.unit_net_value <= Decimal::ZERO || p.cumulative_net_value <= Decimal::ZERO)
        {
            return Err(BacktestError::NonPositivePrice {
                date: bad.date,
                unit: bad.unit_net_value,
                cumulative: bad.cumulative_net_value,
            });
        }

        points.sort_by_key(|p| p.date);

        let reported = points.len();
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(reported);
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        if deduped.len() < reported {
            tracing::debug!(
                fund = %code,
                dropped = reported - deduped.len(),
                "collapsed duplicate price dates"
            );
        }

        Ok(Self {
            code,
            points: deduped,
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points with `start <= date <= end`
    pub fn in_range(&self, start: NaiveDate, end: NaiveDate) -> &[PricePoint] {
        let lo = self.points.partition_point(|p| p.date < start);
        let hi = self.points.partition_point(|p| p.date <= end);
        if lo >= hi {
            return &[];
        }
        &self.points[lo..hi]
    }
}

/// Why shares were added to the position
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InvestmentKind {
    /// Scheduled purchase paid with new cash
    Purchase,
    /// Cash dividend converted back into shares
    DividendReinvestment,
}

/// Log line for a purchase or a reinvested dividend
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentRecord {
    pub date: NaiveDate,
    pub kind: InvestmentKind,
    pub unit_net_value: Decimal,

    /// Cash spent, or dividend cash reinvested
    pub amount: Decimal,

    /// Shares added
    pub shares: Decimal,

    /// Set in multi-fund mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fund_code: Option<String>,
}

impl InvestmentRecord {
    pub fn purchase(point: &PricePoint, amount: Decimal, shares: Decimal) -> Self {
        Self {
            date: point.date,
            kind: InvestmentKind::Purchase,
            unit_net_value: point.unit_net_value,
            amount,
            shares,
            fund_code: None,
        }
    }

    pub fn dividend(point: &PricePoint, cash_value: Decimal, shares: Decimal) -> Self {
        Self {
            date: point.date,
            kind: InvestmentKind::DividendReinvestment,
            unit_net_value: point.unit_net_value,
            amount: cash_value,
            shares,
            fund_code: None,
        }
    }

    pub fn with_fund(mut self, code: impl Into<String>) -> Self {
        self.fund_code = Some(code.into());
        self
    }

    pub fn is_purchase(&self) -> bool {
        self.kind == InvestmentKind::Purchase
    }
}

/// Lump-sum baseline valued on one date
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LumpSumPoint {
    pub date: NaiveDate,
    pub value: Decimal,

    /// Percent
    pub return_rate: Decimal,

    /// Percent
    pub annualized_return_rate: Decimal,
}

/// Portfolio snapshot after processing one price point
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRow {
    pub date: NaiveDate,
    pub unit_price: Decimal,
    pub cumulative_price: Decimal,
    pub total_investment: Decimal,
    pub total_shares: Decimal,
    pub average_cost: Decimal,
    pub current_value: Decimal,

    /// Profit rate to date, percent
    pub return_rate: Decimal,

    /// Percent
    pub annualized_return_rate: Decimal,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lump_sum: Option<LumpSumPoint>,
}

impl BacktestRow {
    pub fn profit(&self) -> Decimal {
        self.current_value - self.total_investment
    }
}

/// One fund's contribution to a merged multi-fund row
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FundSnapshot {
    pub current_value: Decimal,
    pub total_investment: Decimal,

    /// Percent
    pub return_rate: Decimal,

    /// Percent
    pub annualized_return_rate: Decimal,

    /// True when the fund had no point on this date and the previous
    /// snapshot is repeated
    pub carried_forward: bool,
}

impl FundSnapshot {
    pub fn from_row(row: &BacktestRow) -> Self {
        Self {
            current_value: row.current_value,
            total_investment: row.total_investment,
            return_rate: row.return_rate,
            annualized_return_rate: row.annualized_return_rate,
            carried_forward: false,
        }
    }

    pub(crate) fn carried(&self) -> Self {
        Self {
            carried_forward: true,
            ..self.clone()
        }
    }
}

/// Merged row across all funds of a request, indexed by fund position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiFundRow {
    pub date: NaiveDate,

    /// First fund's total investment, the reference line for charts
    pub shared_investment: Decimal,

    /// `None` before a fund's first price point
    pub funds: Vec<Option<FundSnapshot>>,
}
