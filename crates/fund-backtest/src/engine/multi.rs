//! Multi-Fund Aggregator
//!
//! Runs every fund independently with the same parameters, then merges the
//! per-fund snapshots on the union of all funds' dates.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{LumpSumComparator, PortfolioAccumulator, SimulationParameters};
use crate::error::{BacktestError, Result};
use crate::model::{FundSnapshot, InvestmentRecord, MultiFundRow, PricePoint, PriceSeries};

/// Principal of each fund in a lump-sum comparison
pub const NOMINAL_UNIT: Decimal = dec!(1);

/// Final position of one fund
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FundOutcome {
    pub code: String,
    pub last_date: NaiveDate,
    pub total_investment: Decimal,
    pub current_value: Decimal,
}

/// Merged rows plus each fund's own final outcome
#[derive(Clone, Debug, Default)]
pub struct MultiFundRun {
    pub rows: Vec<MultiFundRow>,
    pub records: Vec<InvestmentRecord>,

    /// In fund position order
    pub outcomes: Vec<FundOutcome>,
}

/// One fund's dated snapshots, chronological
struct FundTrack {
    snapshots: Vec<(NaiveDate, FundSnapshot)>,
}

/// Drives one independent simulation per fund
#[derive(Clone, Copy, Debug)]
pub struct MultiFundAggregator {
    params: SimulationParameters,
}

impl MultiFundAggregator {
    pub const fn new(params: SimulationParameters) -> Self {
        Self { params }
    }

    fn points_in_range<'a>(&self, series: &'a PriceSeries) -> Result<&'a [PricePoint]> {
        let points = series.in_range(self.params.start_date, self.params.end_date);
        if points.is_empty() {
            return Err(BacktestError::NoDataInRange {
                fund: series.code().to_string(),
                start: self.params.start_date,
                end: self.params.end_date,
            });
        }
        Ok(points)
    }

    /// One DCA accumulation per fund
    pub fn run_dca(&self, funds: &[PriceSeries]) -> Result<MultiFundRun> {
        let accumulator = PortfolioAccumulator::new(self.params);
        let mut tracks = Vec::with_capacity(funds.len());
        let mut outcomes = Vec::with_capacity(funds.len());
        let mut records = Vec::new();

        for series in funds {
            let points = self.points_in_range(series)?;
            let run = accumulator.run(points)?;

            records.extend(
                run.records
                    .iter()
                    .cloned()
                    .map(|r| r.with_fund(series.code())),
            );
            if let Some(last) = run.last_row() {
                outcomes.push(FundOutcome {
                    code: series.code().to_string(),
                    last_date: last.date,
                    total_investment: last.total_investment,
                    current_value: last.current_value,
                });
            }
            tracks.push(FundTrack {
                snapshots: run
                    .rows
                    .iter()
                    .map(|row| (row.date, FundSnapshot::from_row(row)))
                    .collect(),
            });
        }

        // Stable: same-day records keep fund position order
        records.sort_by_key(|r| r.date);

        Ok(MultiFundRun {
            rows: merge(&tracks),
            records,
            outcomes,
        })
    }

    /// One lump sum of [`NOMINAL_UNIT`] per fund
    pub fn run_lump_sum(&self, funds: &[PriceSeries]) -> Result<MultiFundRun> {
        let comparator = LumpSumComparator::new(NOMINAL_UNIT, self.params.start_date);
        let mut tracks = Vec::with_capacity(funds.len());
        let mut outcomes = Vec::with_capacity(funds.len());

        for series in funds {
            let points = self.points_in_range(series)?;
            let projection = comparator.project(points)?;

            if let Some(last) = projection.last() {
                outcomes.push(FundOutcome {
                    code: series.code().to_string(),
                    last_date: last.date,
                    total_investment: NOMINAL_UNIT,
                    current_value: last.value,
                });
            }
            tracks.push(FundTrack {
                snapshots: projection
                    .into_iter()
                    .map(|p| {
                        let snapshot = FundSnapshot {
                            current_value: p.value,
                            total_investment: NOMINAL_UNIT,
                            return_rate: p.return_rate,
                            annualized_return_rate: p.annualized_return_rate,
                            carried_forward: false,
                        };
                        (p.date, snapshot)
                    })
                    .collect(),
            });
        }

        Ok(MultiFundRun {
            rows: merge(&tracks),
            records: Vec::new(),
            outcomes,
        })
    }
}

/// Merge on the union of dates. A fund without a point on a date repeats its
/// last snapshot, and contributes nothing before its first point.
fn merge(tracks: &[FundTrack]) -> Vec<MultiFundRow> {
    let dates: BTreeSet<NaiveDate> = tracks
        .iter()
        .flat_map(|t| t.snapshots.iter().map(|(date, _)| *date))
        .collect();

    let mut cursors = vec![0_usize; tracks.len()];
    let mut latest: Vec<Option<FundSnapshot>> = vec![None; tracks.len()];

    dates
        .into_iter()
        .map(|date| {
            let funds: Vec<Option<FundSnapshot>> = tracks
                .iter()
                .enumerate()
                .map(|(index, track)| match track.snapshots.get(cursors[index]) {
                    Some((own_date, snapshot)) if *own_date == date => {
                        cursors[index] += 1;
                        latest[index] = Some(snapshot.clone());
                        Some(snapshot.clone())
                    }
                    _ => latest[index].as_ref().map(FundSnapshot::carried),
                })
                .collect();

            let shared_investment = funds
                .first()
                .and_then(Option::as_ref)
                .map_or(Decimal::ZERO, |s| s.total_investment);

            MultiFundRow {
                date,
                shared_investment,
                funds,
            }
        })
        .collect()
}
