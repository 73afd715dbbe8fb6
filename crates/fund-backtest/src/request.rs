//! Request and Response Contract
//!
//! JSON shapes accepted and returned by the HTTP layer. Every input is
//! validated here before any simulation runs.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::engine::{
    self, BacktestSummary, MultiBacktest, MultiFundSummary, SimulationParameters, SingleBacktest,
};
use crate::error::{BacktestError, Result};
use crate::model::{BacktestRow, InvestmentRecord, MultiFundRow, PricePoint, PriceSeries};
use crate::strategy::Frequency;

/// Label used for the fund of a single-fund request
const SINGLE_FUND_LABEL: &str = "fund";

/// Simulation mode of a multi-fund request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BacktestMode {
    Single,
    MultiDca,
    MultiLumpsum,
}

impl BacktestMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::MultiDca => "multi-dca",
            Self::MultiLumpsum => "multi-lumpsum",
        }
    }

    /// Mode implied by the number of funds when the request omits it
    pub const fn infer(fund_count: usize) -> Self {
        if fund_count == 1 { Self::Single } else { Self::MultiDca }
    }

    fn check_fund_count(self, actual: usize) -> Result<()> {
        let (ok, expected) = match self {
            Self::Single => (actual == 1, "requires exactly one fund"),
            Self::MultiDca | Self::MultiLumpsum => (actual >= 2, "requires at least two funds"),
        };
        if ok {
            return Ok(());
        }
        Err(BacktestError::FundCountMismatch {
            mode: self.as_str(),
            expected,
            actual,
        })
    }
}

impl FromStr for BacktestMode {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "multi-dca" => Ok(Self::MultiDca),
            "multi-lumpsum" => Ok(Self::MultiLumpsum),
            _ => Err(BacktestError::UnsupportedMode(s.to_string())),
        }
    }
}

impl fmt::Display for BacktestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn parameters(
    investment_amount: Decimal,
    frequency: &str,
    weekly_day_of_week: Option<i64>,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<SimulationParameters> {
    let frequency = Frequency::parse(frequency, weekly_day_of_week)?;
    SimulationParameters::new(investment_amount, frequency, start_date, end_date)
}

/// Single-fund backtest request
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    pub fund_data: Vec<PricePoint>,
    pub investment_amount: Decimal,
    pub frequency: String,
    #[serde(default)]
    pub weekly_day_of_week: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl BacktestRequest {
    pub fn parameters(&self) -> Result<SimulationParameters> {
        parameters(
            self.investment_amount,
            &self.frequency,
            self.weekly_day_of_week,
            self.start_date,
            self.end_date,
        )
    }

    /// Validate and simulate
    pub fn run(self) -> Result<BacktestResponse> {
        let params = self.parameters()?;
        let series = PriceSeries::new(SINGLE_FUND_LABEL, self.fund_data)?;
        engine::backtest_single(&series, &params).map(BacktestResponse::single)
    }
}

/// One fund of a multi-fund request
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FundInput {
    #[serde(default)]
    pub code: String,
    pub data: Vec<PricePoint>,
}

/// Multi-fund backtest request
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiBacktestRequest {
    pub funds: Vec<FundInput>,
    pub investment_amount: Decimal,
    pub frequency: String,
    #[serde(default)]
    pub weekly_day_of_week: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// Inferred from the fund count when absent
    #[serde(default)]
    pub mode: Option<String>,
}

impl MultiBacktestRequest {
    pub fn mode(&self) -> Result<BacktestMode> {
        self.mode
            .as_deref()
            .map_or_else(|| Ok(BacktestMode::infer(self.funds.len())), str::parse)
    }

    /// Validate and simulate
    pub fn run(self) -> Result<BacktestResponse> {
        let mode = self.mode()?;
        mode.check_fund_count(self.funds.len())?;
        let params = self.parameters()?;

        let series = self
            .funds
            .into_iter()
            .enumerate()
            .map(|(index, fund)| {
                let code = if fund.code.trim().is_empty() {
                    format!("fund{}", index + 1)
                } else {
                    fund.code.trim().to_string()
                };
                PriceSeries::new(code, fund.data)
            })
            .collect::<Result<Vec<_>>>()?;

        match mode {
            BacktestMode::Single => {
                engine::backtest_single(&series[0], &params).map(BacktestResponse::single)
            }
            BacktestMode::MultiDca => engine::backtest_multi_dca(&series, &params)
                .map(|result| BacktestResponse::multi(mode, result)),
            BacktestMode::MultiLumpsum => engine::backtest_multi_lump_sum(&series, &params)
                .map(|result| BacktestResponse::multi(mode, result)),
        }
    }

    pub fn parameters(&self) -> Result<SimulationParameters> {
        parameters(
            self.investment_amount,
            &self.frequency,
            self.weekly_day_of_week,
            self.start_date,
            self.end_date,
        )
    }
}

/// Rows of either shape
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum BacktestData {
    Single(Vec<BacktestRow>),
    Multi(Vec<MultiFundRow>),
}

/// Summary of either shape
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum BacktestStats {
    Single(BacktestSummary),
    Multi(MultiFundSummary),
}

/// Successful backtest response
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResponse {
    pub success: bool,
    pub mode: BacktestMode,
    pub data: BacktestData,

    /// Most recent first
    pub investment_records: Vec<InvestmentRecord>,

    pub stats: BacktestStats,
}

impl BacktestResponse {
    fn single(result: SingleBacktest) -> Self {
        let SingleBacktest {
            rows,
            mut records,
            summary,
        } = result;
        records.reverse();
        Self {
            success: true,
            mode: BacktestMode::Single,
            data: BacktestData::Single(rows),
            investment_records: records,
            stats: BacktestStats::Single(summary),
        }
    }

    fn multi(mode: BacktestMode, result: MultiBacktest) -> Self {
        let MultiBacktest {
            rows,
            mut records,
            summary,
        } = result;
        records.reverse();
        Self {
            success: true,
            mode,
            data: BacktestData::Multi(rows),
            investment_records: records,
            stats: BacktestStats::Multi(summary),
        }
    }

    pub fn single_rows(&self) -> Option<&[BacktestRow]> {
        match &self.data {
            BacktestData::Single(rows) => Some(rows),
            BacktestData::Multi(_) => None,
        }
    }

    pub fn multi_rows(&self) -> Option<&[MultiFundRow]> {
        match &self.data {
            BacktestData::Multi(rows) => Some(rows),
            BacktestData::Single(_) => None,
        }
    }

    pub const fn single_stats(&self) -> Option<&BacktestSummary> {
        match &self.stats {
            BacktestStats::Single(summary) => Some(summary),
            BacktestStats::Multi(_) => None,
        }
    }

    pub const fn multi_stats(&self) -> Option<&MultiFundSummary> {
        match &self.stats {
            BacktestStats::Multi(summary) => Some(summary),
            BacktestStats::Single(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn points(values: &[f64]) -> serde_json::Value {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                json!({
                    "date": format!("2024-01-{:02}", i + 1),
                    "unitNetValue": v,
                    "cumulativeNetValue": v,
                })
            })
            .collect()
    }

    fn single_request(frequency: &str, weekday: Option<i64>) -> BacktestRequest {
        serde_json::from_value(json!({
            "fundData": points(&[10.0, 10.0, 12.0, 12.0, 15.0]),
            "investmentAmount": 100,
            "frequency": frequency,
            "weeklyDayOfWeek": weekday,
            "startDate": "2024-01-01",
            "endDate": "2024-01-05",
        }))
        .unwrap()
    }

    fn multi_request(fund_count: usize, mode: Option<&str>) -> MultiBacktestRequest {
        let funds: Vec<_> = (0..fund_count)
            .map(|i| json!({ "code": format!("00000{}", i + 1), "data": points(&[1.0, 1.1, 1.2]) }))
            .collect();
        serde_json::from_value(json!({
            "funds": funds,
            "investmentAmount": 100,
            "frequency": "daily",
            "startDate": "2024-01-01",
            "endDate": "2024-01-03",
            "mode": mode,
        }))
        .unwrap()
    }

    #[test]
    fn test_single_request_scenario() {
        let response = single_request("daily", None).run().unwrap();
        let stats = response.single_stats().unwrap();
        assert_eq!(stats.total_investment, Decimal::from(400));
        assert!((stats.profit_rate - Decimal::from_str("37.5").unwrap()).abs() < Decimal::new(1, 4));

        // Most recent first
        let dates: Vec<_> = response.investment_records.iter().map(|r| r.date).collect();
        assert!(dates.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(response.single_rows().unwrap().len(), 5);
    }

    #[test]
    fn test_single_request_validation() {
        let mut request = single_request("daily", None);
        request.investment_amount = Decimal::ZERO;
        assert!(request.run().unwrap_err().is_validation());

        assert!(matches!(
            single_request("yearly", None).run(),
            Err(BacktestError::UnsupportedFrequency(_))
        ));
        assert!(matches!(
            single_request("weekly", Some(8)).run(),
            Err(BacktestError::InvalidWeekday(8))
        ));

        let mut request = single_request("daily", None);
        request.fund_data.clear();
        assert!(matches!(request.run(), Err(BacktestError::EmptySeries(_))));
    }

    #[test]
    fn test_extreme_magnitudes_are_rejected() {
        let request: BacktestRequest = serde_json::from_value(json!({
            "fundData": points(&[1.0, 1.0, 1.0, 1.0]),
            "investmentAmount": 3.0e28,
            "frequency": "daily",
            "startDate": "2024-01-01",
            "endDate": "2024-01-04",
        }))
        .unwrap();
        let err = request.run().unwrap_err();
        assert!(matches!(err, BacktestError::OutOfRange { .. }));
        assert!(err.is_validation());

        let request: BacktestRequest = serde_json::from_value(json!({
            "fundData": points(&[1e-10, 1e-10]),
            "investmentAmount": 1.0e20,
            "frequency": "daily",
            "startDate": "2024-01-01",
            "endDate": "2024-01-02",
        }))
        .unwrap();
        assert!(matches!(request.run(), Err(BacktestError::OutOfRange { .. })));
    }

    #[test]
    fn test_mode_fund_count_validation() {
        let err = multi_request(2, Some("single")).run().unwrap_err();
        assert!(matches!(err, BacktestError::FundCountMismatch { actual: 2, .. }));
        assert!(err.is_validation());

        let err = multi_request(1, Some("multi-dca")).run().unwrap_err();
        assert!(matches!(err, BacktestError::FundCountMismatch { actual: 1, .. }));

        let err = multi_request(1, Some("multi-lumpsum")).run().unwrap_err();
        assert!(err.is_validation());

        assert!(matches!(
            multi_request(2, Some("multi-everything")).run(),
            Err(BacktestError::UnsupportedMode(_))
        ));
    }

    #[test]
    fn test_multi_request_modes() {
        let response = multi_request(1, Some("single")).run().unwrap();
        assert_eq!(response.mode, BacktestMode::Single);
        assert!(response.single_rows().is_some());

        let response = multi_request(3, None).run().unwrap();
        assert_eq!(response.mode, BacktestMode::MultiDca);
        let rows = response.multi_rows().unwrap();
        assert!(rows.iter().all(|r| r.funds.len() == 3));
        assert_eq!(response.multi_stats().unwrap().funds.len(), 3);
        assert!(response.investment_records.iter().all(|r| r.fund_code.is_some()));

        let response = multi_request(2, Some("multi-lumpsum")).run().unwrap();
        assert!(response.investment_records.is_empty());
        assert_eq!(
            response.multi_stats().unwrap().total_investment,
            Decimal::from(2)
        );
    }

    #[test]
    fn test_blank_codes_are_labelled_by_position() {
        let mut request = multi_request(2, None);
        request.funds[1].code = "  ".into();
        let response = request.run().unwrap();
        let stats = response.multi_stats().unwrap();
        assert_eq!(stats.funds[1].code, "fund2");
    }

    #[test]
    fn test_response_is_idempotent() {
        let first = serde_json::to_string(&multi_request(2, None).run().unwrap()).unwrap();
        let second = serde_json::to_string(&multi_request(2, None).run().unwrap()).unwrap();
        assert_eq!(first, second);

        let first = serde_json::to_string(&single_request("monthly", None).run().unwrap()).unwrap();
        let second = serde_json::to_string(&single_request("monthly", None).run().unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_response_json_shape() {
        let value = serde_json::to_value(single_request("daily", None).run().unwrap()).unwrap();
        assert_eq!(value["success"], json!(true));
        assert_eq!(value["mode"], json!("single"));
        assert!(value["data"][0]["unitPrice"].is_number());
        assert!(value["data"][0]["lumpSum"]["value"].is_number());
        assert!(value["stats"]["profitRate"].is_number());
        assert_eq!(value["investmentRecords"][0]["kind"], json!("purchase"));
    }
}
