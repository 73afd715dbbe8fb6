//! Error Types for the Backtest Engine

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BacktestError>;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Price series for {0} is empty")]
    EmptySeries(String),

    #[error("Investment amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Non-positive net value on {date}: unit {unit}, cumulative {cumulative}")]
    NonPositivePrice {
        date: NaiveDate,
        unit: Decimal,
        cumulative: Decimal,
    },

    #[error("Unsupported frequency: {0}")]
    UnsupportedFrequency(String),

    #[error("Weekly day of week must be within 0..=6, got {0}")]
    InvalidWeekday(i64),

    #[error("Start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),

    #[error("Mode {mode} {expected}, got {actual} fund(s)")]
    FundCountMismatch {
        mode: &'static str,
        expected: &'static str,
        actual: usize,
    },

    #[error("No price data for {fund} between {start} and {end}")]
    NoDataInRange {
        fund: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Values on {date} exceed the supported numeric range")]
    OutOfRange { date: NaiveDate },

    #[error("Invalid fund code: {0}")]
    InvalidFundCode(String),

    #[error("Upstream price provider error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BacktestError {
    /// Input the engine rejects, reported as a client error.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::EmptySeries(_)
                | Self::NonPositiveAmount(_)
                | Self::NonPositivePrice { .. }
                | Self::UnsupportedFrequency(_)
                | Self::InvalidWeekday(_)
                | Self::InvalidDateRange { .. }
                | Self::UnsupportedMode(_)
                | Self::FundCountMismatch { .. }
                | Self::NoDataInRange { .. }
                | Self::OutOfRange { .. }
                | Self::InvalidFundCode(_)
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Upstream(_) | Self::Network(_) => {
                "Fund data could not be fetched. Please check the fund code and try again.".into()
            }
            Self::Config(_) => "Fund data provider is not configured.".into(),
            Self::Serialization(_) => "An unexpected error occurred.".into(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        assert!(BacktestError::UnsupportedFrequency("hourly".into()).is_validation());
        assert!(
            BacktestError::FundCountMismatch {
                mode: "single",
                expected: "requires exactly one fund",
                actual: 2,
            }
            .is_validation()
        );
        assert!(
            BacktestError::OutOfRange {
                date: NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
            }
            .is_validation()
        );
        assert!(!BacktestError::Upstream("timeout".into()).is_validation());
        assert!(!BacktestError::Config("missing".into()).is_validation());
    }

    #[test]
    fn test_user_message_hides_upstream_detail() {
        let err = BacktestError::Upstream("python traceback ...".into());
        assert!(!err.user_message().contains("traceback"));

        let err = BacktestError::InvalidWeekday(9);
        assert_eq!(err.user_message(), "Weekly day of week must be within 0..=6, got 9");
    }
}
