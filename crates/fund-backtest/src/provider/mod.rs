//! Price-Series Providers
//!
//! Abstractions and implementations for fetching historical net values.
//! The engine never calls a provider; the HTTP layer fetches first and
//! simulates afterwards.

mod http;
mod mock;
mod script;

pub use http::HttpProvider;
pub use mock::MockPriceProvider;
pub use script::ScriptProvider;

use std::fmt;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};
use crate::model::PricePoint;

/// Six-digit fund identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FundCode(String);

impl FundCode {
    pub fn parse(code: &str) -> Result<Self> {
        let code = code.trim();
        if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(code.to_string()))
        } else {
            Err(BacktestError::InvalidFundCode(code.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FundCode {
    type Error = BacktestError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<FundCode> for String {
    fn from(code: FundCode) -> Self {
        code.0
    }
}

impl fmt::Display for FundCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Optional inclusive date bounds of a fetch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub const fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }
}

/// Price-series provider trait (Strategy pattern)
///
/// Implement this for each upstream source: fetch script, HTTP service, etc.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Chronological net values of `code` within `range`
    async fn fetch(&self, code: &FundCode, range: DateRange) -> Result<Vec<PricePoint>>;

    /// Check if the upstream source is reachable
    async fn health_check(&self) -> bool;

    /// Provider name
    fn name(&self) -> &str;
}

/// `{ success, data, error }` as printed by the fetch script
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Vec<PricePoint>,
    #[serde(default)]
    error: Option<String>,
}

/// Decode an upstream envelope, keep points within `range`, sorted by date
pub(crate) fn decode_envelope(bytes: &[u8], range: DateRange) -> Result<Vec<PricePoint>> {
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    if !envelope.success {
        return Err(BacktestError::Upstream(
            envelope
                .error
                .unwrap_or_else(|| "provider reported failure without a message".into()),
        ));
    }

    let mut points: Vec<PricePoint> = envelope
        .data
        .into_iter()
        .filter(|p| range.contains(p.date))
        .collect();
    points.sort_by_key(|p| p.date);
    Ok(points)
}
