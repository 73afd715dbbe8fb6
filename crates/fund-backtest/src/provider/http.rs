//! HTTP Provider
//!
//! Fetches the same `{ success, data, error }` envelope from an upstream
//! service: `GET <base>/<code>?startDate=..&endDate=..`.

use std::time::Duration;

use async_trait::async_trait;

use super::{DateRange, FundCode, PriceProvider, decode_envelope};
use crate::error::{BacktestError, Result};
use crate::model::PricePoint;

/// Provider backed by an upstream HTTP service
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, code: &FundCode) -> String {
        format!("{}/{}", self.base_url, code)
    }

    fn query(range: DateRange) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(start) = range.start {
            query.push(("startDate", start.to_string()));
        }
        if let Some(end) = range.end {
            query.push(("endDate", end.to_string()));
        }
        query
    }
}

#[async_trait]
impl PriceProvider for HttpProvider {
    async fn fetch(&self, code: &FundCode, range: DateRange) -> Result<Vec<PricePoint>> {
        let response = self
            .client
            .get(self.url(code))
            .query(&Self::query(range))
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        match decode_envelope(&body, range) {
            Ok(points) => {
                tracing::info!(%code, points = points.len(), "fetched price series");
                Ok(points)
            }
            Err(BacktestError::Serialization(e)) if !status.is_success() => {
                tracing::warn!(%code, %status, "upstream returned a non-envelope error");
                Err(BacktestError::Upstream(format!("upstream returned {status}: {e}")))
            }
            Err(e) => Err(e),
        }
    }

    async fn health_check(&self) -> bool {
        self.client
            .get(&self.base_url)
            .send()
            .await
            .is_ok_and(|response| response.status().is_success())
    }

    fn name(&self) -> &str {
        "http"
    }
}
