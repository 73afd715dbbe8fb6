//! Mock Price Provider
//!
//! For testing and demo purposes. Returns deterministic synthetic series.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{DateRange, FundCode, PriceProvider};
use crate::error::{BacktestError, Result};
use crate::model::PricePoint;

/// Trading days between two payouts
const PAYOUT_INTERVAL: usize = 120;

/// Lowest unit value a synthetic series can fall to
const FLOOR: Decimal = dec!(0.1);

/// Shape of one synthetic fund
#[derive(Clone, Copy, Debug)]
struct Profile {
    base: Decimal,
    /// Per-day drift
    drift: Decimal,
    /// Peak daily swing
    volatility: Decimal,
    /// Fraction of unit value paid out every [`PAYOUT_INTERVAL`] days
    payout: Decimal,
}

/// Mock provider with static synthetic fund histories
pub struct MockPriceProvider {
    start: NaiveDate,
    end: NaiveDate,
    overrides: HashMap<String, Vec<PricePoint>>,
}

impl Default for MockPriceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockPriceProvider {
    pub fn new() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap_or_default(),
            overrides: HashMap::new(),
        }
    }

    /// Serve `points` for `code` instead of a synthetic series
    pub fn with_series(mut self, code: &FundCode, points: Vec<PricePoint>) -> Self {
        self.overrides.insert(code.as_str().to_string(), points);
        self
    }

    fn profile(code: &str) -> Option<Profile> {
        // (base, drift, volatility, payout)
        match code {
            "000001" => Some(Profile {
                base: dec!(1.0000),
                drift: dec!(0.0002),
                volatility: dec!(0.004),
                payout: dec!(0.02),
            }),
            "110022" => Some(Profile {
                base: dec!(2.5000),
                drift: dec!(0.0004),
                volatility: dec!(0.012),
                payout: Decimal::ZERO,
            }),
            "161725" => Some(Profile {
                base: dec!(0.8000),
                drift: dec!(0.0003),
                volatility: dec!(0.02),
                payout: dec!(0.05),
            }),
            "519674" => Some(Profile {
                base: dec!(1.2000),
                drift: dec!(-0.0001),
                volatility: dec!(0.008),
                payout: dec!(0.01),
            }),
            _ => None,
        }
    }

    /// Triangle wave in -5..=5 with a 20-day period
    fn wave(day: usize) -> Decimal {
        let phase = day % 20;
        let height = if phase < 10 { phase } else { 20 - phase };
        Decimal::from(height) - dec!(5)
    }

    fn synthesize(&self, profile: Profile) -> Vec<PricePoint> {
        let mut unit = profile.base;
        let mut cumulative = profile.base;

        self.start
            .iter_days()
            .take_while(|date| *date <= self.end)
            .filter(|date| !matches!(date.weekday(), Weekday::Sat | Weekday::Sun))
            .enumerate()
            .map(|(day, date)| {
                if day > 0 {
                    let change = profile.drift + Self::wave(day) * profile.volatility / dec!(5);
                    let delta = (unit * change).round_dp(4);
                    let next = (unit + delta).max(FLOOR);
                    cumulative += next - unit;
                    unit = next;

                    if day % PAYOUT_INTERVAL == 0 && profile.payout > Decimal::ZERO {
                        let payout = (unit * profile.payout).round_dp(4);
                        unit = (unit - payout).max(FLOOR);
                    }
                }
                PricePoint::new(date, unit, cumulative)
            })
            .collect()
    }
}

#[async_trait]
impl PriceProvider for MockPriceProvider {
    async fn fetch(&self, code: &FundCode, range: DateRange) -> Result<Vec<PricePoint>> {
        let points = match self.overrides.get(code.as_str()) {
            Some(points) => points.clone(),
            None => {
                let profile = Self::profile(code.as_str())
                    .ok_or_else(|| BacktestError::Upstream(format!("unknown fund {code}")))?;
                self.synthesize(profile)
            }
        };

        let mut points: Vec<_> = points.into_iter().filter(|p| range.contains(p.date)).collect();
        points.sort_by_key(|p| p.date);
        Ok(points)
    }

    async fn health_check(&self) -> bool {
        true // Mock always healthy
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{PortfolioAccumulator, SimulationParameters};
    use crate::strategy::Frequency;

    fn code(s: &str) -> FundCode {
        FundCode::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_mock_series_is_deterministic() {
        let provider = MockPriceProvider::new();
        let first = provider.fetch(&code("000001"), DateRange::default()).await.unwrap();
        let second = provider.fetch(&code("000001"), DateRange::default()).await.unwrap();
        assert_eq!(first, second);
        assert!(first.len() > 1000);
        assert!(first.iter().all(|p| p.unit_net_value > Decimal::ZERO));
        assert!(first.iter().all(|p| !matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[tokio::test]
    async fn test_mock_range_filter() {
        let provider = MockPriceProvider::new();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2023, 1, 1),
            NaiveDate::from_ymd_opt(2023, 1, 31),
        );
        let points = provider.fetch(&code("110022"), range).await.unwrap();
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| range.contains(p.date)));
    }

    #[tokio::test]
    async fn test_unknown_fund() {
        let provider = MockPriceProvider::new();
        let result = provider.fetch(&code("999999"), DateRange::default()).await;
        assert!(matches!(result, Err(BacktestError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_paying_fund_triggers_reinvestment() {
        let provider = MockPriceProvider::new();
        let points = provider.fetch(&code("161725"), DateRange::default()).await.unwrap();
        let params = SimulationParameters::new(
            dec!(500),
            Frequency::Monthly,
            points[0].date,
            points[points.len() - 1].date,
        )
        .unwrap();

        let run = PortfolioAccumulator::new(params).run(&points).unwrap();
        assert!(run.dividends().count() > 0);
        let purchased: Decimal = run.purchases().map(|r| r.amount).sum();
        assert_eq!(run.final_state.total_investment, purchased);
    }

    #[tokio::test]
    async fn test_override_series() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let provider = MockPriceProvider::new()
            .with_series(&code("999999"), vec![PricePoint::flat(day, dec!(1.5))]);
        let points = provider.fetch(&code("999999"), DateRange::default()).await.unwrap();
        assert_eq!(points, vec![PricePoint::flat(day, dec!(1.5))]);
    }
}
