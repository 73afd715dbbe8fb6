//! # fund-backtest
//!
//! Dollar-cost averaging backtests over historical fund net values, compared
//! against a single lump-sum investment.
//!
//! ## How a run works
//!
//! - **Schedule** - a purchase happens daily, weekly on a chosen weekday, or on
//!   the first trading day of each month; never on the last day of the range
//! - **Reinvest** - a dividend shows up as a gap between the unit and cumulative
//!   net value moves and is turned back into shares, not into principal
//! - **Compare** - the same total principal invested on day one is valued through
//!   the cumulative net value ratio
//! - **Aggregate** - several funds run independently and are merged by date
//!
//! ## Example: 100 per day over five trading days
//!
//! ```text
//! ┌────────────┬──────┬──────────┬──────────┬──────────┐
//! │ date       │ unit │ invested │ shares   │ value    │
//! ├────────────┼──────┼──────────┼──────────┼──────────┤
//! │ day 1      │ 10   │ 100      │ 10.000   │ 100.00   │
//! │ day 2      │ 10   │ 200      │ 20.000   │ 200.00   │
//! │ day 3      │ 12   │ 300      │ 28.333   │ 340.00   │
//! │ day 4      │ 12   │ 400      │ 36.667   │ 440.00   │
//! │ day 5      │ 15   │ 400      │ 36.667   │ 550.00   │  ← no purchase
//! └────────────┴──────┴──────────┴──────────┴──────────┘
//!   profit rate 37.5%
//! ```
//!
//! The engine is synchronous and stateless; providers in [`provider`] fetch
//! series before a run and are the only async part of the crate.

pub mod engine;
pub mod error;
pub mod model;
pub mod provider;
pub mod request;
pub mod strategy;

pub use engine::{
    BacktestSummary, LumpSumComparator, MultiFundAggregator, MultiFundSummary,
    PortfolioAccumulator, PortfolioState, SimulationParameters, StatsSummarizer,
};
pub use error::{BacktestError, Result};
pub use model::{
    BacktestRow, FundSnapshot, InvestmentKind, InvestmentRecord, MultiFundRow, PricePoint,
    PriceSeries,
};
pub use provider::{DateRange, FundCode, PriceProvider};
pub use request::{BacktestMode, BacktestRequest, BacktestResponse, MultiBacktestRequest};
pub use strategy::{DayOfWeek, DividendDetector, Frequency, InvestmentScheduler};
