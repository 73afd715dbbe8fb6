//! Investment Strategies
//!
//! Purchase scheduling and dividend reinvestment rules.

mod dividend;
mod schedule;

pub use dividend::{DIVIDEND_TOLERANCE, Dividend, DividendDetector};
pub use schedule::{DayOfWeek, Frequency, InvestmentScheduler, WEEKLY_MIN_GAP_DAYS};
