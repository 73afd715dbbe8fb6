//! Investment Scheduler
//!
//! Decides on which trading days a periodic purchase happens.

use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};

/// Minimum gap between two weekly purchases
pub const WEEKLY_MIN_GAP_DAYS: i64 = 7;

/// Day of week, 0 = Sunday through 6 = Saturday
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub const SUNDAY: Self = Self(0);
    pub const MONDAY: Self = Self(1);
    pub const FRIDAY: Self = Self(5);

    pub const fn index(self) -> u8 {
        self.0
    }

    pub fn of(date: NaiveDate) -> Self {
        // num_days_from_sunday is always 0..=6
        Self(date.weekday().num_days_from_sunday() as u8)
    }
}

impl TryFrom<i64> for DayOfWeek {
    type Error = BacktestError;

    fn try_from(value: i64) -> Result<Self> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 6)
            .map(Self)
            .ok_or(BacktestError::InvalidWeekday(value))
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> Self {
        day.0
    }
}

/// Purchase cadence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Frequency {
    /// Every trading day
    Daily,

    /// On the given weekday. Without a weekday, any day at least
    /// [`WEEKLY_MIN_GAP_DAYS`] after the previous purchase.
    Weekly { weekday: Option<DayOfWeek> },

    /// First trading day of each calendar month
    Monthly,
}

impl Frequency {
    /// Build from the request's string form.
    ///
    /// The weekday is only read for `"weekly"`.
    pub fn parse(name: &str, weekday: Option<i64>) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => {
                let weekday = weekday.map(DayOfWeek::try_from).transpose()?;
                if weekday.is_none() {
                    tracing::debug!("weekly frequency without weekday, using 7-day gap");
                }
                Ok(Self::Weekly { weekday })
            }
            "monthly" => Ok(Self::Monthly),
            _ => Err(BacktestError::UnsupportedFrequency(name.to_string())),
        }
    }

    pub const fn weekly_on(weekday: DayOfWeek) -> Self {
        Self::Weekly {
            weekday: Some(weekday),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Daily => write!(f, "daily"),
            Self::Weekly { weekday: Some(day) } => write!(f, "weekly on day {}", day.index()),
            Self::Weekly { weekday: None } => write!(f, "weekly"),
            Self::Monthly => write!(f, "monthly"),
        }
    }
}

/// Purchase-day decision for one frequency
#[derive(Clone, Copy, Debug)]
pub struct InvestmentScheduler {
    frequency: Frequency,
}

impl InvestmentScheduler {
    pub const fn new(frequency: Frequency) -> Self {
        Self { frequency }
    }

    pub const fn frequency(&self) -> Frequency {
        self.frequency
    }

    /// Whether a purchase happens on `current`, given the previous purchase date
    pub fn should_invest(&self, current: NaiveDate, last_investment: Option<NaiveDate>) -> bool {
        match self.frequency {
            Frequency::Daily => true,
            Frequency::Weekly { weekday } => {
                if weekday.is_some_and(|day| DayOfWeek::of(current) != day) {
                    return false;
                }
                last_investment
                    .is_none_or(|last| (current - last).num_days() >= WEEKLY_MIN_GAP_DAYS)
            }
            Frequency::Monthly => last_investment.is_none_or(|last| {
                (current.year(), current.month()) > (last.year(), last.month())
            }),
        }
    }
}
