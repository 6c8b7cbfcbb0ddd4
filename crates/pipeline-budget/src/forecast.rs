//! Month-end spend forecasting.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Projection of month-end spend from the current trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendForecast {
    /// Month-to-date spend the forecast was computed from.
    pub month_to_date: f64,
    /// Average spend per elapsed day.
    pub daily_average: f64,
    /// Projected total spend at month end.
    pub projected_month_end: f64,
    /// Days elapsed in the month, including today.
    pub days_elapsed: u32,
    /// Days in the current month.
    pub days_in_month: u32,
}

/// Projects month-end spend from month-to-date spend.
pub trait Forecaster: Send + Sync {
    /// Compute the projection as of `now`.
    fn project(&self, month_to_date: f64, now: DateTime<Utc>) -> SpendForecast;
}

/// Straight-line forecaster: month-to-date average times days in month.
#[derive(Debug, Default)]
pub struct LinearForecaster;

impl LinearForecaster {
    /// Create the forecaster.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Forecaster for LinearForecaster {
    fn project(&self, month_to_date: f64, now: DateTime<Utc>) -> SpendForecast {
        let days_elapsed = now.day();
        let days_in_month = days_in_month(now.year(), now.month());
        let daily_average = month_to_date / f64::from(days_elapsed);
        SpendForecast {
            month_to_date,
            daily_average,
            projected_month_end: daily_average * f64::from(days_in_month),
            days_elapsed,
            days_in_month,
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map_or(30, |last| last.day())
}
