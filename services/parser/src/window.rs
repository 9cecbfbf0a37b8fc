//! Date windows used to bound aggregation and comparison

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::str::FromStr;

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// `None` when `start` is after `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn intersect(&self, other: &DateRange) -> Option<DateRange> {
        DateRange::new(self.start.max(other.start), self.end.min(other.end))
    }
}

/// User-selected date filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateWindow {
    Last7Days,
    Last30Days,
    CurrentMonth,
    #[default]
    AllTime,
    Explicit { start: NaiveDate, end: NaiveDate },
}

impl DateWindow {
    /// Resolve against the data bounds and today's date.
    ///
    /// Relative windows end today; every window is clipped to `bounds`.
    /// Returns `None` when nothing of the window overlaps the data.
    pub fn resolve(&self, bounds: DateRange, today: NaiveDate) -> Option<DateRange> {
        let wanted = match *self {
            DateWindow::Last7Days => DateRange::new(today - Duration::days(6), today)?,
            DateWindow::Last30Days => DateRange::new(today - Duration::days(29), today)?,
            DateWindow::CurrentMonth => DateRange::new(month_start(today), today)?,
            DateWindow::AllTime => bounds,
            DateWindow::Explicit { start, end } => DateRange::new(start, end)?,
        };
        wanted.intersect(&bounds)
    }
}

impl FromStr for DateWindow {
    type Err = String;

    /// `7d`, `30d`, `month`, `all`, or `YYYY-MM-DD..YYYY-MM-DD`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "7d" | "last7" | "last_7_days" => Ok(DateWindow::Last7Days),
            "30d" | "last30" | "last_30_days" => Ok(DateWindow::Last30Days),
            "month" | "current_month" => Ok(DateWindow::CurrentMonth),
            "" | "all" | "all_time" => Ok(DateWindow::AllTime),
            other => {
                let (a, b) = other
                    .split_once("..")
                    .ok_or_else(|| format!("unknown date window '{}'", s))?;
                let start = NaiveDate::parse_from_str(a.trim(), "%Y-%m-%d")
                    .map_err(|e| format!("invalid window start '{}': {}", a, e))?;
                let end = NaiveDate::parse_from_str(b.trim(), "%Y-%m-%d")
                    .map_err(|e| format!("invalid window end '{}': {}", b, e))?;
                if start > end {
                    return Err(format!("window start {} is after end {}", start, end));
                }
                Ok(DateWindow::Explicit { start, end })
            }
        }
    }
}

// =============================================================================
// CALENDAR HELPERS
// =============================================================================

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn previous_month_start(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 1 {
        (date.year() - 1, 12)
    } else {
        (date.year(), date.month() - 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(date)
}

/// Last day of the previous calendar month: KPIs stop here so the
/// incomplete current month never skews them.
pub fn previous_month_end(date: NaiveDate) -> NaiveDate {
    month_start(date) - Duration::days(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bounds() -> DateRange {
        DateRange::new(ymd(2024, 1, 1), ymd(2024, 6, 30)).unwrap()
    }

    #[test]
    fn test_range_rejects_inverted() {
        assert!(DateRange::new(ymd(2024, 2, 1), ymd(2024, 1, 1)).is_none());
        let r = DateRange::new(ymd(2024, 1, 1), ymd(2024, 1, 1)).unwrap();
        assert!(r.contains(ymd(2024, 1, 1)));
    }

    #[test]
    fn test_last_7_days_is_inclusive_of_today() {
        let r = DateWindow::Last7Days.resolve(bounds(), ymd(2024, 6, 10)).unwrap();
        assert_eq!(r, DateRange::new(ymd(2024, 6, 4), ymd(2024, 6, 10)).unwrap());
    }

    #[test]
    fn test_last_30_days_clipped_to_data() {
        let r = DateWindow::Last30Days.resolve(bounds(), ymd(2024, 7, 15)).unwrap();
        assert_eq!(r, DateRange::new(ymd(2024, 6, 16), ymd(2024, 6, 30)).unwrap());
    }

    #[test]
    fn test_current_month() {
        let r = DateWindow::CurrentMonth.resolve(bounds(), ymd(2024, 3, 20)).unwrap();
        assert_eq!(r, DateRange::new(ymd(2024, 3, 1), ymd(2024, 3, 20)).unwrap());
    }

    #[test]
    fn test_window_outside_data_is_none() {
        assert!(DateWindow::Last7Days.resolve(bounds(), ymd(2025, 1, 1)).is_none());
        let explicit = DateWindow::Explicit { start: ymd(2023, 1, 1), end: ymd(2023, 12, 31) };
        assert!(explicit.resolve(bounds(), ymd(2024, 1, 1)).is_none());
    }

    #[test]
    fn test_all_time_is_bounds() {
        assert_eq!(DateWindow::AllTime.resolve(bounds(), ymd(2030, 1, 1)), Some(bounds()));
    }

    #[test]
    fn test_parse_windows() {
        assert_eq!("7d".parse::<DateWindow>(), Ok(DateWindow::Last7Days));
        assert_eq!("30D".parse::<DateWindow>(), Ok(DateWindow::Last30Days));
        assert_eq!("month".parse::<DateWindow>(), Ok(DateWindow::CurrentMonth));
        assert_eq!("all".parse::<DateWindow>(), Ok(DateWindow::AllTime));
        assert_eq!(
            "2024-01-01..2024-03-31".parse::<DateWindow>(),
            Ok(DateWindow::Explicit { start: ymd(2024, 1, 1), end: ymd(2024, 3, 31) })
        );
        assert!("2024-03-31..2024-01-01".parse::<DateWindow>().is_err());
        assert!("yesterday".parse::<DateWindow>().is_err());
    }

    #[test]
    fn test_previous_month_helpers() {
        assert_eq!(previous_month_end(ymd(2024, 3, 15)), ymd(2024, 2, 29));
        assert_eq!(previous_month_end(ymd(2024, 1, 1)), ymd(2023, 12, 31));
        assert_eq!(previous_month_start(ymd(2024, 1, 20)), ymd(2023, 12, 1));
        assert_eq!(month_start(ymd(2024, 5, 31)), ymd(2024, 5, 1));
    }
}
