//! Report date-range validation.

use std::sync::OnceLock;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::Serialize;

use crate::error::{ReportError, ReportResult};

/// Longest range a report may cover.
pub const MAX_RANGE_DAYS: i64 = 120;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// An inclusive range of calendar days, checked to be well formed,
/// ordered and no longer than [`MAX_RANGE_DAYS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn parse(date_start: &str, date_end: &str) -> ReportResult<Self> {
        let start = parse_day(date_start, "Start")?;
        let end = parse_day(date_end, "End")?;

        if end < start {
            return Err(ReportError::validation(
                "The end date must be ahead of the start date.",
            ));
        }

        if end - start > Duration::days(MAX_RANGE_DAYS) {
            return Err(ReportError::validation(format!(
                "Date range limited to {} days.",
                MAX_RANGE_DAYS
            )));
        }

        Ok(Self { start, end })
    }

    /// First instant of the range.
    pub fn lower_bound(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// First instant after the range; the end day is included in full.
    pub fn upper_bound_exclusive(&self) -> NaiveDateTime {
        (self.end + Duration::days(1)).and_time(NaiveTime::MIN)
    }
}

fn day_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date pattern"))
}

/// Parse a zero-padded `YYYY-MM-DD` day. Anything else is `None`.
pub fn parse_strict_day(value: &str) -> Option<NaiveDate> {
    if !day_pattern().is_match(value) {
        return None;
    }
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

fn parse_day(value: &str, label: &str) -> ReportResult<NaiveDate> {
    parse_strict_day(value).ok_or_else(|| {
        ReportError::validation(format!(
            "Please provide a {} date. It must be in the format yyyy-mm-dd.",
            label
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_validation(result: ReportResult<DateRange>) -> bool {
        matches!(result, Err(ReportError::Validation(_)))
    }

    #[test]
    fn test_malformed_dates_fail() {
        assert!(is_validation(DateRange::parse("2023-13-01", "2023-01-05")));
        assert!(is_validation(DateRange::parse("2023-1-5", "2023-01-05")));
        assert!(is_validation(DateRange::parse("", "2023-01-05")));
        assert!(is_validation(DateRange::parse("2023-01-01", "2023-02-30")));
    }

    #[test]
    fn test_end_before_start_fails() {
        assert!(is_validation(DateRange::parse("2023-06-01", "2023-01-01")));
        assert!(is_validation(DateRange::parse("2023-05-01", "2023-01-01")));
    }

    #[test]
    fn test_range_limit() {
        assert!(DateRange::parse("2023-01-01", "2023-05-01").is_ok());
        assert!(is_validation(DateRange::parse("2023-01-01", "2023-05-02")));
    }

    #[test]
    fn test_valid_range_bounds() {
        let range = DateRange::parse("2023-01-01", "2023-02-01").unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(
            range.upper_bound_exclusive(),
            NaiveDate::from_ymd_opt(2023, 2, 2)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
    }

    #[test]
    fn test_single_day_range() {
        let range = DateRange::parse("2023-03-10", "2023-03-10").unwrap();
        assert_eq!(range.upper_bound_exclusive() - range.lower_bound(), Duration::days(1));
    }
}
