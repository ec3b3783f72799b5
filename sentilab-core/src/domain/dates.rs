//! Date conversion at the system boundary.
//!
//! Dates arrive as text, either ISO (`2024-01-02`) or compact (`20240102`).
//! They are converted to `NaiveDate` immediately and all arithmetic happens on
//! the structured type. Subtracting from the compact integer form produces
//! non-dates such as `20240001`, so that form is only ever rendered, never
//! computed on.

use chrono::{Days, NaiveDate};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("invalid date '{0}': expected YYYY-MM-DD or YYYYMMDD")]
    Unparseable(String),

    #[error("date arithmetic out of range: {date} - {days} days")]
    OutOfRange { date: NaiveDate, days: u64 },
}

/// Parse an ISO or compact date. Rejects impossible calendar dates.
pub fn parse_date(text: &str) -> Result<NaiveDate, DateError> {
    let text = text.trim();
    let format = if text.len() == 8 && text.bytes().all(|b| b.is_ascii_digit()) {
        "%Y%m%d"
    } else {
        "%Y-%m-%d"
    };
    NaiveDate::parse_from_str(text, format).map_err(|_| DateError::Unparseable(text.to_string()))
}

/// Render a date in compact `YYYYMMDD` form.
pub fn to_compact(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Calendar-safe subtraction of whole days.
pub fn shift_back(date: NaiveDate, days: u64) -> Result<NaiveDate, DateError> {
    date.checked_sub_days(Days::new(days))
        .ok_or(DateError::OutOfRange { date, days })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn parses_both_formats() {
        assert_eq!(parse_date("2024-01-02").unwrap(), d(2024, 1, 2));
        assert_eq!(parse_date("20240102").unwrap(), d(2024, 1, 2));
        assert_eq!(parse_date(" 20240102 ").unwrap(), d(2024, 1, 2));
    }

    #[test]
    fn rejects_integer_subtraction_artifacts() {
        // 20240101 - 100 as an integer
        assert!(matches!(parse_date("20240001"), Err(DateError::Unparseable(_))));
        assert!(parse_date("20240100").is_err());
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("not-a-date").is_err());
    }

    #[test]
    fn shift_back_rolls_over_month_and_year() {
        assert_eq!(shift_back(d(2024, 1, 1), 100).unwrap(), d(2023, 9, 23));
        assert_eq!(shift_back(d(2024, 3, 1), 1).unwrap(), d(2024, 2, 29));
        assert_eq!(shift_back(d(2024, 1, 15), 50).unwrap(), d(2023, 11, 26));
    }

    #[test]
    fn shift_back_reports_underflow() {
        let result = shift_back(NaiveDate::MIN, 1);
        assert!(matches!(result, Err(DateError::OutOfRange { days: 1, .. })));
    }

    #[test]
    fn compact_roundtrip() {
        let date = d(2023, 9, 23);
        assert_eq!(to_compact(date), "20230923");
        assert_eq!(parse_date(&to_compact(date)).unwrap(), date);
    }
}
