//! Input validation utilities.
//!
//! Clinical dates are recorded as three independent optional parts (year, month, day) so that
//! partially known dates ("March 2024", "the 12th of some month") can be stored. This module
//! validates those parts before they reach the store.

use crate::constants::{MAX_YEAR, MIN_YEAR};
use crate::{ClinicError, ClinicResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A possibly partial calendar date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DateParts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<i64>,
}

impl DateParts {
    pub fn new(year: Option<i64>, month: Option<i64>, day: Option<i64>) -> Self {
        Self { year, month, day }
    }

    pub fn ymd(year: i64, month: i64, day: i64) -> Self {
        Self::new(Some(year), Some(month), Some(day))
    }

    pub fn is_empty(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.day.is_none()
    }

    /// Returns these parts with every part set in `patch` replaced.
    pub fn merge(&self, patch: &DateParts) -> DateParts {
        DateParts {
            year: patch.year.or(self.year),
            month: patch.month.or(self.month),
            day: patch.day.or(self.day),
        }
    }
}

/// Number of days in `month`, using `year` for February when known.
///
/// Without a year February allows 29 days. `month` must already be in `1..=12`.
pub fn days_in_month(year: Option<i64>, month: i64) -> i64 {
    match month {
        4 | 6 | 9 | 11 => 30,
        2 => match year {
            Some(y) if is_leap_year(y) => 29,
            Some(_) => 28,
            None => 29,
        },
        _ => 31,
    }
}

fn is_leap_year(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Validates a possibly partial date.
///
/// All parts absent is valid. Otherwise each present part must be in range (year 1900..=3000,
/// month 1..=12, day 1..=31), a day must fit its month when both are given, and a fully
/// specified date must exist in the calendar.
///
/// # Arguments
///
/// * `parts` - The date parts to check.
/// * `label` - Human-readable name of the date, used as the prefix of error messages.
///
/// # Errors
///
/// Returns `ClinicError::InvalidInput` describing the first violated rule.
pub fn validate_date_parts(parts: &DateParts, label: &str) -> ClinicResult<()> {
    if parts.is_empty() {
        return Ok(());
    }

    let invalid = |msg: String| Err(ClinicError::InvalidInput(format!("{}: {}", label, msg)));

    if let Some(y) = parts.year {
        if !(MIN_YEAR..=MAX_YEAR).contains(&y) {
            return invalid(format!("year must be {}..{}", MIN_YEAR, MAX_YEAR));
        }
    }
    if let Some(m) = parts.month {
        if !(1..=12).contains(&m) {
            return invalid("month must be 1..12".into());
        }
    }
    if let Some(d) = parts.day {
        if !(1..=31).contains(&d) {
            return invalid("day must be 1..31".into());
        }
    }

    if let (Some(m), Some(d)) = (parts.month, parts.day) {
        let dim = days_in_month(parts.year, m);
        if d > dim {
            return match parts.year {
                Some(y) => invalid(format!("{}-{:02} has {} days; got {}", y, m, dim, d)),
                None => invalid(format!("month {} allows up to {} days; got {}", m, dim, d)),
            };
        }
    }

    if let (Some(y), Some(m), Some(d)) = (parts.year, parts.month, parts.day) {
        let exists = i32::try_from(y)
            .ok()
            .zip(u32::try_from(m).ok())
            .zip(u32::try_from(d).ok())
            .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
            .is_some();
        if !exists {
            return invalid(format!("{}-{:02}-{:02} is not a calendar date", y, m, d));
        }
    }

    Ok(())
}

/// Parses one date part from operator text.
///
/// Blank text means the part is absent.
///
/// # Errors
///
/// Returns `ClinicError::InvalidInput` if the text is not an integer.
pub fn parse_date_part(text: &str, name: &str, label: &str) -> ClinicResult<Option<i64>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<i64>().map(Some).map_err(|_| {
        ClinicError::InvalidInput(format!("{}: {} must be an integer or empty", label, name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(result: ClinicResult<()>) -> String {
        match result {
            Err(ClinicError::InvalidInput(msg)) => msg,
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn test_all_absent_is_valid() {
        assert!(validate_date_parts(&DateParts::default(), "date").is_ok());
    }

    #[test]
    fn test_partial_dates_are_valid() {
        assert!(validate_date_parts(&DateParts::new(Some(2024), None, None), "d").is_ok());
        assert!(validate_date_parts(&DateParts::new(None, Some(3), None), "d").is_ok());
        assert!(validate_date_parts(&DateParts::new(None, None, Some(31)), "d").is_ok());
    }

    #[test]
    fn test_range_checks_name_the_label() {
        assert_eq!(
            message(validate_date_parts(
                &DateParts::new(None, Some(13), None),
                "appointment date"
            )),
            "appointment date: month must be 1..12"
        );
        assert_eq!(
            message(validate_date_parts(&DateParts::new(Some(1899), None, None), "d")),
            "d: year must be 1900..3000"
        );
        assert_eq!(
            message(validate_date_parts(&DateParts::new(None, None, Some(0)), "d")),
            "d: day must be 1..31"
        );
    }

    #[test]
    fn test_day_of_month_limits() {
        assert_eq!(
            message(validate_date_parts(&DateParts::ymd(2023, 4, 31), "d")),
            "d: 2023-04 has 30 days; got 31"
        );
        assert_eq!(
            message(validate_date_parts(&DateParts::new(None, Some(2), Some(30)), "d")),
            "d: month 2 allows up to 29 days; got 30"
        );
        assert!(validate_date_parts(&DateParts::new(None, Some(2), Some(29)), "d").is_ok());
    }

    #[test]
    fn test_leap_years() {
        assert!(validate_date_parts(&DateParts::ymd(2024, 2, 29), "d").is_ok());
        assert!(validate_date_parts(&DateParts::ymd(2000, 2, 29), "d").is_ok());
        assert!(validate_date_parts(&DateParts::ymd(2023, 2, 29), "d").is_err());
        assert!(validate_date_parts(&DateParts::ymd(1900, 2, 29), "d").is_err());
    }

    #[test]
    fn test_merge_overrides_only_set_parts() {
        let stored = DateParts::ymd(2024, 1, 31);
        let merged = stored.merge(&DateParts::new(None, Some(2), None));

        assert_eq!(merged, DateParts::ymd(2024, 2, 31));
        assert!(validate_date_parts(&merged, "d").is_err());
    }

    #[test]
    fn test_parse_date_part() {
        assert_eq!(parse_date_part("  ", "year", "d").unwrap(), None);
        assert_eq!(parse_date_part(" 12 ", "month", "d").unwrap(), Some(12));
        assert_eq!(
            message(parse_date_part("May", "month", "visit").map(|_| ())),
            "visit: month must be an integer or empty"
        );
    }
}
