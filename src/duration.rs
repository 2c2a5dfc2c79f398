//! Refresh intervals expressed as iCalendar durations (`P1W`, `PT6H`...)
//!
//! The duration grammar itself is handled by the `iso8601` crate. This module only turns
//! a parsed duration into a flat number of seconds, with a month counted as 30 days and a
//! year as 365 days.

use std::fmt::{Display, Formatter};

use crate::error::{WebcalError, WebcalResult};

const MINUTE: i64 = 60;
const HOUR: i64 = 60 * MINUTE;
const DAY: i64 = 24 * HOUR;
const WEEK: i64 = 7 * DAY;
const MONTH: i64 = 30 * DAY;
const YEAR: i64 = 365 * DAY;

/// A parsed refresh interval
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DurationInterval {
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

impl DurationInterval {
    /// Parse a duration such as `P1W` or `PT1H30M`.
    ///
    /// Negative durations are refused, since they make no sense as a refresh rate.
    pub fn parse(value: &str) -> WebcalResult<Self> {
        let trimmed = value.trim();
        let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);

        let well_formed = unsigned.starts_with('P')
            && unsigned.len() > 1
            && unsigned.chars().all(|c| c.is_ascii_digit() || "PTYMWDHS.,".contains(c));
        if well_formed == false {
            return Err(WebcalError::InvalidRefreshRate(value.to_string()));
        }

        let parsed = iso8601::duration(unsigned)
            .map_err(|_| WebcalError::InvalidRefreshRate(value.to_string()))?;

        Ok(match parsed {
            iso8601::Duration::Weeks(weeks) => Self { weeks, ..Self::default() },
            iso8601::Duration::YMDHMS { year, month, day, hour, minute, second, .. } => Self {
                years: year,
                months: month,
                weeks: 0,
                days: day,
                hours: hour,
                minutes: minute,
                seconds: second,
            },
        })
    }

    /// The interval as a number of seconds
    pub fn as_seconds(&self) -> i64 {
        i64::from(self.seconds)
            + i64::from(self.minutes) * MINUTE
            + i64::from(self.hours) * HOUR
            + i64::from(self.days) * DAY
            + i64::from(self.weeks) * WEEK
            + i64::from(self.months) * MONTH
            + i64::from(self.years) * YEAR
    }

    /// Whether `value` is a usable refresh rate
    pub fn is_valid(value: &str) -> bool {
        Self::parse(value).is_ok()
    }
}

impl Display for DurationInterval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}s", self.as_seconds())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_refresh_rate_is_a_week() {
        let interval = DurationInterval::parse(crate::config::DEFAULT_REFRESH_RATE).unwrap();
        assert_eq!(interval.as_seconds(), 604800);
    }

    #[test]
    fn test_fixed_approximations() {
        assert_eq!(DurationInterval::parse("P1M").unwrap().as_seconds(), 30 * 86400);
        assert_eq!(DurationInterval::parse("P1Y").unwrap().as_seconds(), 365 * 86400);
        assert_eq!(DurationInterval::parse("P1D").unwrap().as_seconds(), 86400);
        assert_eq!(DurationInterval::parse("PT1H30M").unwrap().as_seconds(), 5400);
        assert_eq!(DurationInterval::parse("P1DT12H").unwrap().as_seconds(), 129600);
        assert_eq!(DurationInterval::parse("+PT15M").unwrap().as_seconds(), 900);
    }

    #[test]
    fn test_invalid_durations() {
        assert!(DurationInterval::parse("").is_err());
        assert!(DurationInterval::parse("P").is_err());
        assert!(DurationInterval::parse("weekly").is_err());
        assert!(DurationInterval::parse("-PT1H").is_err());
        assert!(DurationInterval::parse("1W").is_err());
        assert_eq!(DurationInterval::is_valid("PT2H"), true);
    }
}
