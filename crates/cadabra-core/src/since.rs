//! Report window selectors
//!
//! A selector names the earliest join date a report should consider,
//! relative to "now" in the reporting time zone.

use jiff::{SignedDuration, Timestamp, ToSpan, Zoned};
use serde::{Deserialize, Serialize};

/// Lower bound on user join dates for a report
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
pub enum SinceSelector {
    #[serde(rename = "recent_hour")]
    #[strum(serialize = "recent_hour")]
    RecentHour,
    #[serde(rename = "recent_day")]
    #[strum(serialize = "recent_day")]
    RecentDay,
    #[default]
    #[serde(rename = "recent_week")]
    #[strum(serialize = "recent_week")]
    RecentWeek,
    #[serde(rename = "recent_month")]
    #[strum(serialize = "recent_month")]
    RecentMonth,
    #[serde(rename = "recent_3months")]
    #[strum(serialize = "recent_3months")]
    Recent3Months,
    #[serde(rename = "recent_6months")]
    #[strum(serialize = "recent_6months")]
    Recent6Months,
    #[serde(rename = "recent_year")]
    #[strum(serialize = "recent_year")]
    RecentYear,
    #[serde(rename = "start_of_day")]
    #[strum(serialize = "start_of_day")]
    StartOfDay,
    #[serde(rename = "start_of_week")]
    #[strum(serialize = "start_of_week")]
    StartOfWeek,
    #[serde(rename = "start_of_month")]
    #[strum(serialize = "start_of_month")]
    StartOfMonth,
    #[serde(rename = "start_of_year")]
    #[strum(serialize = "start_of_year")]
    StartOfYear,
    #[serde(rename = "alltime")]
    #[strum(serialize = "alltime")]
    AllTime,
}

impl SinceSelector {
    /// Every selector, in menu order
    pub const ALL: [Self; 12] = [
        Self::RecentHour,
        Self::RecentDay,
        Self::RecentWeek,
        Self::RecentMonth,
        Self::Recent3Months,
        Self::Recent6Months,
        Self::RecentYear,
        Self::StartOfDay,
        Self::StartOfWeek,
        Self::StartOfMonth,
        Self::StartOfYear,
        Self::AllTime,
    ];

    /// Human-readable description for report headers
    pub const fn description(self) -> &'static str {
        match self {
            Self::RecentHour => "in the last hour",
            Self::RecentDay => "in the last 24 hours",
            Self::RecentWeek => "in the last 7 days",
            Self::RecentMonth => "in the last 30 days",
            Self::Recent3Months => "in the last 90 days",
            Self::Recent6Months => "in the last 180 days",
            Self::RecentYear => "in the last 365 days",
            Self::StartOfDay => "since the beginning of today",
            Self::StartOfWeek => "since the beginning of the week",
            Self::StartOfMonth => "since the beginning of the month",
            Self::StartOfYear => "since the beginning of the year",
            Self::AllTime => "since the beginning of time",
        }
    }

    /// Resolve the selector against `now`
    ///
    /// Rolling windows count whole hours back from `now`; calendar selectors
    /// start at midnight in the time zone of `now` (weeks start on Monday).
    /// `AllTime` has no bound and resolves to `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting instant is out of range
    pub fn resolve(self, now: &Zoned) -> Result<Option<Timestamp>, jiff::Error> {
        let rolling = |hours: i64| now.timestamp().checked_sub(SignedDuration::from_hours(hours)).map(Some);

        match self {
            Self::RecentHour => rolling(1),
            Self::RecentDay => rolling(24),
            Self::RecentWeek => rolling(7 * 24),
            Self::RecentMonth => rolling(30 * 24),
            Self::Recent3Months => rolling(90 * 24),
            Self::Recent6Months => rolling(180 * 24),
            Self::RecentYear => rolling(365 * 24),
            Self::StartOfDay => Ok(Some(now.start_of_day()?.timestamp())),
            Self::StartOfWeek => {
                let since_monday = i64::from(now.weekday().to_monday_zero_offset());
                let monday = now.start_of_day()?.checked_sub(since_monday.days())?;
                Ok(Some(monday.timestamp()))
            }
            Self::StartOfMonth => Ok(Some(now.first_of_month()?.start_of_day()?.timestamp())),
            Self::StartOfYear => Ok(Some(now.first_of_year()?.start_of_day()?.timestamp())),
            Self::AllTime => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn wednesday_afternoon() -> Zoned {
        "2024-03-13T15:30:00+00:00[UTC]".parse().unwrap()
    }

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn parses_every_selector_name() {
        for selector in SinceSelector::ALL {
            let name = selector.to_string();
            assert_eq!(SinceSelector::from_str(&name).unwrap(), selector);
        }
        assert_eq!(SinceSelector::from_str("recent_3months").unwrap(), SinceSelector::Recent3Months);
        assert!(SinceSelector::from_str("recent_decade").is_err());
    }

    #[test]
    fn rolling_windows_count_back_from_now() {
        let now = wednesday_afternoon();
        assert_eq!(
            SinceSelector::RecentHour.resolve(&now).unwrap(),
            Some(ts("2024-03-13T14:30:00Z"))
        );
        assert_eq!(
            SinceSelector::RecentWeek.resolve(&now).unwrap(),
            Some(ts("2024-03-06T15:30:00Z"))
        );
        assert_eq!(
            SinceSelector::RecentMonth.resolve(&now).unwrap(),
            Some(ts("2024-02-12T15:30:00Z"))
        );
    }

    #[test]
    fn calendar_selectors_start_at_midnight() {
        let now = wednesday_afternoon();
        assert_eq!(
            SinceSelector::StartOfDay.resolve(&now).unwrap(),
            Some(ts("2024-03-13T00:00:00Z"))
        );
        assert_eq!(
            SinceSelector::StartOfWeek.resolve(&now).unwrap(),
            Some(ts("2024-03-11T00:00:00Z"))
        );
        assert_eq!(
            SinceSelector::StartOfMonth.resolve(&now).unwrap(),
            Some(ts("2024-03-01T00:00:00Z"))
        );
        assert_eq!(
            SinceSelector::StartOfYear.resolve(&now).unwrap(),
            Some(ts("2024-01-01T00:00:00Z"))
        );
    }

    #[test]
    fn start_of_week_on_monday_is_same_day() {
        let monday: Zoned = "2024-03-11T09:00:00+00:00[UTC]".parse().unwrap();
        assert_eq!(
            SinceSelector::StartOfWeek.resolve(&monday).unwrap(),
            Some(ts("2024-03-11T00:00:00Z"))
        );
    }

    #[test]
    fn alltime_has_no_bound() {
        assert_eq!(SinceSelector::AllTime.resolve(&wednesday_afternoon()).unwrap(), None);
    }

    #[test]
    fn deserializes_from_config_strings() {
        let selector: SinceSelector = serde_json::from_str("\"recent_6months\"").unwrap();
        assert_eq!(selector, SinceSelector::Recent6Months);
        assert_eq!(SinceSelector::default(), SinceSelector::RecentWeek);
    }
}
