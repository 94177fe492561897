//! Period identifiers for summaries: calendar days (`YYYY-MM-DD`), ISO 8601
//! weeks (`YYYY-Wnn`) and months (`YYYY-MM`).

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use regex::Regex;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeriodError {
    #[error("Invalid date format. Use YYYY-MM-DD")]
    InvalidDate,

    #[error("Invalid week format. Use YYYY-Wnn (e.g., 2026-W01)")]
    InvalidWeek,

    #[error("Invalid month format. Use YYYY-MM (e.g., 2026-01)")]
    InvalidMonth,

    #[error("Cannot generate summary for future dates")]
    FutureDate,

    #[error("Cannot generate summary for future weeks")]
    FutureWeek,

    #[error("Cannot generate summary for future months")]
    FutureMonth,
}

fn capture_pair(pattern: &str, input: &str) -> Option<(i32, u32)> {
    let re = Regex::new(pattern).ok()?;
    let caps = re.captures(input)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let second = caps.get(2)?.as_str().parse().ok()?;
    Some((year, second))
}

/// Resolve a `date` query value. Absent or `"today"` selects `today`.
pub fn parse_day(raw: Option<&str>, today: NaiveDate) -> Result<NaiveDate, PeriodError> {
    let raw = match raw {
        None | Some("") | Some("today") => return Ok(today),
        Some(r) => r,
    };
    let re = Regex::new(r"^\d{4}-\d{2}-\d{2}$").map_err(|_| PeriodError::InvalidDate)?;
    if !re.is_match(raw) {
        return Err(PeriodError::InvalidDate);
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| PeriodError::InvalidDate)?;
    if date > today {
        return Err(PeriodError::FutureDate);
    }
    Ok(date)
}

/// "Monday, January 5, 2026"
pub fn display_day(date: NaiveDate) -> String {
    date.format("%A, %B %-d, %Y").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WeekId {
    pub year: i32,
    pub week: u32,
}

impl WeekId {
    pub fn parse(raw: &str) -> Result<Self, PeriodError> {
        let (year, week) = capture_pair(r"^(\d{4})-W(\d{2})$", raw).ok_or(PeriodError::InvalidWeek)?;
        // Rejects W00 and W53 in years with only 52 ISO weeks.
        NaiveDate::from_isoywd_opt(year, week, Weekday::Mon).ok_or(PeriodError::InvalidWeek)?;
        Ok(Self { year, week })
    }

    /// Resolve a `week` query value. Absent or `"current"` selects the week
    /// containing `today`; future weeks are rejected.
    pub fn resolve(raw: Option<&str>, today: NaiveDate) -> Result<Self, PeriodError> {
        let id = match raw {
            None | Some("") | Some("current") => Self::containing(today),
            Some(r) => Self::parse(r)?,
        };
        if id.is_future(today) {
            return Err(PeriodError::FutureWeek);
        }
        Ok(id)
    }

    pub fn containing(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    /// Monday and Sunday of the week.
    pub fn range(&self) -> (NaiveDate, NaiveDate) {
        // parse() and containing() only build valid weeks
        let start = NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
            .unwrap_or(NaiveDate::MIN);
        (start, start + Duration::days(6))
    }

    pub fn is_future(&self, today: NaiveDate) -> bool {
        self.range().0 > today
    }

    pub fn previous(&self) -> Self {
        Self::containing(self.range().0 - Duration::days(7))
    }

    pub fn next(&self) -> Self {
        Self::containing(self.range().0 + Duration::days(7))
    }

    /// "Jan 5 - 11, 2026" or "Dec 29 - Jan 4, 2026"
    pub fn display_range(&self) -> String {
        let (start, end) = self.range();
        if start.month() == end.month() {
            format!("{} {} - {}, {}", start.format("%b"), start.day(), end.day(), end.year())
        } else {
            format!(
                "{} {} - {} {}, {}",
                start.format("%b"),
                start.day(),
                end.format("%b"),
                end.day(),
                end.year()
            )
        }
    }
}

impl fmt::Display for WeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthId {
    pub year: i32,
    pub month: u32,
}

impl MonthId {
    pub fn parse(raw: &str) -> Result<Self, PeriodError> {
        let (year, month) = capture_pair(r"^(\d{4})-(\d{2})$", raw).ok_or(PeriodError::InvalidMonth)?;
        NaiveDate::from_ymd_opt(year, month, 1).ok_or(PeriodError::InvalidMonth)?;
        Ok(Self { year, month })
    }

    pub fn resolve(raw: Option<&str>, today: NaiveDate) -> Result<Self, PeriodError> {
        let id = match raw {
            None | Some("") | Some("current") => Self::containing(today),
            Some(r) => Self::parse(r)?,
        };
        if id.is_future(today) {
            return Err(PeriodError::FutureMonth);
        }
        Ok(id)
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// First and last calendar day of the month.
    pub fn range(&self) -> (NaiveDate, NaiveDate) {
        let start = NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MIN);
        let end = self.next().range().0 - Duration::days(1);
        (start, end)
    }

    pub fn is_future(&self, today: NaiveDate) -> bool {
        *self > Self::containing(today)
    }

    pub fn previous(&self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    /// "January 2026"
    pub fn display_range(&self) -> String {
        self.range().0.format("%B %Y").to_string()
    }
}

impl fmt::Display for MonthId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}
