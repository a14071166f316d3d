//! Calendar windows used to bound aggregation.
//!
//! All windows are computed in UTC. A window's `end` is the last representable
//! instant before the next window starts, so filtering with `start <= t <= end`
//! never counts an entry twice.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub label: String,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    /// Inclusive on both ends.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }

    /// The calendar day containing `day`.
    pub fn day(day: NaiveDate, label: impl Into<String>) -> Self {
        Self::between(day, day + Duration::days(1), label)
    }

    /// The Monday-based week containing `day`.
    pub fn week(day: NaiveDate, label: impl Into<String>) -> Self {
        let monday = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
        Self::between(monday, monday + Duration::days(7), label)
    }

    /// The calendar month containing `day`.
    pub fn month(day: NaiveDate, label: impl Into<String>) -> Self {
        let first = first_of_month(day);
        Self::between(first, first + Months::new(1), label)
    }

    /// The calendar year containing `day`.
    pub fn year(day: NaiveDate, label: impl Into<String>) -> Self {
        let first = first_of_month(day).with_month(1).unwrap_or(first_of_month(day));
        Self::between(first, first + Months::new(12), label)
    }

    /// Calendar month `months_back` months before the one containing `now`.
    pub fn month_before(now: DateTime<Utc>, months_back: u32, label: impl Into<String>) -> Self {
        let first = first_of_month(now.date_naive()) - Months::new(months_back);
        Self::month(first, label)
    }

    fn between(from: NaiveDate, until: NaiveDate, label: impl Into<String>) -> Self {
        let start = midnight(from);
        let end = midnight(until) - Duration::nanoseconds(1);
        Self::new(start, end, label)
    }
}

fn first_of_month(day: NaiveDate) -> NaiveDate {
    day.with_day(1).unwrap_or(day)
}

fn midnight(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// The standard set of named windows, generated fresh from `now`.
pub fn named_ranges(now: DateTime<Utc>) -> Vec<DateRange> {
    let today = now.date_naive();
    let yesterday = today - Duration::days(1);
    let last_week = today - Duration::days(7);

    vec![
        DateRange::day(today, "Today"),
        DateRange::day(yesterday, "Yesterday"),
        DateRange::week(today, "This week"),
        DateRange::week(last_week, "Last week"),
        DateRange::month(today, "This month"),
        DateRange::month_before(now, 1, "Last month"),
        DateRange::year(today, "This year"),
    ]
}
