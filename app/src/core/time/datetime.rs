use std::fmt::Display;

use anyhow::Context;
use chrono::{NaiveDate, TimeZone};
use tokio::task_local;

task_local! {
    pub static FIXED_NOW: DateTime;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct DateTime {
    delegate: chrono::DateTime<chrono::Local>,
}

impl DateTime {
    fn new<T: TimeZone>(delegate: chrono::DateTime<T>) -> Self {
        Self {
            delegate: delegate.with_timezone(&chrono::Local),
        }
    }

    pub fn now() -> Self {
        FIXED_NOW
            .try_with(|t| *t)
            .unwrap_or_else(|_| chrono::Local::now().into())
    }

    pub fn from_iso(iso8601: &str) -> anyhow::Result<Self> {
        Ok(chrono::DateTime::parse_from_rfc3339(iso8601)
            .with_context(|| format!("Error parsing date-time {iso8601}"))?
            .into())
    }

    pub fn from_millis(millis: i64) -> Option<Self> {
        chrono::DateTime::from_timestamp_millis(millis).map(Self::new)
    }

    pub fn to_iso_string(&self) -> String {
        self.delegate.to_rfc3339()
    }

    pub fn date_in<Tz: TimeZone>(&self, tz: &Tz) -> NaiveDate {
        self.delegate.with_timezone(tz).date_naive()
    }

    /// Whole calendar days from `self` to `other` in the given timezone. Time of day is ignored.
    pub fn calendar_days_until_in<Tz: TimeZone>(&self, other: &DateTime, tz: &Tz) -> i64 {
        other
            .date_in(tz)
            .signed_duration_since(self.date_in(tz))
            .num_days()
    }

    pub fn calendar_days_until(&self, other: &DateTime) -> i64 {
        self.calendar_days_until_in(other, &chrono::Local)
    }

    pub fn elapsed_since(&self, since: Self) -> chrono::Duration {
        self.delegate - since.delegate
    }
}

impl Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.delegate.to_rfc3339())
    }
}

impl<T: TimeZone> From<chrono::DateTime<T>> for DateTime {
    fn from(val: chrono::DateTime<T>) -> Self {
        DateTime::new(val)
    }
}
