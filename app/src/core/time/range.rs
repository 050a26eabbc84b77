use std::fmt::Display;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use super::DateTime;

/// A selected date range. A missing end means the range is still ongoing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDateRange")]
pub struct DateRange {
    start: DateTime,
    end: Option<DateTime>,
}

#[derive(Deserialize)]
struct RawDateRange {
    start: DateTime,
    #[serde(default)]
    end: Option<DateTime>,
}

impl TryFrom<RawDateRange> for DateRange {
    type Error = anyhow::Error;

    fn try_from(raw: RawDateRange) -> Result<Self, Self::Error> {
        DateRange::new(raw.start, raw.end)
    }
}

impl DateRange {
    pub fn new(start: DateTime, end: Option<DateTime>) -> anyhow::Result<Self> {
        if let Some(end) = end {
            if start > end {
                bail!("Range start {start} is after its end {end}");
            }
        }

        Ok(Self { start, end })
    }

    pub fn open(start: DateTime) -> Self {
        Self { start, end: None }
    }

    pub fn start(&self) -> &DateTime {
        &self.start
    }

    pub fn end(&self) -> Option<&DateTime> {
        self.end.as_ref()
    }

    /// Span in whole calendar days. An open range is measured up to now.
    pub fn span_in_days(&self) -> i64 {
        let end = self.end.unwrap_or_else(DateTime::now);
        self.start.calendar_days_until(&end)
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.end {
            Some(end) => write!(f, "{} - {}", self.start, end),
            None => write!(f, "{} - open", self.start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::FIXED_NOW;

    fn dt(iso: &str) -> DateTime {
        DateTime::from_iso(iso).unwrap()
    }

    #[test]
    fn start_after_end_is_rejected() {
        let result = DateRange::new(dt("2024-11-05T12:00:00Z"), Some(dt("2024-11-03T12:00:00Z")));

        assert!(result.is_err());
    }

    #[test]
    fn empty_range_is_accepted() {
        let at = dt("2024-11-05T12:00:00Z");

        let range = DateRange::new(at, Some(at)).unwrap();

        assert_eq!(range.span_in_days(), 0);
    }

    #[test]
    fn span_counts_calendar_days() {
        let range = DateRange::new(dt("2024-11-01T12:00:00Z"), Some(dt("2024-11-11T12:00:00Z"))).unwrap();

        assert_eq!(range.span_in_days(), 10);
    }

    #[tokio::test]
    async fn open_range_is_measured_until_now() {
        let range = DateRange::open(dt("2024-11-01T12:00:00Z"));

        let span = FIXED_NOW
            .scope(dt("2024-11-04T12:00:00Z"), async { range.span_in_days() })
            .await;

        assert_eq!(span, 3);
    }

    #[test]
    fn deserializes_with_optional_end() {
        let open: DateRange = serde_json::from_str(r#"{"start": "2024-11-01T12:00:00Z"}"#).unwrap();
        let closed: DateRange =
            serde_json::from_str(r#"{"start": "2024-11-01T12:00:00Z", "end": "2024-11-02T12:00:00Z"}"#).unwrap();

        assert_eq!(open.end(), None);
        assert_eq!(closed.end(), Some(&dt("2024-11-02T12:00:00Z")));
    }

    #[test]
    fn deserialization_rejects_inverted_range() {
        let result =
            serde_json::from_str::<DateRange>(r#"{"start": "2024-11-03T12:00:00Z", "end": "2024-11-02T12:00:00Z"}"#);

        assert!(result.is_err());
    }
}
