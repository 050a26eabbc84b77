use serde::{Deserialize, Serialize};

use crate::core::time::DateRange;

/// Bucket size of the recorder statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum PeriodGranularity {
    #[display("hour")]
    Hour,
    #[display("day")]
    Day,
    #[display("month")]
    Month,
}

impl PeriodGranularity {
    pub fn for_span_in_days(days: i64) -> Self {
        match days {
            d if d > 35 => PeriodGranularity::Month,
            d if d > 2 => PeriodGranularity::Day,
            _ => PeriodGranularity::Hour,
        }
    }

    pub fn for_range(range: &DateRange) -> Self {
        Self::for_span_in_days(range.span_in_days())
    }
}
