use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::card::PeriodGranularity;
use crate::core::time::{DateRange, DateTime};

pub type RangeCallback = Box<dyn Fn(DateRange) + Send + Sync>;
pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Broadcasts the currently selected date range.
pub trait RangePublisher: Send + Sync {
    /// The callback may be invoked immediately with the current selection and afterwards on every change.
    fn subscribe(&self, callback: RangeCallback) -> Unsubscribe;
}

/// Everything the card needs from the system it is attached to.
pub trait HostConnection: Send + Sync + 'static {
    fn range_publisher(&self, key: &str) -> Option<Arc<dyn RangePublisher>>;

    fn current_state(&self, entity_id: &str) -> Option<EntityState>;

    fn statistics_during_period(
        &self,
        query: StatisticsQuery,
    ) -> impl Future<Output = anyhow::Result<StatisticsResult>> + Send;
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntityState {
    pub value: String,
    pub unit_of_measurement: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum StatisticType {
    #[display("change")]
    Change,
    #[display("mean")]
    Mean,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatisticsQuery {
    pub entity_ids: Vec<String>,
    pub start: DateTime,
    pub end: Option<DateTime>,
    pub period: PeriodGranularity,
    pub types: Vec<StatisticType>,
}

impl StatisticsQuery {
    pub fn new(entity_id: &str, range: &DateRange, period: PeriodGranularity, statistic: StatisticType) -> Self {
        Self {
            entity_ids: vec![entity_id.to_string()],
            start: *range.start(),
            end: range.end().copied(),
            period,
            types: vec![statistic],
        }
    }
}

/// One recorder bucket. Only the requested statistic types are filled in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStatisticPoint {
    pub start: Option<DateTime>,
    pub end: Option<DateTime>,
    pub change: Option<f64>,
    pub mean: Option<f64>,
}

pub type StatisticsResult = HashMap<String, Vec<RawStatisticPoint>>;
