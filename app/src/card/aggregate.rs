use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::core::number::{format_fixed, format_grouped};
use crate::core::time::DateRange;
use crate::port::{HostConnection, RawStatisticPoint, StatisticType, StatisticsQuery};

use super::{AggregatedValue, PeriodGranularity, UNAVAILABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationKind {
    /// Sum of the per-bucket changes, used for energy meters.
    SumOfChanges,
    /// Average of the per-bucket means, used for outdoor conditions.
    WeightedMean,
}

impl AggregationKind {
    fn statistic_type(&self) -> StatisticType {
        match self {
            AggregationKind::SumOfChanges => StatisticType::Change,
            AggregationKind::WeightedMean => StatisticType::Mean,
        }
    }
}

/// Weight of a bucket when averaging means.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeanWeighting {
    #[default]
    Uniform,
    Duration,
}

impl MeanWeighting {
    fn weight_of(&self, point: &RawStatisticPoint) -> f64 {
        match (self, point.start, point.end) {
            (MeanWeighting::Duration, Some(start), Some(end)) if end > start => {
                end.elapsed_since(start).num_seconds() as f64
            }
            _ => 1.0,
        }
    }
}

pub struct StatisticsAggregator<H> {
    host: Arc<H>,
    weighting: MeanWeighting,
}

impl<H: HostConnection> StatisticsAggregator<H> {
    pub fn new(host: Arc<H>, weighting: MeanWeighting) -> Self {
        Self { host, weighting }
    }

    /// Queries the statistics of one entity and reduces them to a display value.
    ///
    /// `Ok(None)` means there was nothing to average and the displayed value should stay as it is.
    #[tracing::instrument(skip(self, range), fields(range = %range))]
    pub async fn aggregate(
        &self,
        entity_id: &str,
        range: &DateRange,
        period: PeriodGranularity,
        kind: AggregationKind,
    ) -> anyhow::Result<Option<AggregatedValue>> {
        let query = StatisticsQuery::new(entity_id, range, period, kind.statistic_type());

        let mut result = self
            .host
            .statistics_during_period(query)
            .await
            .with_context(|| format!("Error querying {} statistics of {}", kind.statistic_type(), entity_id))?;

        let points = result.remove(entity_id).unwrap_or_default();
        tracing::debug!("Received {} {} buckets for {}", points.len(), period, entity_id);

        let formatted = match kind {
            AggregationKind::SumOfChanges => Some(format_grouped(sum_of_changes(&points))),
            AggregationKind::WeightedMean => weighted_mean(&points, self.weighting).map(|mean| format_fixed(mean, 1)),
        };

        Ok(formatted.map(|value| AggregatedValue::new(value, self.unit_of(entity_id))))
    }

    fn unit_of(&self, entity_id: &str) -> String {
        self.host
            .current_state(entity_id)
            .and_then(|state| state.unit_of_measurement)
            .unwrap_or_else(|| UNAVAILABLE.to_string())
    }
}

/// Buckets without a change value count as zero.
pub fn sum_of_changes(points: &[RawStatisticPoint]) -> f64 {
    points.iter().filter_map(|p| p.change).sum()
}

/// `None` if no bucket carries a mean.
pub fn weighted_mean(points: &[RawStatisticPoint], weighting: MeanWeighting) -> Option<f64> {
    let (weighted_sum, total_weight) = points
        .iter()
        .filter_map(|p| p.mean.map(|mean| (mean, weighting.weight_of(p))))
        .fold((0.0, 0.0), |(sum, total), (mean, weight)| (sum + mean * weight, total + weight));

    if total_weight > 0.0 {
        Some(weighted_sum / total_weight)
    } else {
        None
    }
}
