use std::future::Future;
use std::sync::Arc;

use infrastructure::meter;
use serde::Deserialize;
use tokio::sync::{mpsc, watch};

use crate::core::number::{format_grouped, parse_localized};
use crate::core::time::DateRange;
use crate::port::HostConnection;

use super::aggregate::{AggregationKind, MeanWeighting, StatisticsAggregator};
use super::bridge::{DiscoveryTiming, RangeSubscriptionBridge};
use super::cop::coefficient_of_performance;
use super::state::{AggregatedValue, CardState, Phase};
use super::{CardConfiguration, EntityRef, PeriodGranularity, UNAVAILABLE};

/// How queued range changes are worked off. A running refresh is never interrupted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// Every range change is refreshed, in dispatch order.
    #[default]
    Sequential,
    /// Only the newest of the queued range changes is refreshed.
    Latest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outdoor {
    Temperature,
    Humidity,
}

/// Drives the card through its lifecycle and owns the displayed state.
pub struct RefreshOrchestrator<H: HostConnection> {
    config: Arc<CardConfiguration>,
    policy: RefreshPolicy,
    weighting: MeanWeighting,
    timing: DiscoveryTiming,
    host: Option<Arc<H>>,
    aggregator: Option<StatisticsAggregator<H>>,
    bridge: Option<RangeSubscriptionBridge>,
    state: watch::Sender<CardState>,
    range_tx: mpsc::UnboundedSender<DateRange>,
    range_rx: mpsc::UnboundedReceiver<DateRange>,
}

impl<H: HostConnection> RefreshOrchestrator<H> {
    pub fn new(config: Arc<CardConfiguration>, policy: RefreshPolicy, weighting: MeanWeighting) -> Self {
        let (state, _) = watch::channel(CardState::default());
        let (range_tx, range_rx) = mpsc::unbounded_channel();

        Self {
            config,
            policy,
            weighting,
            timing: DiscoveryTiming::default(),
            host: None,
            aggregator: None,
            bridge: None,
            state,
            range_tx,
            range_rx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CardState> {
        self.state.subscribe()
    }

    pub fn phase(&self) -> Phase {
        self.state.borrow().phase
    }

    pub fn state(&self) -> CardState {
        self.state.borrow().clone()
    }

    /// Seeds the displayed values from the current states and starts listening for range changes.
    pub fn on_attach(&mut self, host: Arc<H>) {
        if self.phase() != Phase::Uninitialized {
            tracing::debug!("Ignoring attach in phase {}", self.phase());
            return;
        }

        self.set_phase(Phase::Initializing);

        let seeded: Vec<(String, AggregatedValue)> = self
            .config
            .entities()
            .iter()
            .map(|entity| (entity.id().to_string(), seed_value(host.as_ref(), entity)))
            .collect();
        self.state.send_modify(|state| state.values.extend(seeded));

        let mut bridge = RangeSubscriptionBridge::new();
        let range_tx = self.range_tx.clone();
        bridge.add_listener(move |range| {
            if range_tx.send(range.clone()).is_err() {
                tracing::debug!("Range change {} dropped, card is gone", range);
            }
        });
        bridge.start(host.clone(), self.timing);

        self.aggregator = Some(StatisticsAggregator::new(host.clone(), self.weighting));
        self.host = Some(host);
        self.bridge = Some(bridge);

        self.set_phase(Phase::Idle);
        tracing::info!("Card `{}` attached", self.config.title());
    }

    /// Final teardown. No further refreshes happen afterwards.
    pub fn on_detach(&mut self) {
        if self.phase() == Phase::Detached {
            return;
        }

        if let Some(mut bridge) = self.bridge.take() {
            tracing::debug!("Tearing down range subscription, discovery status {:?}", bridge.status());
            bridge.teardown();
        }
        self.aggregator = None;
        self.host = None;

        self.set_phase(Phase::Detached);
        tracing::info!("Card `{}` detached", self.config.title());
    }

    /// Processes range changes one after another until `shutdown` completes, then detaches.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                Some(range) = self.range_rx.recv() => {
                    let range = self.apply_policy(range);
                    self.refresh(range).await;
                }
            }
        }

        self.on_detach();
    }

    fn apply_policy(&mut self, range: DateRange) -> DateRange {
        match self.policy {
            RefreshPolicy::Sequential => range,
            RefreshPolicy::Latest => {
                let mut latest = range;
                let mut skipped = 0;
                while let Ok(newer) = self.range_rx.try_recv() {
                    latest = newer;
                    skipped += 1;
                }
                if skipped > 0 {
                    tracing::debug!("Skipped {} outdated range changes", skipped);
                }
                latest
            }
        }
    }

    /// Aggregates all configured entities for `range` and recomputes the COP.
    #[tracing::instrument(skip(self, range), fields(range = %range))]
    pub async fn refresh(&mut self, range: DateRange) {
        if self.phase() != Phase::Idle {
            tracing::debug!("Ignoring range change in phase {}", self.phase());
            return;
        }
        let Some(aggregator) = self.aggregator.as_ref() else {
            return;
        };

        self.state.send_modify(|state| state.phase = Phase::Refreshing);

        let period = PeriodGranularity::for_range(&range);
        tracing::info!("Refreshing card for {} with {} buckets", range, period);

        for entity in self.config.entities() {
            let aggregated =
                aggregate_isolated(aggregator, entity, &range, period, AggregationKind::SumOfChanges).await;
            if let Some(value) = aggregated {
                self.state.send_modify(|state| {
                    state.values.insert(entity.id().to_string(), value);
                });
            }
        }

        let outdoor = [
            (Outdoor::Temperature, self.config.outdoor_temperature()),
            (Outdoor::Humidity, self.config.outdoor_humidity()),
        ];
        for (slot, entity) in outdoor {
            let Some(entity) = entity else { continue };

            let aggregated =
                aggregate_isolated(aggregator, entity, &range, period, AggregationKind::WeightedMean).await;
            if let Some(value) = aggregated {
                self.state.send_modify(|state| match slot {
                    Outdoor::Temperature => state.outdoor.temperature = value,
                    Outdoor::Humidity => state.outdoor.humidity = value,
                });
            }
        }

        let electrical_id = self.config.electrical().id();
        let thermal_id = self.config.thermal().id();
        self.state.send_modify(|state| {
            state.cop = coefficient_of_performance(state.value_of(electrical_id), state.value_of(thermal_id));
            state.phase = Phase::Idle;
        });

        let cop = self.state.borrow().cop.clone();
        meter::increment("cop_refresh", &[("period", &period.to_string())]);
        if let Some(value) = parse_localized(&cop) {
            meter::set("cop", value, &[("card", self.config.title())]);
        }
        tracing::info!("Card refreshed, COP is {}", cop);
    }

    fn set_phase(&self, phase: Phase) {
        self.state.send_modify(|state| state.phase = phase);
    }
}

/// Failures stay with the entity: they are logged and the previous value is kept.
async fn aggregate_isolated<H: HostConnection>(
    aggregator: &StatisticsAggregator<H>,
    entity: &EntityRef,
    range: &DateRange,
    period: PeriodGranularity,
    kind: AggregationKind,
) -> Option<AggregatedValue> {
    match aggregator.aggregate(entity.id(), range, period, kind).await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Keeping previous value of {} ({}): {:?}", entity.display_name(), entity.id(), e);
            meter::increment("cop_query_failure", &[("entity_id", entity.id())]);
            None
        }
    }
}

fn seed_value<H: HostConnection>(host: &H, entity: &EntityRef) -> AggregatedValue {
    match host.current_state(entity.id()) {
        Some(state) => {
            let value = match state.value.parse::<f64>() {
                Ok(number) if number.is_finite() => format_grouped(number),
                _ => state.value,
            };
            AggregatedValue::new(value, state.unit_of_measurement.unwrap_or_else(|| UNAVAILABLE.to_string()))
        }
        None => AggregatedValue::unknown_entity(),
    }
}
