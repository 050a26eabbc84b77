use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::bail;

use crate::core::time::DateRange;
use crate::port::{
    EntityState, HostConnection, RangeCallback, RangePublisher, RawStatisticPoint, StatisticsQuery, StatisticsResult,
    Unsubscribe,
};

#[derive(Default)]
pub struct FakeHost {
    states: HashMap<String, EntityState>,
    statistics: Mutex<HashMap<String, Vec<RawStatisticPoint>>>,
    failing: HashSet<String>,
    publisher: Mutex<Option<Arc<FakePublisher>>>,
    queries: Mutex<Vec<StatisticsQuery>>,
    lookups: AtomicUsize,
}

impl FakeHost {
    pub fn with_state(mut self, entity_id: &str, value: &str, unit: Option<&str>) -> Self {
        self.states.insert(
            entity_id.to_string(),
            EntityState {
                value: value.to_string(),
                unit_of_measurement: unit.map(str::to_string),
            },
        );
        self
    }

    pub fn with_statistics(self, entity_id: &str, points: Vec<RawStatisticPoint>) -> Self {
        self.replace_statistics(entity_id, points);
        self
    }

    pub fn replace_statistics(&self, entity_id: &str, points: Vec<RawStatisticPoint>) {
        self.statistics.lock().unwrap().insert(entity_id.to_string(), points);
    }

    pub fn failing_for(mut self, entity_id: &str) -> Self {
        self.failing.insert(entity_id.to_string());
        self
    }

    pub fn publish_with(&self, publisher: Arc<FakePublisher>) {
        *self.publisher.lock().unwrap() = Some(publisher);
    }

    pub fn queries(&self) -> Vec<StatisticsQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn publisher_lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl HostConnection for FakeHost {
    fn range_publisher(&self, _key: &str) -> Option<Arc<dyn RangePublisher>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.publisher
            .lock()
            .unwrap()
            .clone()
            .map(|p| p as Arc<dyn RangePublisher>)
    }

    fn current_state(&self, entity_id: &str) -> Option<EntityState> {
        self.states.get(entity_id).cloned()
    }

    async fn statistics_during_period(&self, query: StatisticsQuery) -> anyhow::Result<StatisticsResult> {
        self.queries.lock().unwrap().push(query.clone());

        if query.entity_ids.iter().any(|id| self.failing.contains(id)) {
            bail!("Recorder unavailable");
        }

        let statistics = self.statistics.lock().unwrap();
        Ok(query
            .entity_ids
            .iter()
            .filter_map(|id| statistics.get(id).map(|points| (id.clone(), points.clone())))
            .collect())
    }
}

/// Publisher that delivers ranges synchronously and counts unsubscriptions.
#[derive(Default)]
pub struct FakePublisher {
    current: Mutex<Option<DateRange>>,
    subscribers: Arc<Mutex<Vec<RangeCallback>>>,
    unsubscribed: Arc<AtomicUsize>,
}

impl FakePublisher {
    pub fn with_current(range: DateRange) -> Self {
        Self {
            current: Mutex::new(Some(range)),
            ..Default::default()
        }
    }

    pub fn publish(&self, range: DateRange) {
        *self.current.lock().unwrap() = Some(range.clone());
        for callback in self.subscribers.lock().unwrap().iter() {
            callback(range.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    pub fn unsubscribe_count(&self) -> usize {
        self.unsubscribed.load(Ordering::SeqCst)
    }
}

impl RangePublisher for FakePublisher {
    fn subscribe(&self, callback: RangeCallback) -> Unsubscribe {
        if let Some(range) = self.current.lock().unwrap().clone() {
            callback(range);
        }
        self.subscribers.lock().unwrap().push(callback);

        let subscribers = self.subscribers.clone();
        let unsubscribed = self.unsubscribed.clone();
        Box::new(move || {
            subscribers.lock().unwrap().clear();
            unsubscribed.fetch_add(1, Ordering::SeqCst);
        })
    }
}
