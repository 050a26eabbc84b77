use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::port::{EntityState, HostConnection, RangePublisher, StatisticsQuery, StatisticsResult};

use super::client::{HaHttpClient, HaWebSocketClient};
use super::{StateEntry, StateValue};

/// Connection to a Home Assistant instance with a cached snapshot of all entity states.
pub struct HaHost {
    http_client: HaHttpClient,
    ws_client: HaWebSocketClient,
    states: RwLock<HashMap<String, EntityState>>,
    publishers: RwLock<HashMap<String, Arc<dyn RangePublisher>>>,
}

impl HaHost {
    pub fn new(http_client: HaHttpClient, ws_client: HaWebSocketClient) -> Self {
        Self {
            http_client,
            ws_client,
            states: RwLock::new(HashMap::new()),
            publishers: RwLock::new(HashMap::new()),
        }
    }

    /// Publishers may show up at any time. A later registration replaces an earlier one.
    pub fn register_publisher(&self, key: &str, publisher: Arc<dyn RangePublisher>) {
        tracing::info!("Range publisher `{}` registered", key);
        write(&self.publishers).insert(key.to_string(), publisher);
    }

    pub async fn refresh_states(&self) -> anyhow::Result<usize> {
        let entries = self.http_client.get_current_states().await?;
        Ok(self.store_states(entries))
    }

    fn store_states(&self, entries: Vec<StateEntry>) -> usize {
        let states: HashMap<String, EntityState> = entries
            .into_iter()
            .map(|entry| (entry.entity_id.clone(), entity_state(entry)))
            .collect();

        let count = states.len();
        *write(&self.states) = states;
        count
    }
}

impl HostConnection for HaHost {
    fn range_publisher(&self, key: &str) -> Option<Arc<dyn RangePublisher>> {
        read(&self.publishers).get(key).cloned()
    }

    fn current_state(&self, entity_id: &str) -> Option<EntityState> {
        read(&self.states).get(entity_id).cloned()
    }

    async fn statistics_during_period(&self, query: StatisticsQuery) -> anyhow::Result<StatisticsResult> {
        self.ws_client.statistics_during_period(&query).await
    }
}

fn entity_state(entry: StateEntry) -> EntityState {
    let unit_of_measurement = entry
        .attributes
        .get("unit_of_measurement")
        .and_then(|unit| unit.as_str())
        .map(str::to_string);

    let value = match entry.state {
        StateValue::Available(value) => value,
        StateValue::Unavailable => crate::card::UNAVAILABLE.to_string(),
    };

    EntityState {
        value,
        unit_of_measurement,
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
