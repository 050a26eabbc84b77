mod client;
mod host;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

pub use client::{HaHttpClient, HaWebSocketClient};
pub use host::HaHost;

#[derive(Debug, Deserialize, Clone)]
pub struct HomeAssistant {
    pub url: String,
    pub token: String,
    #[serde(default = "default_state_refresh_secs")]
    pub state_refresh_secs: u64,
}

fn default_state_refresh_secs() -> u64 {
    60
}

impl HomeAssistant {
    pub fn new_host(&self) -> anyhow::Result<Arc<HaHost>> {
        let http_client = HaHttpClient::new(&self.url, &self.token)?;
        let ws_client = HaWebSocketClient::new(&self.url, &self.token)?;

        Ok(Arc::new(HaHost::new(http_client, ws_client)))
    }

    /// Keeps the cached entity states current. Failures are logged and retried on the next tick.
    pub fn new_state_refresher(&self, host: Arc<HaHost>) -> impl Future<Output = ()> + use<> {
        let period = Duration::from_secs(self.state_refresh_secs.max(1));

        async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                timer.tick().await;

                match host.refresh_states().await {
                    Ok(count) => tracing::debug!("Refreshed {} entity states", count),
                    Err(e) => tracing::warn!("Error refreshing entity states: {:?}", e),
                }
            }
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct StateEntry {
    pub entity_id: String,
    pub state: StateValue,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

#[derive(Debug, PartialEq)]
pub enum StateValue {
    Available(String),
    Unavailable,
}

impl<'de> Deserialize<'de> for StateValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        match value.as_str() {
            "unavailable" | "unknown" => Ok(StateValue::Unavailable),
            _ => Ok(StateValue::Available(value)),
        }
    }
}
