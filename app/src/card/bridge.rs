use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use derive_more::derive::{Display, Error};
use infrastructure::meter;
use tokio::task::JoinHandle;

use crate::core::time::DateRange;
use crate::port::{HostConnection, RangePublisher, Unsubscribe};

/// Lookup key of the date selection on the host connection.
pub const RANGE_PUBLISHER_KEY: &str = "energy_date_selection";

pub type RangeListener = Box<dyn Fn(&DateRange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryTiming {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for DiscoveryTiming {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Range publisher `{key}` not found within {waited_ms} ms")]
pub struct DiscoveryTimeout {
    key: String,
    waited_ms: u128,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryStatus {
    NotStarted,
    Pending,
    Subscribed,
    TimedOut,
    TornDown,
}

/// Zero or one live subscription, released at most once.
#[derive(Default)]
pub struct SubscriptionHandle {
    unsubscribe: Option<Unsubscribe>,
}

impl SubscriptionHandle {
    fn hold(&mut self, unsubscribe: Unsubscribe) {
        self.unsubscribe = Some(unsubscribe);
    }

    fn take(&mut self) -> Option<Unsubscribe> {
        self.unsubscribe.take()
    }

    #[cfg(test)]
    fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }
}

struct Shared {
    listeners: Vec<RangeListener>,
    subscription: SubscriptionHandle,
    status: DiscoveryStatus,
}

/// Connects the card to the host's range publisher, which may show up only after the card is attached.
pub struct RangeSubscriptionBridge {
    shared: Arc<Mutex<Shared>>,
    discovery: Option<JoinHandle<()>>,
}

impl RangeSubscriptionBridge {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                listeners: vec![],
                subscription: SubscriptionHandle::default(),
                status: DiscoveryStatus::NotStarted,
            })),
            discovery: None,
        }
    }

    /// Listeners are called in registration order for every range change.
    pub fn add_listener(&self, listener: impl Fn(&DateRange) + Send + Sync + 'static) {
        lock(&self.shared).listeners.push(Box::new(listener));
    }

    pub fn status(&self) -> DiscoveryStatus {
        lock(&self.shared).status
    }

    #[cfg(test)]
    fn has_subscription(&self) -> bool {
        lock(&self.shared).subscription.is_active()
    }

    /// Starts looking for the publisher in the background. Only the first call has an effect.
    pub fn start<H: HostConnection>(&mut self, host: Arc<H>, timing: DiscoveryTiming) {
        {
            let mut shared = lock(&self.shared);
            if shared.status != DiscoveryStatus::NotStarted {
                tracing::debug!("Range discovery already started, status {:?}", shared.status);
                return;
            }
            shared.status = DiscoveryStatus::Pending;
        }

        let shared = self.shared.clone();
        self.discovery = Some(tokio::spawn(async move {
            match discover(host.as_ref(), RANGE_PUBLISHER_KEY, timing).await {
                Ok(publisher) => subscribe(&shared, publisher.as_ref()),
                Err(e) => {
                    tracing::error!("Card will not receive range updates: {}", e);
                    meter::increment("cop_discovery_timeout", &[]);
                    lock(&shared).status = DiscoveryStatus::TimedOut;
                }
            }
        }));
    }

    /// Drops all listeners and releases the subscription. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if let Some(discovery) = self.discovery.take() {
            discovery.abort();
        }

        let unsubscribe = {
            let mut shared = lock(&self.shared);
            shared.listeners.clear();
            shared.status = DiscoveryStatus::TornDown;
            shared.subscription.take()
        };

        if let Some(unsubscribe) = unsubscribe {
            tracing::debug!("Unsubscribing from range publisher");
            unsubscribe();
        }
    }
}

impl Default for RangeSubscriptionBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RangeSubscriptionBridge {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Polls the host until the publisher shows up or the timeout elapses.
pub async fn discover<H: HostConnection + ?Sized>(
    host: &H,
    key: &str,
    timing: DiscoveryTiming,
) -> Result<Arc<dyn RangePublisher>, DiscoveryTimeout> {
    let poll = async {
        let mut interval = tokio::time::interval(timing.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Some(publisher) = host.range_publisher(key) {
                return publisher;
            }
        }
    };

    tokio::time::timeout(timing.timeout, poll)
        .await
        .map_err(|_| DiscoveryTimeout {
            key: key.to_string(),
            waited_ms: timing.timeout.as_millis(),
        })
}

fn subscribe(shared: &Arc<Mutex<Shared>>, publisher: &dyn RangePublisher) {
    if lock(shared).status == DiscoveryStatus::TornDown {
        return;
    }

    let dispatch_to = Arc::downgrade(shared);
    // the publisher may deliver the current range from within subscribe, so no lock is held here
    let unsubscribe = publisher.subscribe(Box::new(move |range: DateRange| {
        if let Some(shared) = dispatch_to.upgrade() {
            for listener in lock(&shared).listeners.iter() {
                listener(&range);
            }
        }
    }));

    let mut guard = lock(shared);
    if guard.status == DiscoveryStatus::TornDown {
        drop(guard);
        unsubscribe();
        return;
    }

    guard.subscription.hold(unsubscribe);
    guard.status = DiscoveryStatus::Subscribed;
    tracing::info!("Subscribed to range publisher `{}`", RANGE_PUBLISHER_KEY);
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}
