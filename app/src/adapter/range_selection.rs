use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::core::time::DateRange;
use crate::port::{RangeCallback, RangePublisher, Unsubscribe};

/// The date range currently selected on the dashboard.
///
/// Subscribers receive the current selection right away and every later selection in the order
/// they subscribed.
#[derive(Default)]
pub struct RangeSelection {
    inner: Arc<Mutex<Selection>>,
}

#[derive(Default)]
struct Selection {
    current: Option<DateRange>,
    next_id: u64,
    subscribers: Vec<(u64, Arc<RangeCallback>)>,
}

impl RangeSelection {
    pub fn new(initial: DateRange) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Selection {
                current: Some(initial),
                ..Default::default()
            })),
        }
    }

    pub fn current(&self) -> Option<DateRange> {
        lock(&self.inner).current.clone()
    }

    pub fn select(&self, range: DateRange) {
        let subscribers: Vec<Arc<RangeCallback>> = {
            let mut selection = lock(&self.inner);
            selection.current = Some(range.clone());
            selection.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
        };

        tracing::info!("Selected range {} for {} subscribers", range, subscribers.len());
        for callback in subscribers {
            callback(range.clone());
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).subscribers.len()
    }
}

impl RangePublisher for RangeSelection {
    fn subscribe(&self, callback: RangeCallback) -> Unsubscribe {
        let callback = Arc::new(callback);

        let (id, current) = {
            let mut selection = lock(&self.inner);
            let id = selection.next_id;
            selection.next_id += 1;
            selection.subscribers.push((id, callback.clone()));
            (id, selection.current.clone())
        };

        if let Some(range) = current {
            callback(range);
        }

        let inner: Weak<Mutex<Selection>> = Arc::downgrade(&self.inner);
        Box::new(move || {
            if let Some(inner) = inner.upgrade() {
                lock(&inner).subscribers.retain(|(sid, _)| *sid != id);
            }
        })
    }
}

fn lock(inner: &Mutex<Selection>) -> MutexGuard<'_, Selection> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
