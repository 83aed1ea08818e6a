//! Subscription Bus
//!
//! Observers register interest in one `(workflow_key, step_name)` pair and
//! receive every matching record synchronously, in registration order. There
//! is no buffering: records for steps nobody subscribed to are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info};

use super::store::ExecutionRecord;

/// Callback invoked with each matching record.
pub type Callback = Arc<dyn Fn(&ExecutionRecord) + Send + Sync>;

/// Handle returned by [`SubscriptionBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    workflow_key: String,
    step_name: String,
    callback: Callback,
}

#[derive(Default)]
pub struct SubscriptionBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl SubscriptionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for one step of one workflow.
    pub fn subscribe<F>(
        &self,
        workflow_key: impl Into<String>,
        step_name: impl Into<String>,
        callback: F,
    ) -> SubscriptionId
    where
        F: Fn(&ExecutionRecord) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription {
            id,
            workflow_key: workflow_key.into(),
            step_name: step_name.into(),
            callback: Arc::new(callback),
        };
        debug!(
            "Subscribed to '{}' step '{}'",
            subscription.workflow_key, subscription.step_name
        );
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
        id
    }

    /// Removes one subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    /// Delivers `record` to every matching subscription, in registration
    /// order. Returns the number of deliveries.
    pub fn notify(&self, workflow_key: &str, step_name: &str, record: &ExecutionRecord) -> usize {
        // Callbacks run outside the lock so they may subscribe or unsubscribe.
        let callbacks: Vec<Callback> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.workflow_key == workflow_key && s.step_name == step_name)
            .map(|s| Arc::clone(&s.callback))
            .collect();

        for callback in &callbacks {
            callback(record);
        }
        callbacks.len()
    }

    /// Removes every subscription.
    pub fn clear(&self) {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        info!("Clearing {} subscriptions", subscriptions.len());
        subscriptions.clear();
    }

    pub fn len(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ancestry::AncestryPath;
    use crate::workflow::StepValue;
    use std::sync::Mutex;

    fn record(step: &str) -> ExecutionRecord {
        ExecutionRecord::new(
            "ctl",
            "demo-main",
            AncestryPath::from_segments(["ctl", "demo-main", step]),
            StepValue::Null,
        )
    }

    #[test]
    fn test_delivers_only_matching() {
        let bus = SubscriptionBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        bus.subscribe("demo-main", "start", move |r| {
            sink.lock().unwrap().push(r.step_name().to_string())
        });

        assert_eq!(bus.notify("demo-main", "start", &record("start")), 1);
        assert_eq!(bus.notify("demo-main", "other", &record("other")), 0);
        assert_eq!(bus.notify("demo-child", "start", &record("start")), 0);

        assert_eq!(*seen.lock().unwrap(), vec!["start"]);
    }

    #[test]
    fn test_registration_order() {
        let bus = SubscriptionBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let sink = Arc::clone(&order);
            bus.subscribe("demo-main", "start", move |_| sink.lock().unwrap().push(label));
        }

        assert_eq!(bus.notify("demo-main", "start", &record("start")), 3);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_and_clear() {
        let bus = SubscriptionBus::new();
        let a = bus.subscribe("demo-main", "start", |_| {});
        bus.subscribe("demo-main", "1", |_| {});

        assert!(bus.unsubscribe(a));
        assert!(!bus.unsubscribe(a));
        assert_eq!(bus.len(), 1);

        bus.clear();
        assert!(bus.is_empty());
        assert_eq!(bus.notify("demo-main", "1", &record("1")), 0);
    }
}
