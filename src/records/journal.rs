//! Record Journal
//!
//! Pairs the record store with the subscription bus. A commit appends the
//! record and delivers its notifications under one ordering lock, so records
//! from concurrent workers never interleave and every notification has been
//! delivered before the committing worker moves on.
//!
//! Subscription callbacks run while the lock is held and must not commit.

use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use super::store::{ExecutionRecord, RecordStore, StoreError};
use super::subscription::SubscriptionBus;

pub struct Journal {
    store: Arc<RecordStore>,
    bus: Arc<SubscriptionBus>,
    order: Mutex<()>,
}

impl Journal {
    pub fn new(store: Arc<RecordStore>, bus: Arc<SubscriptionBus>) -> Self {
        Self {
            store,
            bus,
            order: Mutex::new(()),
        }
    }

    /// Appends `record` and notifies its subscribers.
    pub fn commit(&self, record: ExecutionRecord) -> Result<ExecutionRecord, StoreError> {
        let _guard = self.order.lock().unwrap_or_else(PoisonError::into_inner);

        let stored = self.store.append(record)?;
        let delivered = self
            .bus
            .notify(&stored.workflow_key, stored.step_name(), &stored);
        if delivered > 0 {
            debug!("Delivered {} to {} subscribers", stored.ancestry, delivered);
        }
        Ok(stored)
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    pub fn bus(&self) -> &Arc<SubscriptionBus> {
        &self.bus
    }
}
