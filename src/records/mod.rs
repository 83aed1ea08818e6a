//! Execution Records Module
//!
//! The audit side of the engine: an append-only store of step invocations
//! and a bus that notifies observers as records are written.
//!
//! # Components
//!
//! - [`RecordStore`]: Append-only, queryable record log
//! - [`SubscriptionBus`]: Per-step notification delivery
//! - [`Journal`]: Serialized append + notify used by the executor

pub mod journal;
pub mod store;
pub mod subscription;

pub use journal::Journal;
pub use store::{ExecutionRecord, RecordStatus, RecordStore, StoreError};
pub use subscription::{Callback, SubscriptionBus, SubscriptionId};
