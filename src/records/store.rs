//! Execution Record Store
//!
//! Append-only log of every step invocation. Records are immutable once
//! written and are returned in append order. Timestamps never decrease in
//! append order, so time-window queries agree with insertion order.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::ser::{Serialize, Serializer};
use thiserror::Error;

use crate::execution::ancestry::AncestryPath;
use crate::workflow::StepValue;

/// Outcome flag of a recorded invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Success,
    Failure,
}

/// One step invocation, as written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub controller: String,
    /// Key of the innermost workflow that owns the step
    pub workflow_key: String,
    pub ancestry: AncestryPath,
    pub timestamp: DateTime<Utc>,
    pub result: StepValue,
    pub status: RecordStatus,
}

impl ExecutionRecord {
    /// Creates a record stamped with the current time. Error results are
    /// flagged as failures.
    pub fn new(
        controller: impl Into<String>,
        workflow_key: impl Into<String>,
        ancestry: AncestryPath,
        result: StepValue,
    ) -> Self {
        let status = if result.is_error() {
            RecordStatus::Failure
        } else {
            RecordStatus::Success
        };
        Self {
            controller: controller.into(),
            workflow_key: workflow_key.into(),
            ancestry,
            timestamp: Utc::now(),
            result,
            status,
        }
    }

    /// Name of the step that produced this record.
    pub fn step_name(&self) -> &str {
        self.ancestry.step_name().unwrap_or_default()
    }

    pub fn is_failure(&self) -> bool {
        self.status == RecordStatus::Failure
    }
}

#[derive(serde::Serialize)]
struct RecordDocument<'a> {
    controller: &'a str,
    ancestry: String,
    timestamp: &'a DateTime<Utc>,
    data: RecordData<'a>,
}

#[derive(serde::Serialize)]
struct RecordData<'a> {
    result: &'a StepValue,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    error: bool,
}

/// Serializes to `{controller, ancestry: "a,b,c", timestamp, data: {result}}`;
/// failures carry `data.error = true`.
impl Serialize for ExecutionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RecordDocument {
            controller: &self.controller,
            ancestry: self.ancestry.joined(),
            timestamp: &self.timestamp,
            data: RecordData {
                result: &self.result,
                error: self.is_failure(),
            },
        }
        .serialize(serializer)
    }
}

/// Errors raised by the record store.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("capacity of {capacity} records reached")]
    Exhausted { capacity: usize },
}

#[derive(Debug, Default)]
struct StoreInner {
    records: Vec<ExecutionRecord>,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Thread-safe append-only record log.
#[derive(Debug, Default)]
pub struct RecordStore {
    inner: Mutex<StoreInner>,
    capacity: Option<usize>,
}

impl RecordStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that refuses appends beyond `capacity` records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::default(),
            capacity: Some(capacity),
        }
    }

    /// Appends a record and returns the stored copy.
    ///
    /// The stored timestamp is raised to the previous record's timestamp if
    /// the clock went backwards.
    pub fn append(&self, mut record: ExecutionRecord) -> Result<ExecutionRecord, StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(capacity) = self.capacity {
            if inner.records.len() >= capacity {
                return Err(StoreError::Exhausted { capacity });
            }
        }

        if let Some(last) = inner.last_timestamp {
            if record.timestamp < last {
                record.timestamp = last;
            }
        }
        inner.last_timestamp = Some(record.timestamp);

        debug!("Recorded {} ({})", record.ancestry, record.result.kind());
        inner.records.push(record.clone());
        Ok(record)
    }

    /// Returns records for `controller` and `workflow_key` whose timestamp lies
    /// in `[start, end]`, in append order.
    pub fn query(
        &self,
        controller: &str,
        workflow_key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<ExecutionRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .iter()
            .filter(|r| r.controller == controller && r.workflow_key == workflow_key)
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .cloned()
            .collect()
    }

    /// Returns every record, in append order.
    pub fn records(&self) -> Vec<ExecutionRecord> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .records
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every record. Only for teardown between runs.
    pub fn tear_down(&self) -> usize {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = inner.records.len();
        inner.records.clear();
        inner.last_timestamp = None;
        info!("Record store cleared ({} records)", removed);
        removed
    }
}
