//! Execution Controller
//!
//! The engine handle. A controller owns the workflow registry, the action
//! catalog, the worker pool and the record journal, and schedules each
//! top-level execution as one job on the pool.
//!
//! # Example
//!
//! ```rust,no_run
//! use steprunner::execution::{ActionCatalog, Controller};
//! use steprunner::EngineConfig;
//!
//! fn main() -> Result<(), steprunner::EngineError> {
//!     let controller = Controller::from_config(EngineConfig::default(), ActionCatalog::with_builtins());
//!     controller.load_file("tiered.yaml")?;
//!     controller.init_threads()?;
//!
//!     controller.execute("tieredWorkflow", "parentWorkflow")?;
//!     controller.await_drain();
//!     controller.shutdown_threads();
//!
//!     for record in controller.store().records() {
//!         println!("{} -> {}", record.ancestry, record.result);
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::records::{ExecutionRecord, Journal, RecordStore, SubscriptionBus, SubscriptionId};
use crate::workflow::{load_collection, validate_collection, Collection, WorkflowKey, WorkflowRegistry};

use super::actions::ActionCatalog;
use super::pool::WorkerPool;
use super::step::StepExecutor;

/// Identifies one call to [`Controller::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(u64);

impl ExecutionId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exec-{}", self.0)
    }
}

pub struct Controller {
    config: EngineConfig,
    registry: Arc<WorkflowRegistry>,
    actions: Arc<ActionCatalog>,
    journal: Arc<Journal>,
    pool: RwLock<Option<WorkerPool>>,
    halted: Arc<AtomicBool>,
    next_id: AtomicU64,
}

impl Controller {
    /// Creates a controller around an injected store and bus.
    pub fn new(
        config: EngineConfig,
        actions: ActionCatalog,
        store: Arc<RecordStore>,
        bus: Arc<SubscriptionBus>,
    ) -> Self {
        Self {
            config,
            registry: Arc::new(WorkflowRegistry::new()),
            actions: Arc::new(actions),
            journal: Arc::new(Journal::new(store, bus)),
            pool: RwLock::new(None),
            halted: Arc::new(AtomicBool::new(false)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Creates a controller with a fresh store (sized by
    /// `record_capacity`) and bus.
    pub fn from_config(config: EngineConfig, actions: ActionCatalog) -> Self {
        let store = match config.record_capacity {
            Some(capacity) => RecordStore::with_capacity(capacity),
            None => RecordStore::new(),
        };
        Self::new(config, actions, Arc::new(store), Arc::new(SubscriptionBus::new()))
    }

    /// Controller name, the first element of every ancestry.
    pub fn name(&self) -> &str {
        &self.config.controller
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validates and registers a collection. Returns the registered keys.
    pub fn load(&self, collection: Collection) -> Result<Vec<WorkflowKey>, EngineError> {
        validate_collection(&collection)?;
        let name = collection.name.clone();
        let keys = self.registry.register_collection(collection);
        info!("Loaded collection '{}' ({} workflows)", name, keys.len());
        Ok(keys)
    }

    /// Reads, validates and registers a definition file.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Vec<WorkflowKey>, EngineError> {
        let path = path.as_ref();
        info!("Loading definition: {}", path.display());
        let collection = load_collection(path)?;
        Ok(self.registry.register_collection(collection))
    }

    /// Starts the worker pool. Calling it again while running is a no-op.
    pub fn init_threads(&self) -> Result<(), EngineError> {
        let mut pool = self.pool.write().unwrap_or_else(PoisonError::into_inner);
        if pool.is_some() {
            debug!("Worker pool already running");
            return Ok(());
        }

        self.config.validate()?;
        let name = format!("{}-worker", self.config.controller);
        *pool = Some(WorkerPool::new(&name, self.config.worker_threads)?);
        Ok(())
    }

    /// Schedules a top-level run of `collection`/`workflow`.
    ///
    /// Fails when the workflow is not registered, the pool is stopped, or
    /// the engine halted after a store failure. Step failures during the
    /// run are reported through the records, not here.
    pub fn execute(&self, collection: &str, workflow: &str) -> Result<ExecutionId, EngineError> {
        if self.is_halted() {
            return Err(EngineError::Halted);
        }

        let workflow = self.registry.lookup(collection, workflow)?;
        let id = ExecutionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);

        let registry = Arc::clone(&self.registry);
        let actions = Arc::clone(&self.actions);
        let journal = Arc::clone(&self.journal);
        let halted = Arc::clone(&self.halted);
        let controller = self.config.controller.clone();
        let limits = self.config.limits();

        let job = move || {
            if halted.load(Ordering::SeqCst) {
                warn!("Skipping {}: engine halted", id);
                return;
            }

            let executor = StepExecutor::new(&registry, &actions, &journal, limits);
            match executor.run(&controller, &workflow) {
                Ok(summary) => debug!(
                    "{} done: {} completed, {} failed, {} workflows",
                    id, summary.completed, summary.failed, summary.workflows
                ),
                Err(e @ EngineError::StoreExhausted(_)) => {
                    error!("{} aborted, halting engine: {}", id, e);
                    halted.store(true, Ordering::SeqCst);
                }
                Err(e) => error!("{} aborted: {}", id, e),
            }
        };

        let pool = self.pool.read().unwrap_or_else(PoisonError::into_inner);
        pool.as_ref()
            .ok_or(EngineError::WorkersNotRunning)?
            .submit(job)?;

        info!("Queued {} for '{}'", id, self.config.controller);
        Ok(id)
    }

    /// Blocks until every scheduled execution has finished.
    pub fn await_drain(&self) {
        let pool = self.pool.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(pool) = pool.as_ref() {
            pool.wait_idle();
        }
    }

    /// Stops the worker pool after queued executions finish.
    pub fn shutdown_threads(&self) {
        let pool = self
            .pool
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pool) = pool {
            pool.shutdown();
            info!("Worker pool shut down");
        }
    }

    /// Stops the pool, then empties the store and drops every subscription.
    pub fn tear_down(&self) {
        self.shutdown_threads();
        let removed = self.journal.store().tear_down();
        self.journal.bus().clear();
        debug!("Tear down removed {} records", removed);
    }

    /// True once a store failure has stopped the engine.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Records of `controller` and `workflow_key` stamped within
    /// `[start, end]`, in append order.
    pub fn query(
        &self,
        controller: &str,
        workflow_key: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Vec<ExecutionRecord> {
        self.journal.store().query(controller, workflow_key, start, end)
    }

    /// Registers a callback for records of `step_name` in `workflow_key`.
    pub fn subscribe<F>(
        &self,
        workflow_key: impl Into<String>,
        step_name: impl Into<String>,
        callback: F,
    ) -> SubscriptionId
    where
        F: Fn(&ExecutionRecord) + Send + Sync + 'static,
    {
        self.journal.bus().subscribe(workflow_key, step_name, callback)
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        self.journal.store()
    }

    pub fn bus(&self) -> &Arc<SubscriptionBus> {
        self.journal.bus()
    }

    pub fn registry(&self) -> &Arc<WorkflowRegistry> {
        &self.registry
    }

    pub fn actions(&self) -> &ActionCatalog {
        &self.actions
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown_threads();
    }
}
