//! StepRunner - Workflow Execution Engine
//!
//! Loads named workflows (graphs of steps bound to actions), runs them on a
//! pool of worker threads and records every step invocation with its
//! position in the call hierarchy.
//!
//! # Architecture
//!
//! The library is organized into these modules:
//!
//! - [`workflow`]: Definitions, YAML parsing, validation and the registry
//! - [`execution`]: Controller, step executor, templating and actions
//! - [`records`]: Execution record store and subscription bus
//! - [`config`]: Engine settings
//! - [`error`]: Engine error taxonomy
//!
//! # Example
//!
//! ```rust,no_run
//! use steprunner::{ActionCatalog, Controller, EngineConfig};
//!
//! fn main() -> Result<(), steprunner::EngineError> {
//!     let controller = Controller::from_config(EngineConfig::default(), ActionCatalog::with_builtins());
//!     controller.load_file("pipeline.yaml")?;
//!     controller.init_threads()?;
//!
//!     controller.execute("demo", "main")?;
//!     controller.await_drain();
//!     controller.shutdown_threads();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod execution;
pub mod records;
pub mod workflow;

// Re-export commonly used types
pub use config::EngineConfig;
pub use error::EngineError;
pub use execution::{ActionCatalog, Controller, ExecutionId};
pub use records::{ExecutionRecord, RecordStore, SubscriptionBus};
pub use workflow::model::{Collection, Step, Workflow};
pub use workflow::parser::load_collection;
pub use workflow::value::StepValue;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "StepRunner";
