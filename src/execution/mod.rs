//! Workflow Execution Module
//!
//! Runs loaded workflows: argument templating, step invocation, nested
//! workflow calls and the worker pool that hosts each execution.
//!
//! # Architecture
//!
//! - [`controller`]: Engine handle scheduling executions on the pool
//! - [`step`]: Graph walk, loops and transitions for one execution
//! - [`template`]: Argument resolution against earlier results
//! - [`ancestry`]: Position of an invocation within nested calls
//! - [`actions`]: Action trait and catalog
//! - [`pool`]: Fixed-size worker threads

pub mod actions;
pub mod ancestry;
pub mod controller;
pub mod pool;
pub mod step;
pub mod template;

pub use actions::{Action, ActionArgs, ActionCatalog, ActionError};
pub use ancestry::{AncestryPath, AncestryTracker};
pub use controller::{Controller, ExecutionId};
pub use step::{ExecutionLimits, RunSummary, StepExecutor, StepState};
