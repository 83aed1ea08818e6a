//! Workflow Definition Module
//!
//! Provides data structures and utilities for defining, parsing, and
//! validating workflow collections.
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Workflow, Step, Argument, Transition)
//! - [`value`]: Tagged step results
//! - [`parser`]: YAML parsing and loading
//! - [`validator`]: Structural validation
//! - [`registry`]: Loaded workflows, keyed by collection and name

pub mod model;
pub mod parser;
pub mod registry;
pub mod validator;
pub mod value;

pub use model::{
    Argument, Collection, Condition, LoopAggregate, LoopSpec, Reference, Step, Target, Transition,
    Workflow, WorkflowKey,
};
pub use parser::{load_collection, parse_collection};
pub use registry::WorkflowRegistry;
pub use validator::{validate_collection, DefinitionError, ValidationError};
pub use value::StepValue;
