//! Engine Error Types
//!
//! Every failure the engine can report, split into errors that only fail a
//! single step invocation and errors that abort an execution (or the engine).

use thiserror::Error;

use crate::records::StoreError;
use crate::workflow::validator::DefinitionError;

/// Errors raised by the execution engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No workflow is registered under the requested key.
    #[error("workflow '{0}' not found")]
    NotFound(String),

    /// A workflow has no step with the requested name.
    #[error("workflow '{workflow}' has no step named '{step}'")]
    UnknownStep { workflow: String, step: String },

    /// An argument refers to a result that has not been produced yet.
    #[error("argument '{argument}' refers to '{reference}' which has no result yet")]
    UnresolvedReference { argument: String, reference: String },

    /// The action catalog has no entry for the requested name.
    #[error("unknown action '{0}'")]
    UnknownAction(String),

    /// The action ran and reported a failure.
    #[error("action '{action}' failed: {message}")]
    Action { action: String, message: String },

    /// A loop's input did not resolve to a sequence.
    #[error("loop input of step '{step}' is not a sequence")]
    LoopInput { step: String },

    /// The record store refused an append. Fatal for the engine.
    #[error("record store exhausted: {0}")]
    StoreExhausted(#[from] StoreError),

    /// A single execution invoked more steps than allowed.
    #[error("execution exceeded {0} step invocations")]
    InvocationLimit(usize),

    /// Workflow calls nested deeper than allowed.
    #[error("workflow calls nested deeper than {0} levels")]
    NestingLimit(usize),

    /// `execute` was called while the worker pool was stopped.
    #[error("worker pool is not running")]
    WorkersNotRunning,

    /// The engine stopped accepting work after a fatal store failure.
    #[error("engine halted after a fatal record store failure")]
    Halted,

    /// Engine settings were rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A definition could not be loaded.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Returns true when the error only fails the current step invocation.
    ///
    /// Step-local errors are recorded as failed results; everything else
    /// aborts the surrounding execution.
    pub fn is_step_local(&self) -> bool {
        matches!(
            self,
            Self::UnresolvedReference { .. }
                | Self::UnknownAction(_)
                | Self::Action { .. }
                | Self::LoopInput { .. }
        )
    }
}
