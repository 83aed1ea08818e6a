//! Action Catalog
//!
//! Maps action names to callables. The engine treats actions as opaque:
//! each receives its resolved arguments and returns a [`StepValue`] or an
//! [`ActionError`]. Closures implement [`Action`] directly.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::debug;
use serde_json::Value;
use thiserror::Error;

use crate::error::EngineError;
use crate::workflow::StepValue;

/// Resolved arguments handed to an action.
pub type ActionArgs = BTreeMap<String, StepValue>;

/// Failure reported by an action.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{0}")]
pub struct ActionError(pub String);

impl ActionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Convenience for a required argument that was not supplied.
    pub fn missing_argument(name: &str) -> Self {
        Self(format!("missing argument '{}'", name))
    }
}

/// An executable unit of work.
pub trait Action: Send + Sync {
    fn invoke(&self, args: &ActionArgs) -> Result<StepValue, ActionError>;
}

impl<F> Action for F
where
    F: Fn(&ActionArgs) -> Result<StepValue, ActionError> + Send + Sync,
{
    fn invoke(&self, args: &ActionArgs) -> Result<StepValue, ActionError> {
        self(args)
    }
}

/// Name -> action registry.
#[derive(Default, Clone)]
pub struct ActionCatalog {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog preloaded with the built-in actions.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.register("echo", echo);
        catalog.register("collect_args", collect_args);
        catalog.register("repeat_back_to_me", repeat_back_to_me);
        catalog.register("return_plus_one", return_plus_one);
        catalog.register("fail", fail);
        catalog
    }

    /// Registers an action, replacing any previous one with the same name.
    pub fn register<A>(&mut self, name: impl Into<String>, action: A)
    where
        A: Action + 'static,
    {
        let name = name.into();
        debug!("Registered action '{}'", name);
        self.actions.insert(name, Arc::new(action));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Sorted action names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Invokes `name` with `args`.
    ///
    /// Fails with `UnknownAction` for an unregistered name and `Action` when
    /// the action reports an error or returns an error marker.
    pub fn invoke(&self, name: &str, args: &ActionArgs) -> Result<StepValue, EngineError> {
        let action = self
            .actions
            .get(name)
            .ok_or_else(|| EngineError::UnknownAction(name.to_string()))?;

        let failed = |message: String| EngineError::Action {
            action: name.to_string(),
            message,
        };

        match action.invoke(args) {
            Ok(StepValue::Error(message)) => Err(failed(message)),
            Ok(value) => Ok(value),
            Err(e) => Err(failed(e.0)),
        }
    }
}

fn required<'a>(args: &'a ActionArgs, name: &str) -> Result<&'a StepValue, ActionError> {
    args.get(name).ok_or_else(|| ActionError::missing_argument(name))
}

/// Returns argument `value` unchanged.
fn echo(args: &ActionArgs) -> Result<StepValue, ActionError> {
    required(args, "value").cloned()
}

/// Returns all arguments as a map.
fn collect_args(args: &ActionArgs) -> Result<StepValue, ActionError> {
    let map = args
        .iter()
        .map(|(name, value)| (name.clone(), value.to_json()))
        .collect::<serde_json::Map<String, Value>>();
    Ok(StepValue::Map(map))
}

/// Returns `"REPEATING: <call>"`.
fn repeat_back_to_me(args: &ActionArgs) -> Result<StepValue, ActionError> {
    let call = required(args, "call")?;
    Ok(StepValue::Text(format!("REPEATING: {}", call.render_inline())))
}

/// Returns `number + 1`, keeping integers integral.
fn return_plus_one(args: &ActionArgs) -> Result<StepValue, ActionError> {
    let number = match required(args, "number")? {
        StepValue::Number(n) => n.clone(),
        StepValue::Text(s) => s
            .trim()
            .parse::<serde_json::Number>()
            .map_err(|_| ActionError::new(format!("'{}' is not a number", s)))?,
        other => {
            return Err(ActionError::new(format!(
                "expected a number, got {}",
                other.kind()
            )))
        }
    };

    if let Some(i) = number.as_i64() {
        return Ok(StepValue::from(i + 1));
    }
    number
        .as_f64()
        .and_then(|f| serde_json::Number::from_f64(f + 1.0))
        .map(StepValue::Number)
        .ok_or_else(|| ActionError::new("number out of range"))
}

/// Always fails with `message` (or a generic message).
fn fail(args: &ActionArgs) -> Result<StepValue, ActionError> {
    let message = args
        .get("message")
        .map(StepValue::render_inline)
        .unwrap_or_else(|| "action failed".to_string());
    Err(ActionError(message))
}
