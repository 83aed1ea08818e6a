//! Workflow Data Model
//!
//! Core data structures representing workflows, their steps, and the
//! transitions and loops that connect them.
//!
//! # Example YAML Format
//!
//! ```yaml
//! collection: loopWorkflow
//! workflows:
//!   - name: loopWorkflow
//!     start: start
//!     steps:
//!       - name: start
//!         action: return_plus_one
//!         args:
//!           number: { ref: start, default: 0 }
//!         loop:
//!           over: [1, 2, 3, 4]
//!         next:
//!           - step: "1"
//!
//!       - name: "1"
//!         action: echo
//!         args:
//!           value: { ref: start, format: "REPEATING: {message}" }
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

use super::value::StepValue;

/// Separator between collection and workflow name in a rendered key.
pub const KEY_SEPARATOR: char = '-';

/// Identifies a workflow: `(collection, workflow)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkflowKey {
    pub collection: String,
    pub workflow: String,
}

impl WorkflowKey {
    pub fn new(collection: impl Into<String>, workflow: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            workflow: workflow.into(),
        }
    }
}

impl fmt::Display for WorkflowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.collection, KEY_SEPARATOR, self.workflow)
    }
}

/// An input to a step's action.
///
/// In YAML a mapping with a `ref` key is a reference; anything else is a
/// literal value.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Argument {
    Reference(Reference),
    Literal(Value),
}

impl Argument {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// A reference to the latest result of `step`.
    pub fn reference(step: impl Into<String>) -> Self {
        Self::Reference(Reference::new(step))
    }

    /// Returns the reference, if this argument is one.
    pub fn as_reference(&self) -> Option<&Reference> {
        match self {
            Self::Reference(r) => Some(r),
            Self::Literal(_) => None,
        }
    }
}

impl From<Reference> for Argument {
    fn from(reference: Reference) -> Self {
        Self::Reference(reference)
    }
}

/// Pointer to another step's result in the same workflow frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Reference {
    /// Name of the referenced step
    #[serde(rename = "ref")]
    pub step: String,

    /// Dotted path into a structured result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Text template; `{name}` placeholders are replaced with step results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Used while the referenced step has no result yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Reference {
    pub fn new(step: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            path: None,
            format: None,
            default: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Predicate over a completed step's result.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    #[default]
    Always,
    Equals(Value),
    NotEquals(Value),
    GreaterThan(f64),
    LessThan(f64),
    /// Substring of text, element of a list, or key of a map
    Contains(String),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    /// Evaluates the condition against a result.
    pub fn matches(&self, value: &StepValue) -> bool {
        match self {
            Self::Always => true,
            Self::Equals(expected) => value.to_json() == *expected,
            Self::NotEquals(expected) => value.to_json() != *expected,
            Self::GreaterThan(bound) => value.as_f64().is_some_and(|n| n > *bound),
            Self::LessThan(bound) => value.as_f64().is_some_and(|n| n < *bound),
            Self::Contains(needle) => match value {
                StepValue::Text(s) => s.contains(needle.as_str()),
                StepValue::List(items) => items
                    .iter()
                    .any(|item| item.as_str() == Some(needle.as_str())),
                StepValue::Map(map) => map.contains_key(needle),
                _ => false,
            },
            Self::All(conditions) => conditions.iter().all(|c| c.matches(value)),
            Self::Any(conditions) => conditions.iter().any(|c| c.matches(value)),
            Self::Not(inner) => !inner.matches(value),
        }
    }
}

/// Where a transition leads.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Next step within the same workflow
    Step(String),
    /// Workflow of the same collection, run as a nested call
    Workflow(String),
}

/// Conditional edge out of a completed step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(try_from = "RawTransition", into = "RawTransition")]
pub struct Transition {
    pub when: Condition,
    pub target: Target,
}

impl Transition {
    pub fn to_step(step: impl Into<String>) -> Self {
        Self {
            when: Condition::Always,
            target: Target::Step(step.into()),
        }
    }

    pub fn to_workflow(workflow: impl Into<String>) -> Self {
        Self {
            when: Condition::Always,
            target: Target::Workflow(workflow.into()),
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.when = condition;
        self
    }
}

/// Serialized form of a transition: exactly one of `step` / `workflow`.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
struct RawTransition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workflow: Option<String>,
    #[serde(default, with = "serde_yaml::with::singleton_map_recursive")]
    when: Condition,
}

impl TryFrom<RawTransition> for Transition {
    type Error = String;

    fn try_from(raw: RawTransition) -> Result<Self, Self::Error> {
        let target = match (raw.step, raw.workflow) {
            (Some(step), None) => Target::Step(step),
            (None, Some(workflow)) => Target::Workflow(workflow),
            (Some(_), Some(_)) => {
                return Err("transition names both a step and a workflow".to_string())
            }
            (None, None) => return Err("transition names neither a step nor a workflow".to_string()),
        };
        Ok(Self {
            when: raw.when,
            target,
        })
    }
}

impl From<Transition> for RawTransition {
    fn from(transition: Transition) -> Self {
        let (step, workflow) = match transition.target {
            Target::Step(step) => (Some(step), None),
            Target::Workflow(workflow) => (None, Some(workflow)),
        };
        Self {
            step,
            workflow,
            when: transition.when,
        }
    }
}

/// How a loop step exposes its result to downstream references.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LoopAggregate {
    /// The final iteration's result
    #[default]
    Last,
    /// A list of every iteration's result
    Collect,
}

/// Repeats a step's action once per element of an input sequence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct LoopSpec {
    /// Input sequence (literal list or reference to a list result)
    pub over: Argument,

    /// Argument name that receives the current element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    #[serde(default)]
    pub aggregate: LoopAggregate,
}

impl LoopSpec {
    pub fn over(items: Vec<Value>) -> Self {
        Self {
            over: Argument::Literal(Value::Array(items)),
            bind: None,
            aggregate: LoopAggregate::Last,
        }
    }

    pub fn bind(mut self, argument: impl Into<String>) -> Self {
        self.bind = Some(argument.into());
        self
    }

    pub fn aggregate(mut self, aggregate: LoopAggregate) -> Self {
        self.aggregate = aggregate;
        self
    }
}

/// A single unit of work within a workflow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Step {
    /// Unique name within the owning workflow
    pub name: String,

    /// Name of the action in the catalog
    pub action: String,

    /// Argument name -> argument
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub args: BTreeMap<String, Argument>,

    /// Outgoing transitions, evaluated in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<Transition>,

    #[serde(rename = "loop", default, skip_serializing_if = "Option::is_none")]
    pub loop_spec: Option<LoopSpec>,
}

impl Step {
    /// Creates a step bound to an action.
    ///
    /// # Example
    ///
    /// ```
    /// use steprunner::workflow::{Reference, Step, Transition};
    ///
    /// let step = Step::new("1", "echo")
    ///     .with_arg("value", Reference::new("start").with_format("REPEATING: {start}"))
    ///     .then(Transition::to_step("2"));
    /// assert_eq!(step.next.len(), 1);
    /// ```
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            action: action.into().trim().to_string(),
            args: BTreeMap::new(),
            next: Vec::new(),
            loop_spec: None,
        }
    }

    pub fn with_arg(mut self, name: impl Into<String>, argument: impl Into<Argument>) -> Self {
        self.args.insert(name.into(), argument.into());
        self
    }

    pub fn then(mut self, transition: Transition) -> Self {
        self.next.push(transition);
        self
    }

    pub fn with_loop(mut self, spec: LoopSpec) -> Self {
        self.loop_spec = Some(spec);
        self
    }

    /// Names of all steps this step's arguments refer to.
    pub fn referenced_steps(&self) -> Vec<&str> {
        let loop_over = self.loop_spec.as_ref().map(|spec| &spec.over);
        self.args
            .values()
            .chain(loop_over)
            .filter_map(Argument::as_reference)
            .map(|r| r.step.as_str())
            .collect()
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for Argument {
    fn from(s: &str) -> Self {
        Self::Literal(Value::String(s.to_string()))
    }
}

/// A named graph of steps with a designated start step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Workflow {
    pub name: String,

    /// Name of the first step to execute
    pub start: String,

    pub steps: Vec<Step>,

    /// Owning collection (assigned on registration)
    #[serde(skip)]
    pub collection: String,
}

impl Workflow {
    pub fn new(name: impl Into<String>, start: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            start: start.into(),
            steps: Vec::new(),
            collection: String::new(),
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn key(&self) -> WorkflowKey {
        WorkflowKey::new(&self.collection, &self.name)
    }

    /// Gets a step by name.
    pub fn get_step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// Gets a step by name, failing with `UnknownStep`.
    pub fn step(&self, name: &str) -> Result<&Step, EngineError> {
        self.get_step(name).ok_or_else(|| EngineError::UnknownStep {
            workflow: self.key().to_string(),
            step: name.to_string(),
        })
    }

    pub fn start_step(&self) -> Result<&Step, EngineError> {
        self.step(&self.start)
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// A named group of workflows, the unit a definition file describes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Collection {
    #[serde(rename = "collection")]
    pub name: String,

    #[serde(default)]
    pub workflows: Vec<Workflow>,
}

impl Collection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workflows: Vec::new(),
        }
    }

    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflows.push(workflow);
        self
    }

    /// Stamps the collection name onto every workflow.
    pub fn adopt_workflows(&mut self) {
        for workflow in &mut self.workflows {
            workflow.collection = self.name.clone();
        }
    }

    pub fn get_workflow(&self, name: &str) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.name == name)
    }
}
