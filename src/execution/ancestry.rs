//! Ancestry Tracking
//!
//! Locates a step invocation within nested workflow calls. A path is
//! `[controller, workflow_1, ..., workflow_n, step]`, outermost first. It is
//! kept as a sequence of identifiers and only joined with `,` at the record
//! boundary.

use std::fmt;

use log::trace;

use crate::workflow::WorkflowKey;

/// Delimiter used when a path is rendered for records and queries.
pub const ANCESTRY_DELIMITER: &str = ",";

/// Ordered identifier chain of a step invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AncestryPath(Vec<String>);

impl AncestryPath {
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Parses a joined path.
    pub fn parse(joined: &str) -> Self {
        Self::from_segments(joined.split(ANCESTRY_DELIMITER))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn controller(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn step_name(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    /// Key of the workflow immediately enclosing the step.
    pub fn enclosing_workflow(&self) -> Option<&str> {
        if self.0.len() < 3 {
            return None;
        }
        self.0.get(self.0.len() - 2).map(String::as_str)
    }

    /// Number of workflows between the controller and the step.
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(2)
    }

    pub fn joined(&self) -> String {
        self.0.join(ANCESTRY_DELIMITER)
    }
}

impl fmt::Display for AncestryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.joined())
    }
}

/// The execution stack of one top-level run.
///
/// Entering a sub-workflow pushes its key, returning pops it. Loop
/// iterations never touch the stack.
#[derive(Debug, Clone)]
pub struct AncestryTracker {
    controller: String,
    workflows: Vec<WorkflowKey>,
}

impl AncestryTracker {
    pub fn new(controller: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            workflows: Vec::new(),
        }
    }

    pub fn controller(&self) -> &str {
        &self.controller
    }

    pub fn push_workflow(&mut self, key: WorkflowKey) {
        trace!("Entering workflow '{}' at depth {}", key, self.workflows.len() + 1);
        self.workflows.push(key);
    }

    pub fn pop_workflow(&mut self) -> Option<WorkflowKey> {
        let key = self.workflows.pop();
        if let Some(ref key) = key {
            trace!("Leaving workflow '{}'", key);
        }
        key
    }

    /// Innermost workflow currently executing.
    pub fn current_workflow(&self) -> Option<&WorkflowKey> {
        self.workflows.last()
    }

    pub fn depth(&self) -> usize {
        self.workflows.len()
    }

    /// Canonical path for `step` at the current position.
    pub fn path_for(&self, step: &str) -> AncestryPath {
        let mut segments = Vec::with_capacity(self.workflows.len() + 2);
        segments.push(self.controller.clone());
        segments.extend(self.workflows.iter().map(ToString::to_string));
        segments.push(step.to_string());
        AncestryPath(segments)
    }
}
