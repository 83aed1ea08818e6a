//! Workflow Registry
//!
//! Holds every loaded workflow, keyed by `(collection, workflow)`. Lookups
//! hand out shared `Arc<Workflow>` handles so concurrent executions of the
//! same workflow read one immutable definition.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info};

use crate::error::EngineError;

use super::model::{Collection, Workflow, WorkflowKey};

#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<WorkflowKey, Arc<Workflow>>>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every workflow of a collection, replacing existing entries
    /// with the same key. Returns the registered keys.
    pub fn register_collection(&self, mut collection: Collection) -> Vec<WorkflowKey> {
        collection.adopt_workflows();

        let mut workflows = self
            .workflows
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let mut keys = Vec::with_capacity(collection.workflows.len());
        for workflow in collection.workflows {
            let key = workflow.key();
            if workflows.insert(key.clone(), Arc::new(workflow)).is_some() {
                info!("Replaced workflow definition '{}'", key);
            } else {
                debug!("Registered workflow '{}'", key);
            }
            keys.push(key);
        }
        keys
    }

    /// Looks up a workflow, failing with `NotFound`.
    pub fn lookup(&self, collection: &str, name: &str) -> Result<Arc<Workflow>, EngineError> {
        let key = WorkflowKey::new(collection, name);
        self.workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(key.to_string()))
    }

    pub fn contains(&self, key: &WorkflowKey) -> bool {
        self.workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Returns all registered keys, sorted.
    pub fn keys(&self) -> Vec<WorkflowKey> {
        let mut keys: Vec<_> = self
            .workflows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.workflows.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::Step;

    fn collection(start_action: &str) -> Collection {
        Collection::new("demo")
            .with_workflow(Workflow::new("main", "start").with_step(Step::new("start", start_action)))
            .with_workflow(Workflow::new("side", "start").with_step(Step::new("start", "echo")))
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = WorkflowRegistry::new();
        let keys = registry.register_collection(collection("echo"));

        assert_eq!(keys.len(), 2);
        assert_eq!(registry.len(), 2);

        let workflow = registry.lookup("demo", "main").unwrap();
        assert_eq!(workflow.collection, "demo");
        assert!(registry.contains(&WorkflowKey::new("demo", "side")));
    }

    #[test]
    fn test_lookup_missing() {
        let registry = WorkflowRegistry::new();
        assert!(registry.is_empty());

        let err = registry.lookup("demo", "main").unwrap_err();
        assert!(matches!(err, EngineError::NotFound(ref key) if key == "demo-main"));
    }

    #[test]
    fn test_reload_replaces_definition() {
        let registry = WorkflowRegistry::new();
        registry.register_collection(collection("echo"));
        let before = registry.lookup("demo", "main").unwrap();

        registry.register_collection(collection("fail"));
        let after = registry.lookup("demo", "main").unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(before.steps[0].action, "echo");
        assert_eq!(after.steps[0].action, "fail");
    }

    #[test]
    fn test_keys_sorted() {
        let registry = WorkflowRegistry::new();
        registry.register_collection(collection("echo"));
        let keys: Vec<String> = registry.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["demo-main", "demo-side"]);
    }
}
