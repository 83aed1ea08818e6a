//! Engine Configuration
//!
//! Settings for a [`Controller`](crate::execution::Controller). Every field
//! has a default, so a configuration file only needs the keys it changes:
//!
//! ```yaml
//! controller: nightlyController
//! worker_threads: 4
//! max_step_invocations: 500
//! record_capacity: 100000
//! ```

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::execution::step::ExecutionLimits;
use crate::workflow::DefinitionError;

/// Controller name used when none is configured.
pub const DEFAULT_CONTROLLER: &str = "defaultController";

/// Joins ancestry elements; a controller name may not contain it.
const ANCESTRY_DELIMITER: char = ',';

/// Checks that `name` can lead an ancestry path.
fn check_controller_name(name: &str) -> Result<(), EngineError> {
    if name.trim().is_empty() {
        return Err(EngineError::InvalidConfig(
            "controller name is empty".to_string(),
        ));
    }
    if name.contains(ANCESTRY_DELIMITER) {
        return Err(EngineError::InvalidConfig(format!(
            "controller name '{}' contains the reserved character '{}'",
            name, ANCESTRY_DELIMITER
        )));
    }
    Ok(())
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Name stamped on every record as the first ancestry element
    pub controller: String,

    /// Size of the worker pool
    pub worker_threads: usize,

    /// Invocations allowed per top-level execution
    pub max_step_invocations: usize,

    /// Nested workflow calls allowed per execution
    pub max_nesting_depth: usize,

    /// Record store capacity; unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_capacity: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let limits = ExecutionLimits::default();
        Self {
            controller: DEFAULT_CONTROLLER.to_string(),
            worker_threads: num_cpus::get(),
            max_step_invocations: limits.max_step_invocations,
            max_nesting_depth: limits.max_nesting_depth,
            record_capacity: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a YAML configuration document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, EngineError> {
        let config: EngineConfig = serde_yaml::from_str(yaml).map_err(DefinitionError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DefinitionError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_yaml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Renames the controller. Rejects empty names and names containing `,`.
    pub fn set_controller(&mut self, name: impl Into<String>) -> Result<(), EngineError> {
        let name = name.into();
        check_controller_name(&name)?;
        self.controller = name;
        Ok(())
    }

    /// Sets the worker pool size (at least one).
    pub fn set_worker_threads(&mut self, threads: usize) {
        self.worker_threads = threads.max(1);
    }

    pub fn set_max_step_invocations(&mut self, max: usize) {
        self.max_step_invocations = max;
    }

    pub fn set_record_capacity(&mut self, capacity: usize) {
        self.record_capacity = Some(capacity);
    }

    /// Checks settings that can be set directly on the public fields.
    pub fn validate(&self) -> Result<(), EngineError> {
        check_controller_name(&self.controller)
    }

    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits {
            max_step_invocations: self.max_step_invocations,
            max_nesting_depth: self.max_nesting_depth,
        }
    }
}
