//! Definition Parser
//!
//! Handles loading and parsing workflow collections from YAML files.
//! Parsed collections are validated before they are handed to the engine.

use std::fs;
use std::path::Path;

use log::{debug, info};

use super::model::Collection;
use super::validator::{validate_collection, DefinitionError};

/// Parses and validates a collection from YAML text.
pub fn parse_collection(yaml: &str) -> Result<Collection, DefinitionError> {
    let mut collection: Collection = serde_yaml::from_str(yaml)?;

    info!(
        "Parsed collection '{}': {} workflows, {} steps",
        collection.name,
        collection.workflows.len(),
        collection.workflows.iter().map(|w| w.len()).sum::<usize>()
    );

    collection.adopt_workflows();
    validate_collection(&collection)?;

    Ok(collection)
}

/// Loads a collection from a YAML file.
///
/// This function:
/// 1. Reads the YAML file
/// 2. Parses it into the workflow model
/// 3. Stamps the collection name onto every workflow
/// 4. Validates the collection structure
///
/// # Example
///
/// ```rust,no_run
/// use steprunner::workflow::load_collection;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let collection = load_collection("playbooks/tiered.yaml")?;
///     println!("Loaded {} workflows", collection.workflows.len());
///     Ok(())
/// }
/// ```
pub fn load_collection(path: impl AsRef<Path>) -> Result<Collection, DefinitionError> {
    let path = path.as_ref();
    info!("Loading definition from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|source| DefinitionError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    parse_collection(&yaml_content)
}
