//! Definition Validation
//!
//! Provides structural validation for workflow collections including:
//! - Name checks (empty, duplicate, reserved characters)
//! - Start step and transition target integrity
//! - Loop specification checks
//! - Reference warnings for arguments naming unknown steps

use std::collections::HashSet;
use std::path::PathBuf;

use log::{debug, info, warn};
use thiserror::Error;

use super::model::{Collection, Target, Workflow};

/// Character used to join ancestry paths; forbidden inside names.
const ANCESTRY_DELIMITER: char = ',';

/// A single structural problem in a collection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Collection has no name")]
    EmptyCollectionName,
    #[error("Collection '{0}' has no workflows")]
    EmptyCollection(String),
    #[error("Workflow has empty or whitespace-only name")]
    EmptyWorkflowName,
    #[error("Duplicate workflow name: '{0}'")]
    DuplicateWorkflow(String),
    #[error("Workflow '{0}' has no steps")]
    EmptyWorkflow(String),
    #[error("Workflow '{workflow}' starts at unknown step '{start}'")]
    MissingStartStep { workflow: String, start: String },
    #[error("Workflow '{0}' has a step with an empty name")]
    EmptyStepName(String),
    #[error("Workflow '{workflow}': duplicate step name '{step}'")]
    DuplicateStep { workflow: String, step: String },
    #[error("Workflow '{workflow}': step '{step}' has no action")]
    EmptyAction { workflow: String, step: String },
    #[error("Name '{0}' contains the reserved character ','")]
    ReservedCharacter(String),
    #[error("Workflow '{workflow}': step '{step}' transitions to unknown step '{target}'")]
    UnknownStepTarget {
        workflow: String,
        step: String,
        target: String,
    },
    #[error("Workflow '{workflow}': step '{step}' calls unknown workflow '{target}'")]
    UnknownWorkflowTarget {
        workflow: String,
        step: String,
        target: String,
    },
    #[error("Workflow '{workflow}': step '{step}' binds its loop to an empty argument name")]
    EmptyLoopBinding { workflow: String, step: String },
}

/// Errors raised while loading a definition.
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("Failed to read definition '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse definition: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid definition:\n{}", format_issues(.0))]
    Invalid(Vec<ValidationError>),
}

fn format_issues(issues: &[ValidationError]) -> String {
    issues
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

fn check_name(name: &str, errors: &mut Vec<ValidationError>) {
    if name.contains(ANCESTRY_DELIMITER) {
        errors.push(ValidationError::ReservedCharacter(name.to_string()));
    }
}

/// Validates a single workflow against the set of workflow names in its
/// collection.
fn validate_workflow(workflow: &Workflow, workflow_names: &HashSet<&str>) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if workflow.steps.is_empty() {
        errors.push(ValidationError::EmptyWorkflow(workflow.name.clone()));
        return errors;
    }

    let mut step_names: HashSet<&str> = HashSet::new();
    for step in &workflow.steps {
        if step.name.trim().is_empty() {
            errors.push(ValidationError::EmptyStepName(workflow.name.clone()));
            continue;
        }
        check_name(&step.name, &mut errors);
        if !step_names.insert(step.name.as_str()) {
            errors.push(ValidationError::DuplicateStep {
                workflow: workflow.name.clone(),
                step: step.name.clone(),
            });
        }
    }

    if !step_names.contains(workflow.start.as_str()) {
        errors.push(ValidationError::MissingStartStep {
            workflow: workflow.name.clone(),
            start: workflow.start.clone(),
        });
    }

    for step in &workflow.steps {
        if step.action.trim().is_empty() {
            errors.push(ValidationError::EmptyAction {
                workflow: workflow.name.clone(),
                step: step.name.clone(),
            });
        }

        for transition in &step.next {
            match &transition.target {
                Target::Step(target) if !step_names.contains(target.as_str()) => {
                    errors.push(ValidationError::UnknownStepTarget {
                        workflow: workflow.name.clone(),
                        step: step.name.clone(),
                        target: target.clone(),
                    });
                }
                Target::Workflow(target) if !workflow_names.contains(target.as_str()) => {
                    errors.push(ValidationError::UnknownWorkflowTarget {
                        workflow: workflow.name.clone(),
                        step: step.name.clone(),
                        target: target.clone(),
                    });
                }
                _ => {}
            }
        }

        if let Some(spec) = &step.loop_spec {
            if spec.bind.as_deref().is_some_and(|b| b.trim().is_empty()) {
                errors.push(ValidationError::EmptyLoopBinding {
                    workflow: workflow.name.clone(),
                    step: step.name.clone(),
                });
            }
        }

        // Unknown references are legal (they fail at run time) but usually a typo
        for reference in step.referenced_steps() {
            if !step_names.contains(reference) {
                warn!(
                    "Workflow '{}': step '{}' references unknown step '{}'",
                    workflow.name, step.name, reference
                );
            }
        }

        if step.next.is_empty() {
            debug!("Step '{}' is a leaf step (no transitions)", step.name);
        }
    }

    errors
}

/// Validates an entire collection.
///
/// Performs the following checks:
/// 1. Collection has a name and at least one workflow
/// 2. Workflow and step names are non-empty, unique and free of `,`
/// 3. Every workflow's start step exists
/// 4. Every transition targets an existing step or workflow
/// 5. Loop bindings are non-empty
///
/// All problems are reported together.
pub fn validate_collection(collection: &Collection) -> Result<(), DefinitionError> {
    info!(
        "Validating collection '{}' with {} workflows",
        collection.name,
        collection.workflows.len()
    );

    let mut errors = Vec::new();

    if collection.name.trim().is_empty() {
        errors.push(ValidationError::EmptyCollectionName);
    }
    check_name(&collection.name, &mut errors);

    if collection.workflows.is_empty() {
        errors.push(ValidationError::EmptyCollection(collection.name.clone()));
    }

    let mut workflow_names: HashSet<&str> = HashSet::new();
    for workflow in &collection.workflows {
        if workflow.name.trim().is_empty() {
            errors.push(ValidationError::EmptyWorkflowName);
            continue;
        }
        check_name(&workflow.name, &mut errors);
        if !workflow_names.insert(workflow.name.as_str()) {
            errors.push(ValidationError::DuplicateWorkflow(workflow.name.clone()));
        }
    }

    for workflow in &collection.workflows {
        errors.extend(validate_workflow(workflow, &workflow_names));
    }

    if !errors.is_empty() {
        return Err(DefinitionError::Invalid(errors));
    }

    info!("Collection '{}' validated", collection.name);
    Ok(())
}

/// Quick validation that returns a list of error messages.
pub fn quick_validate(collection: &Collection) -> Vec<String> {
    match validate_collection(collection) {
        Ok(()) => Vec::new(),
        Err(DefinitionError::Invalid(issues)) => issues.iter().map(|e| e.to_string()).collect(),
        Err(other) => vec![other.to_string()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::{LoopSpec, Step, Transition, Workflow};

    fn issues(collection: &Collection) -> Vec<ValidationError> {
        match validate_collection(collection) {
            Err(DefinitionError::Invalid(issues)) => issues,
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    fn valid_collection() -> Collection {
        Collection::new("tiered")
            .with_workflow(
                Workflow::new("parent", "start")
                    .with_step(
                        Step::new("start", "echo")
                            .then(Transition::to_workflow("child"))
                            .then(Transition::to_step("1")),
                    )
                    .with_step(Step::new("1", "echo")),
            )
            .with_workflow(Workflow::new("child", "start").with_step(Step::new("start", "echo")))
    }

    #[test]
    fn test_valid_collection() {
        assert!(validate_collection(&valid_collection()).is_ok());
        assert!(quick_validate(&valid_collection()).is_empty());
    }

    #[test]
    fn test_empty_collection() {
        let issues = issues(&Collection::new("empty"));
        assert_eq!(issues, vec![ValidationError::EmptyCollection("empty".into())]);
    }

    #[test]
    fn test_duplicate_workflow_and_step() {
        let collection = Collection::new("dup")
            .with_workflow(
                Workflow::new("a", "s")
                    .with_step(Step::new("s", "echo"))
                    .with_step(Step::new("s", "echo")),
            )
            .with_workflow(Workflow::new("a", "s").with_step(Step::new("s", "echo")));

        let issues = issues(&collection);
        assert!(issues.contains(&ValidationError::DuplicateWorkflow("a".into())));
        assert!(issues.contains(&ValidationError::DuplicateStep {
            workflow: "a".into(),
            step: "s".into()
        }));
    }

    #[test]
    fn test_missing_start_and_targets() {
        let collection = Collection::new("broken").with_workflow(
            Workflow::new("main", "begin").with_step(
                Step::new("start", "echo")
                    .then(Transition::to_step("nowhere"))
                    .then(Transition::to_workflow("ghost")),
            ),
        );

        let issues = issues(&collection);
        assert_eq!(issues.len(), 3);
        assert!(issues.contains(&ValidationError::MissingStartStep {
            workflow: "main".into(),
            start: "begin".into()
        }));
        assert!(issues.iter().any(|e| matches!(e, ValidationError::UnknownStepTarget { target, .. } if target == "nowhere")));
        assert!(issues.iter().any(|e| matches!(e, ValidationError::UnknownWorkflowTarget { target, .. } if target == "ghost")));
    }

    #[test]
    fn test_reserved_character_and_empty_action() {
        let collection = Collection::new("c").with_workflow(
            Workflow::new("main", "a,b").with_step(Step::new("a,b", "  ")),
        );

        let issues = issues(&collection);
        assert!(issues.contains(&ValidationError::ReservedCharacter("a,b".into())));
        assert!(issues.contains(&ValidationError::EmptyAction {
            workflow: "main".into(),
            step: "a,b".into()
        }));
    }

    #[test]
    fn test_empty_loop_binding() {
        let collection = Collection::new("c").with_workflow(
            Workflow::new("main", "start")
                .with_step(Step::new("start", "echo").with_loop(LoopSpec::over(vec![]).bind(" "))),
        );

        let issues = issues(&collection);
        assert_eq!(
            issues,
            vec![ValidationError::EmptyLoopBinding {
                workflow: "main".into(),
                step: "start".into()
            }]
        );
    }

    #[test]
    fn test_invalid_error_message_lists_issues() {
        let err = validate_collection(&Collection::new("empty")).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Invalid definition:"));
        assert!(message.contains("Collection 'empty' has no workflows"));
    }
}
