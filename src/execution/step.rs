//! Step Execution
//!
//! Walks one workflow graph on the calling thread:
//! - Argument resolution against the current workflow frame
//! - Action invocation and record commit (one record per invocation)
//! - Loop iteration with result aggregation
//! - Transition evaluation, including nested workflow calls
//!
//! Step-local failures (unresolved references, unknown actions, action
//! errors) are recorded and end the branch. Store exhaustion and the
//! invocation/nesting limits abort the whole run.

use std::collections::HashMap;
use std::fmt;

use log::{debug, error, info, trace, warn};

use crate::error::EngineError;
use crate::records::{ExecutionRecord, Journal};
use crate::workflow::{
    LoopAggregate, LoopSpec, Step, StepValue, Target, Workflow, WorkflowKey, WorkflowRegistry,
};

use super::actions::{ActionArgs, ActionCatalog};
use super::ancestry::AncestryTracker;
use super::template::{self, ResultScope};

/// Lifecycle of a single step invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    ArgsResolved,
    Running,
    Completed,
    Failed,
}

impl StepState {
    /// Returns true if `next` is a legal successor of this state.
    pub fn can_advance_to(self, next: StepState) -> bool {
        use StepState::*;
        matches!(
            (self, next),
            (Pending, ArgsResolved)
                | (Pending, Failed)
                | (ArgsResolved, Running)
                | (Running, Completed)
                | (Running, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, StepState::Completed | StepState::Failed)
    }
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StepState::Pending => "pending",
            StepState::ArgsResolved => "args-resolved",
            StepState::Running => "running",
            StepState::Completed => "completed",
            StepState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Tracks the state of one invocation.
struct Invocation<'a> {
    step: &'a str,
    state: StepState,
}

impl<'a> Invocation<'a> {
    fn new(step: &'a str) -> Self {
        Self {
            step,
            state: StepState::Pending,
        }
    }

    fn advance(&mut self, next: StepState) {
        if !self.state.can_advance_to(next) {
            warn!(
                "Step '{}' moved from {} to {} out of order",
                self.step, self.state, next
            );
        }
        trace!("Step '{}': {} -> {}", self.step, self.state, next);
        self.state = next;
    }
}

/// How a step (all of its iterations) ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    Completed(StepValue),
    Failed(String),
}

/// Counters reported when a run finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Invocations that produced a result
    pub completed: usize,
    /// Invocations recorded as failures
    pub failed: usize,
    /// Workflows entered, the top-level one included
    pub workflows: usize,
}

/// Mutable state of one top-level run: ancestry plus one result frame per
/// active workflow.
pub struct ExecutionContext {
    ancestry: AncestryTracker,
    frames: Vec<HashMap<String, StepValue>>,
    invocations: usize,
    summary: RunSummary,
}

impl ExecutionContext {
    pub fn new(controller: impl Into<String>) -> Self {
        Self {
            ancestry: AncestryTracker::new(controller),
            frames: Vec::new(),
            invocations: 0,
            summary: RunSummary::default(),
        }
    }

    fn enter(&mut self, key: WorkflowKey) {
        self.ancestry.push_workflow(key);
        self.frames.push(HashMap::new());
        self.summary.workflows += 1;
    }

    fn leave(&mut self) {
        self.ancestry.pop_workflow();
        self.frames.pop();
    }

    fn depth(&self) -> usize {
        self.ancestry.depth()
    }

    fn store_result(&mut self, step: &str, value: StepValue) {
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(step.to_string(), value);
        }
    }

    fn count_invocation(&mut self, limit: usize) -> Result<(), EngineError> {
        if self.invocations >= limit {
            return Err(EngineError::InvocationLimit(limit));
        }
        self.invocations += 1;
        Ok(())
    }

    fn current_key(&self) -> String {
        self.ancestry
            .current_workflow()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }
}

impl ResultScope for ExecutionContext {
    fn latest(&self, step: &str) -> Option<&StepValue> {
        self.frames.last().and_then(|frame| frame.get(step))
    }
}

/// Limits applied to a single run.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionLimits {
    pub max_step_invocations: usize,
    pub max_nesting_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_step_invocations: 10_000,
            max_nesting_depth: 64,
        }
    }
}

/// Executes workflows against a registry, an action catalog and a journal.
pub struct StepExecutor<'a> {
    registry: &'a WorkflowRegistry,
    actions: &'a ActionCatalog,
    journal: &'a Journal,
    limits: ExecutionLimits,
}

impl<'a> StepExecutor<'a> {
    pub fn new(
        registry: &'a WorkflowRegistry,
        actions: &'a ActionCatalog,
        journal: &'a Journal,
        limits: ExecutionLimits,
    ) -> Self {
        Self {
            registry,
            actions,
            journal,
            limits,
        }
    }

    /// Runs `workflow` to completion on behalf of `controller`.
    pub fn run(&self, controller: &str, workflow: &Workflow) -> Result<RunSummary, EngineError> {
        let mut ctx = ExecutionContext::new(controller);
        info!("Running workflow '{}' for '{}'", workflow.key(), controller);

        self.run_workflow(&mut ctx, workflow)?;

        let summary = ctx.summary();
        info!(
            "Workflow '{}' finished: {} completed, {} failed",
            workflow.key(),
            summary.completed,
            summary.failed
        );
        Ok(summary)
    }

    fn run_workflow(&self, ctx: &mut ExecutionContext, workflow: &Workflow) -> Result<(), EngineError> {
        if ctx.depth() >= self.limits.max_nesting_depth {
            return Err(EngineError::NestingLimit(self.limits.max_nesting_depth));
        }

        ctx.enter(workflow.key());
        let result = self.walk(ctx, workflow);
        ctx.leave();
        result
    }

    fn walk(&self, ctx: &mut ExecutionContext, workflow: &Workflow) -> Result<(), EngineError> {
        let mut current = Some(workflow.start.clone());

        while let Some(name) = current.take() {
            let step = match workflow.step(&name) {
                Ok(step) => step,
                Err(e) => {
                    error!("{}", e);
                    break;
                }
            };

            current = match self.execute_step(ctx, step)? {
                StepOutcome::Completed(value) => self.follow_transitions(ctx, workflow, step, &value)?,
                StepOutcome::Failed(reason) => {
                    warn!("Branch ends at failed step '{}': {}", step.name, reason);
                    None
                }
            };
        }
        Ok(())
    }

    /// Executes a step (every iteration, for loops) and publishes its
    /// visible result to the frame.
    fn execute_step(&self, ctx: &mut ExecutionContext, step: &Step) -> Result<StepOutcome, EngineError> {
        debug!("Executing step '{}' ({})", step.name, step.action);

        let outcome = match &step.loop_spec {
            None => self.invoke(ctx, step, None)?,
            Some(spec) => self.run_loop(ctx, step, spec)?,
        };

        if let StepOutcome::Completed(ref value) = outcome {
            ctx.store_result(&step.name, value.clone());
        }
        Ok(outcome)
    }

    /// One full invocation cycle: resolve, invoke, commit.
    fn invoke(
        &self,
        ctx: &mut ExecutionContext,
        step: &Step,
        element: Option<(&str, StepValue)>,
    ) -> Result<StepOutcome, EngineError> {
        ctx.count_invocation(self.limits.max_step_invocations)?;

        let mut invocation = Invocation::new(&step.name);
        let result = match resolve_arguments(step, element, &*ctx) {
            Ok(args) => {
                invocation.advance(StepState::ArgsResolved);
                invocation.advance(StepState::Running);
                self.actions.invoke(&step.action, &args)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(value) => {
                invocation.advance(StepState::Completed);
                self.commit(ctx, step, value.clone())?;
                ctx.summary.completed += 1;
                Ok(StepOutcome::Completed(value))
            }
            Err(e) if e.is_step_local() => {
                invocation.advance(StepState::Failed);
                self.fail(ctx, step, &e)
            }
            Err(e) => Err(e),
        }
    }

    fn run_loop(
        &self,
        ctx: &mut ExecutionContext,
        step: &Step,
        spec: &LoopSpec,
    ) -> Result<StepOutcome, EngineError> {
        let items = match template::resolve("loop", &spec.over, &*ctx) {
            Ok(StepValue::List(items)) => items,
            Ok(other) => {
                debug!("Loop input of '{}' is {}", step.name, other.kind());
                let e = EngineError::LoopInput {
                    step: step.name.clone(),
                };
                ctx.count_invocation(self.limits.max_step_invocations)?;
                return self.fail(ctx, step, &e);
            }
            Err(e) if e.is_step_local() => {
                ctx.count_invocation(self.limits.max_step_invocations)?;
                return self.fail(ctx, step, &e);
            }
            Err(e) => return Err(e),
        };

        let total = items.len();
        let mut results = Vec::with_capacity(total);

        for (index, item) in items.into_iter().enumerate() {
            trace!("Step '{}' iteration {}/{}", step.name, index + 1, total);
            let element = spec
                .bind
                .as_deref()
                .map(|name| (name, StepValue::from(item)));

            match self.invoke(ctx, step, element)? {
                StepOutcome::Completed(value) => {
                    // Later iterations see this one's result
                    ctx.store_result(&step.name, value.clone());
                    results.push(value);
                }
                failed => {
                    warn!(
                        "Loop of '{}' aborted at iteration {}/{}",
                        step.name,
                        index + 1,
                        total
                    );
                    return Ok(failed);
                }
            }
        }

        debug!("Loop of '{}' ran {} iterations", step.name, total);
        let visible = match spec.aggregate {
            LoopAggregate::Last => results.pop().unwrap_or(StepValue::Null),
            LoopAggregate::Collect => StepValue::List(results.iter().map(StepValue::to_json).collect()),
        };
        Ok(StepOutcome::Completed(visible))
    }

    /// Evaluates transitions in order. Workflow targets run as nested calls;
    /// the first matching step target is returned as the next step.
    fn follow_transitions(
        &self,
        ctx: &mut ExecutionContext,
        workflow: &Workflow,
        step: &Step,
        value: &StepValue,
    ) -> Result<Option<String>, EngineError> {
        for transition in &step.next {
            if !transition.when.matches(value) {
                continue;
            }

            match &transition.target {
                Target::Step(next) => {
                    debug!("'{}' -> '{}'", step.name, next);
                    return Ok(Some(next.clone()));
                }
                Target::Workflow(name) => match self.registry.lookup(&workflow.collection, name) {
                    Ok(child) => {
                        debug!("'{}' calls workflow '{}'", step.name, child.key());
                        self.run_workflow(ctx, &child)?;
                    }
                    Err(e) => error!("Step '{}' cannot call workflow: {}", step.name, e),
                },
            }
        }

        debug!("Branch ends after '{}'", step.name);
        Ok(None)
    }

    fn commit(&self, ctx: &ExecutionContext, step: &Step, result: StepValue) -> Result<(), EngineError> {
        let record = ExecutionRecord::new(
            ctx.ancestry.controller(),
            ctx.current_key(),
            ctx.ancestry.path_for(&step.name),
            result,
        );
        self.journal.commit(record)?;
        Ok(())
    }

    fn fail(
        &self,
        ctx: &mut ExecutionContext,
        step: &Step,
        cause: &EngineError,
    ) -> Result<StepOutcome, EngineError> {
        let message = cause.to_string();
        warn!("Step '{}' failed: {}", step.name, message);

        self.commit(ctx, step, StepValue::error(message.clone()))?;
        ctx.summary.failed += 1;
        Ok(StepOutcome::Failed(message))
    }
}

/// Resolves every argument of `step`; a loop element overrides an argument
/// of the same name.
fn resolve_arguments(
    step: &Step,
    element: Option<(&str, StepValue)>,
    scope: &dyn ResultScope,
) -> Result<ActionArgs, EngineError> {
    let mut args = ActionArgs::new();
    for (name, argument) in &step.args {
        if matches!(element, Some((bound, _)) if bound == name) {
            continue;
        }
        args.insert(name.clone(), template::resolve(name, argument, scope)?);
    }
    if let Some((name, value)) = element {
        args.insert(name.to_string(), value);
    }
    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::actions::ActionError;
    use crate::records::{RecordStatus, RecordStore, SubscriptionBus};
    use crate::workflow::{Argument, Collection, Condition, Reference, Transition};
    use serde_json::json;
    use std::sync::Arc;

    struct Fixture {
        registry: WorkflowRegistry,
        actions: ActionCatalog,
        journal: Journal,
    }

    impl Fixture {
        fn new(collection: Collection) -> Self {
            let registry = WorkflowRegistry::new();
            registry.register_collection(collection);
            Self {
                registry,
                actions: ActionCatalog::with_builtins(),
                journal: Journal::new(Arc::new(RecordStore::new()), Arc::new(SubscriptionBus::new())),
            }
        }

        fn run(&self, workflow: &str) -> Result<RunSummary, EngineError> {
            self.run_with(workflow, ExecutionLimits::default())
        }

        fn run_with(&self, workflow: &str, limits: ExecutionLimits) -> Result<RunSummary, EngineError> {
            let workflow = self.registry.lookup("demo", workflow).unwrap();
            StepExecutor::new(&self.registry, &self.actions, &self.journal, limits).run("ctl", &workflow)
        }

        fn rows(&self) -> Vec<(String, StepValue)> {
            self.journal
                .store()
                .records()
                .into_iter()
                .map(|r| (r.ancestry.joined(), r.result))
                .collect()
        }
    }

    #[test]
    fn test_state_transitions() {
        assert!(StepState::Pending.can_advance_to(StepState::ArgsResolved));
        assert!(StepState::Pending.can_advance_to(StepState::Failed));
        assert!(StepState::Running.can_advance_to(StepState::Completed));
        assert!(!StepState::Pending.can_advance_to(StepState::Running));
        assert!(!StepState::Completed.can_advance_to(StepState::Running));
        assert!(StepState::Failed.is_terminal());
        assert!(!StepState::Running.is_terminal());
    }

    #[test]
    fn test_linear_chain_with_reference() {
        let workflow = Workflow::new("main", "start")
            .with_step(
                Step::new("start", "echo")
                    .with_arg("value", Argument::literal(json!({"message": "HELLO WORLD"})))
                    .then(Transition::to_step("1")),
            )
            .with_step(
                Step::new("1", "echo")
                    .with_arg("value", Reference::new("start").with_format("REPEATING: {message}")),
            );
        let fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));

        let summary = fixture.run("main").unwrap();
        assert_eq!(summary.completed, 2);
        assert_eq!(
            fixture.rows(),
            vec![
                ("ctl,demo-main,start".to_string(), StepValue::from(json!({"message": "HELLO WORLD"}))),
                (
                    "ctl,demo-main,1".to_string(),
                    StepValue::from("REPEATING: {'message': 'HELLO WORLD'}")
                ),
            ]
        );
    }

    #[test]
    fn test_nested_workflow_call_then_continue() {
        let parent = Workflow::new("parent", "start")
            .with_step(
                Step::new("start", "repeat_back_to_me")
                    .with_arg("call", "Parent Step One")
                    .then(Transition::to_workflow("child"))
                    .then(Transition::to_step("1")),
            )
            .with_step(Step::new("1", "repeat_back_to_me").with_arg("call", "Parent Step Two"));
        let child = Workflow::new("child", "start")
            .with_step(Step::new("start", "repeat_back_to_me").with_arg("call", "Child Step One"));
        let fixture = Fixture::new(
            Collection::new("demo")
                .with_workflow(parent)
                .with_workflow(child),
        );

        let summary = fixture.run("parent").unwrap();
        assert_eq!(summary.workflows, 2);

        let records = fixture.journal.store().records();
        let paths: Vec<_> = records.iter().map(|r| r.ancestry.joined()).collect();
        assert_eq!(
            paths,
            vec![
                "ctl,demo-parent,start",
                "ctl,demo-parent,demo-child,start",
                "ctl,demo-parent,1",
            ]
        );
        assert_eq!(records[1].workflow_key, "demo-child");
        assert_eq!(records[1].result, StepValue::from("REPEATING: Child Step One"));
    }

    #[test]
    fn test_child_cannot_see_parent_results() {
        let parent = Workflow::new("parent", "start").with_step(
            Step::new("start", "echo")
                .with_arg("value", "parent")
                .then(Transition::to_workflow("child")),
        );
        let child = Workflow::new("child", "start")
            .with_step(Step::new("start", "echo").with_arg("value", Argument::reference("start")));
        let fixture = Fixture::new(
            Collection::new("demo")
                .with_workflow(parent)
                .with_workflow(child),
        );

        let summary = fixture.run("parent").unwrap();
        assert_eq!(summary.failed, 1);
        let records = fixture.journal.store().records();
        assert_eq!(records[1].status, RecordStatus::Failure);
    }

    #[test]
    fn test_loop_sees_previous_iteration() {
        let workflow = Workflow::new("main", "start")
            .with_step(
                Step::new("start", "return_plus_one")
                    .with_arg("number", Reference::new("start").with_default(0))
                    .with_loop(LoopSpec::over(vec![json!(1), json!(2), json!(3), json!(4)]))
                    .then(Transition::to_step("1")),
            )
            .with_step(
                Step::new("1", "repeat_back_to_me")
                    .with_arg("call", Argument::reference("start")),
            );
        let fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));

        fixture.run("main").unwrap();
        let results: Vec<_> = fixture.rows().into_iter().map(|(_, v)| v).collect();
        assert_eq!(
            results,
            vec![
                StepValue::from(1_i64),
                StepValue::from(2_i64),
                StepValue::from(3_i64),
                StepValue::from(4_i64),
                StepValue::from("REPEATING: 4"),
            ]
        );
    }

    #[test]
    fn test_loop_binding_and_collect() {
        let workflow = Workflow::new("main", "start")
            .with_step(
                Step::new("start", "return_plus_one")
                    .with_loop(
                        LoopSpec::over(vec![json!(10), json!(20)])
                            .bind("number")
                            .aggregate(LoopAggregate::Collect),
                    )
                    .then(Transition::to_step("1")),
            )
            .with_step(Step::new("1", "echo").with_arg("value", Argument::reference("start")));
        let fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));

        fixture.run("main").unwrap();
        let rows = fixture.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].0, "ctl,demo-main,start");
        assert_eq!(rows[1].0, "ctl,demo-main,start");
        assert_eq!(rows[2].1, StepValue::from(json!([11, 21])));
    }

    #[test]
    fn test_empty_loop_writes_no_records() {
        let workflow = Workflow::new("main", "start")
            .with_step(
                Step::new("start", "return_plus_one")
                    .with_loop(LoopSpec::over(Vec::new()).bind("number"))
                    .then(Transition::to_step("1")),
            )
            .with_step(Step::new("1", "echo").with_arg("value", Argument::reference("start")));
        let fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));

        fixture.run("main").unwrap();
        assert_eq!(fixture.rows(), vec![("ctl,demo-main,1".to_string(), StepValue::Null)]);
    }

    #[test]
    fn test_loop_input_must_be_list() {
        let workflow = Workflow::new("main", "start").with_step(
            Step::new("start", "echo")
                .with_arg("value", "x")
                .with_loop(LoopSpec {
                    over: Argument::literal("not a list"),
                    bind: None,
                    aggregate: LoopAggregate::Last,
                }),
        );
        let fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));

        let summary = fixture.run("main").unwrap();
        assert_eq!(summary.failed, 1);
        assert!(fixture.journal.store().records()[0].is_failure());
    }

    #[test]
    fn test_failed_step_ends_branch() {
        let workflow = Workflow::new("main", "start")
            .with_step(
                Step::new("start", "fail")
                    .with_arg("message", "boom")
                    .then(Transition::to_step("1")),
            )
            .with_step(Step::new("1", "echo").with_arg("value", "unreachable"));
        let fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));

        let summary = fixture.run("main").unwrap();
        assert_eq!(summary, RunSummary { completed: 0, failed: 1, workflows: 1 });

        let records = fixture.journal.store().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].result, StepValue::error("action 'fail' failed: boom"));
    }

    #[test]
    fn test_unknown_action_is_recorded() {
        let workflow = Workflow::new("main", "start").with_step(Step::new("start", "missing_action"));
        let fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));

        fixture.run("main").unwrap();
        let records = fixture.journal.store().records();
        assert_eq!(records[0].result, StepValue::error("unknown action 'missing_action'"));
    }

    #[test]
    fn test_conditional_transitions() {
        let workflow = Workflow::new("main", "start")
            .with_step(
                Step::new("start", "echo")
                    .with_arg("value", Argument::literal(7))
                    .then(Transition::to_step("small").when(Condition::LessThan(5.0)))
                    .then(Transition::to_step("large").when(Condition::GreaterThan(5.0))),
            )
            .with_step(Step::new("small", "echo").with_arg("value", "small"))
            .with_step(Step::new("large", "echo").with_arg("value", "large"));
        let fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));

        fixture.run("main").unwrap();
        let paths: Vec<_> = fixture.rows().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["ctl,demo-main,start", "ctl,demo-main,large"]);
    }

    #[test]
    fn test_invocation_limit_stops_cycles() {
        let workflow = Workflow::new("main", "start").with_step(
            Step::new("start", "echo")
                .with_arg("value", "again")
                .then(Transition::to_step("start")),
        );
        let fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));

        let limits = ExecutionLimits {
            max_step_invocations: 5,
            ..ExecutionLimits::default()
        };
        assert!(matches!(fixture.run_with("main", limits), Err(EngineError::InvocationLimit(5))));
        assert_eq!(fixture.journal.store().len(), 5);
    }

    #[test]
    fn test_nesting_limit_stops_recursion() {
        let workflow = Workflow::new("main", "start").with_step(
            Step::new("start", "echo")
                .with_arg("value", "down")
                .then(Transition::to_workflow("main")),
        );
        let fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));

        let limits = ExecutionLimits {
            max_nesting_depth: 3,
            ..ExecutionLimits::default()
        };
        assert!(matches!(fixture.run_with("main", limits), Err(EngineError::NestingLimit(3))));
        assert_eq!(fixture.journal.store().len(), 3);
    }

    #[test]
    fn test_store_exhaustion_aborts_run() {
        let workflow = Workflow::new("main", "start")
            .with_step(
                Step::new("start", "echo")
                    .with_arg("value", "one")
                    .then(Transition::to_step("1")),
            )
            .with_step(Step::new("1", "echo").with_arg("value", "two"));
        let mut fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));
        fixture.journal = Journal::new(
            Arc::new(RecordStore::with_capacity(1)),
            Arc::new(SubscriptionBus::new()),
        );

        assert!(matches!(fixture.run("main"), Err(EngineError::StoreExhausted(_))));
        assert_eq!(fixture.journal.store().len(), 1);
    }

    #[test]
    fn test_closure_action_in_chain() {
        let workflow = Workflow::new("main", "start")
            .with_step(
                Step::new("start", "echo")
                    .with_arg("value", Argument::literal(4))
                    .then(Transition::to_step("1")),
            )
            .with_step(Step::new("1", "increment_and_repeat").with_arg("number", Argument::reference("start")));
        let mut fixture = Fixture::new(Collection::new("demo").with_workflow(workflow));
        fixture.actions.register(
            "increment_and_repeat",
            |args: &ActionArgs| -> Result<StepValue, ActionError> {
                let n = args
                    .get("number")
                    .and_then(StepValue::as_f64)
                    .ok_or_else(|| ActionError::missing_argument("number"))?;
                Ok(StepValue::Text(format!("REPEATING: {}", n as i64 + 1)))
            },
        );

        fixture.run("main").unwrap();
        assert_eq!(fixture.rows()[1].1, StepValue::from("REPEATING: 5"));
    }
}
