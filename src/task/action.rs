use crate::action::{
    Action, ActionKind, ActionReference, ConfigGraph, DependencyReference, GraphError,
};
use crate::router::ActionRouter;
use crate::task::base::*;
use crate::task::execute::execute_task_for_action;
use crate::task::resolve::ResolveActionTask;
use crate::task::results::GraphResults;
use crate::task::types::*;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{Span, debug};

/// Parameters shared by an action task and every task it spawns for its dependencies
#[derive(Clone)]
pub struct ActionTaskParams {
    pub graph: Arc<ConfigGraph>,
    pub router: Arc<dyn ActionRouter>,
    pub force: bool,
    /// Actions whose own work must be forced even though the requesting task is not
    pub force_actions: Arc<BTreeSet<ActionReference>>,
    pub skip_dependencies: bool,
    /// Downgrade explicit non-Build dependencies to resolve-only (or nothing)
    pub skip_runtime_dependencies: bool,
    pub start_syncs: bool,
}

impl ActionTaskParams {
    pub fn builder(
        graph: Arc<ConfigGraph>,
        router: Arc<dyn ActionRouter>,
    ) -> ActionTaskParamsBuilder {
        ActionTaskParamsBuilder {
            graph,
            router,
            force: false,
            force_actions: BTreeSet::new(),
            force_build: false,
            skip_dependencies: false,
            skip_runtime_dependencies: false,
            start_syncs: false,
        }
    }

    /// Same parameters with a different force flag
    pub fn with_force(&self, force: bool) -> Self {
        Self {
            force,
            ..self.clone()
        }
    }

    pub fn is_forced(&self, reference: &ActionReference) -> bool {
        self.force_actions.contains(reference)
    }
}

impl fmt::Debug for ActionTaskParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTaskParams")
            .field("force", &self.force)
            .field("force_actions", &self.force_actions)
            .field("skip_dependencies", &self.skip_dependencies)
            .field("skip_runtime_dependencies", &self.skip_runtime_dependencies)
            .field("start_syncs", &self.start_syncs)
            .finish_non_exhaustive()
    }
}

/// Collects the force set before any task exists; `build` freezes it.
pub struct ActionTaskParamsBuilder {
    graph: Arc<ConfigGraph>,
    router: Arc<dyn ActionRouter>,
    force: bool,
    force_actions: BTreeSet<ActionReference>,
    force_build: bool,
    skip_dependencies: bool,
    skip_runtime_dependencies: bool,
    start_syncs: bool,
}

impl ActionTaskParamsBuilder {
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn force_action(mut self, reference: ActionReference) -> Self {
        self.force_actions.insert(reference);
        self
    }

    pub fn force_actions(mut self, references: impl IntoIterator<Item = ActionReference>) -> Self {
        self.force_actions.extend(references);
        self
    }

    /// Shorthand for forcing every Build action in the graph
    pub fn force_build(mut self, force_build: bool) -> Self {
        self.force_build = force_build;
        self
    }

    pub fn skip_dependencies(mut self, skip: bool) -> Self {
        self.skip_dependencies = skip;
        self
    }

    pub fn skip_runtime_dependencies(mut self, skip: bool) -> Self {
        self.skip_runtime_dependencies = skip;
        self
    }

    pub fn start_syncs(mut self, start_syncs: bool) -> Self {
        self.start_syncs = start_syncs;
        self
    }

    pub fn build(mut self) -> ActionTaskParams {
        if self.force_build {
            self.force_actions
                .extend(self.graph.get_builds().iter().map(|a| a.reference()));
        }
        ActionTaskParams {
            graph: self.graph,
            router: self.router,
            force: self.force,
            force_actions: Arc::new(self.force_actions),
            skip_dependencies: self.skip_dependencies,
            skip_runtime_dependencies: self.skip_runtime_dependencies,
            start_syncs: self.start_syncs,
        }
    }
}

/// What a dependant needs from one of its dependencies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyNeed {
    Execute,
    Resolve,
    Nothing,
}

/// State shared by every task bound to an action
pub struct ActionTaskCore {
    core: TaskCore,
    action: Arc<Action>,
    params: ActionTaskParams,
    span: Span,
}

impl ActionTaskCore {
    pub fn new(action: Arc<Action>, params: ActionTaskParams) -> Self {
        let span = tracing::info_span!("action", kind = %action.kind(), name = %action.name());
        Self {
            core: TaskCore::new(params.force, params.skip_dependencies),
            action,
            params,
            span,
        }
    }

    pub fn core(&self) -> &TaskCore {
        &self.core
    }

    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    pub fn params(&self) -> &ActionTaskParams {
        &self.params
    }

    pub fn graph(&self) -> &ConfigGraph {
        &self.params.graph
    }

    pub fn router(&self) -> &dyn ActionRouter {
        self.params.router.as_ref()
    }

    /// Action-scoped log context
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Parameters for a task spawned on behalf of this one for `action`
    pub fn dependency_params(&self, action: &Action) -> ActionTaskParams {
        self.params
            .with_force(self.params.is_forced(&action.reference()))
    }

    /// The resolve task for the given action
    pub fn resolve_task(&self, action: Arc<Action>) -> TaskRef {
        let params = self.dependency_params(&action);
        Arc::new(ResolveActionTask::new(action, params))
    }

    /// The execute task for the given action, e.g. a build task for a Build action.
    ///
    /// Not always the right task for a dependency: deletion depends on deletions.
    pub fn execute_task(&self, action: Arc<Action>) -> TaskRef {
        let params = self.dependency_params(&action);
        execute_task_for_action(action, params)
    }

    pub fn lookup(&self, dep: &DependencyReference) -> Result<Arc<Action>, GraphError> {
        self.graph().get_action_by_ref(&dep.reference(), true)
    }

    fn disabled_runtime_dependency(&self, dependency: &Action) -> GraphError {
        GraphError::DisabledRuntimeDependency {
            dependant: self.action.key(),
            dependency: dependency.key(),
            description: self.action.long_description(),
        }
    }

    /// Decide whether `dep` needs a full execute, a resolve, or nothing
    pub fn classify_dependency(
        &self,
        dep: &DependencyReference,
        target: &Action,
    ) -> Result<DependencyNeed, GraphError> {
        if dep.needs_executed_outputs {
            if target.is_disabled() && target.kind() != ActionKind::Build {
                return Err(self.disabled_runtime_dependency(target));
            }
            Ok(DependencyNeed::Execute)
        } else if dep.explicit {
            // Disabled actions never run, apart from builds
            let disabled = target.is_disabled() && target.kind() != ActionKind::Build;
            let skipped = self.params.skip_runtime_dependencies && dep.kind != ActionKind::Build;
            if disabled || skipped {
                if dep.needs_static_outputs {
                    Ok(DependencyNeed::Resolve)
                } else {
                    Ok(DependencyNeed::Nothing)
                }
            } else {
                Ok(DependencyNeed::Execute)
            }
        } else if dep.needs_static_outputs {
            Ok(DependencyNeed::Resolve)
        } else {
            Ok(DependencyNeed::Nothing)
        }
    }

    /// Status checks only need the action's own configuration
    pub fn default_status_dependencies(&self) -> Vec<TaskRef> {
        vec![self.resolve_task(Arc::clone(&self.action))]
    }

    pub fn default_process_dependencies(
        &self,
        status: Option<&TaskOutput>,
    ) -> Result<Vec<TaskRef>, GraphError> {
        let _entered = self.span.enter();
        let resolve_task = self.resolve_task(Arc::clone(&self.action));

        if status.is_some_and(TaskOutput::is_ready) && !self.core.force() {
            debug!("{} is ready, only resolving", self.action.key());
            return Ok(vec![resolve_task]);
        }

        let mut tasks = vec![resolve_task];
        for dep in self.action.dependency_references() {
            let target = self.lookup(dep)?;
            match self.classify_dependency(dep, &target)? {
                DependencyNeed::Execute => tasks.push(self.execute_task(target)),
                DependencyNeed::Resolve => tasks.push(self.resolve_task(target)),
                DependencyNeed::Nothing => {}
            }
        }

        let tasks = dedupe_tasks(tasks);
        debug!(
            "{} has {} process dependencies",
            self.action.key(),
            tasks.len()
        );
        Ok(tasks)
    }

    /// The resolved version of `action` from the given results.
    ///
    /// Errors if the results do not contain the resolve task's result.
    pub fn get_resolved_action(
        &self,
        task_key: &str,
        action: &Arc<Action>,
        results: &GraphResults,
    ) -> Result<ResolvedAction, InternalError> {
        let resolve_task = self.resolve_task(Arc::clone(action));
        results
            .get_result(resolve_task.as_ref())
            .and_then(|result| result.output())
            .and_then(|output| output.resolved_action.clone())
            .ok_or_else(|| InternalError::MissingResult {
                task: task_key.to_string(),
                action: action.key(),
                expected: "resolved",
            })
    }

    /// The executed version of `action` from the given results.
    ///
    /// Errors if the results do not contain the execute task's result.
    pub fn get_executed_action(
        &self,
        task_key: &str,
        action: &Arc<Action>,
        results: &GraphResults,
    ) -> Result<ExecutedAction, InternalError> {
        let execute_task = self.execute_task(Arc::clone(action));
        results
            .get_result(execute_task.as_ref())
            .and_then(|result| result.output())
            .and_then(|output| output.executed_action.clone())
            .ok_or_else(|| InternalError::MissingResult {
                task: task_key.to_string(),
                action: action.key(),
                expected: "executed",
            })
    }
}

impl fmt::Debug for ActionTaskCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionTaskCore")
            .field("core", &self.core)
            .field("action", &self.action.key())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
