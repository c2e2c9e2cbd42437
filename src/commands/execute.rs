use crate::action::ActionKind;
use crate::commands::CommandContext;
use crate::task::{
    ActionState, GraphResult, GraphResults, TaskOutcome, TaskRef, TaskType,
    execute_task_for_action,
};
use anyhow::Result;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ExecuteCommandOptions {
    pub kind: ActionKind,
    /// Actions to execute; every enabled action of the kind when empty
    pub names: Vec<String>,
    pub force: bool,
    /// Force every Build in the graph, not just the requested actions
    pub force_build: bool,
    pub skip_dependencies: bool,
    pub skip_runtime_dependencies: bool,
    pub start_syncs: bool,
}

impl ExecuteCommandOptions {
    pub fn new(kind: ActionKind, names: Vec<String>) -> Self {
        Self {
            kind,
            names,
            force: false,
            force_build: false,
            skip_dependencies: false,
            skip_runtime_dependencies: false,
            start_syncs: false,
        }
    }
}

/// What happened to one executed action
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub state: ActionState,
    pub version: String,
    /// Already up to date, nothing was done
    pub skipped: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&GraphResult> for ActionOutcome {
    fn from(result: &GraphResult) -> Self {
        match &result.outcome {
            TaskOutcome::Skipped(output) | TaskOutcome::Processed(output) => Self {
                state: output.state,
                version: output.version.clone(),
                skipped: result.was_skipped(),
                outputs: output.outputs.clone(),
                detail: output.detail.clone(),
                error: None,
            },
            TaskOutcome::Failed { error } | TaskOutcome::Aborted { reason: error } => Self {
                state: ActionState::Failed,
                version: result.input_version.clone(),
                skipped: false,
                outputs: Map::new(),
                detail: None,
                error: Some(error.clone()),
            },
        }
    }
}

/// Outcomes of every execute task in a run, keyed by action key (e.g. `deploy.api`)
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecuteResult {
    pub actions: BTreeMap<String, ActionOutcome>,
}

impl ExecuteResult {
    pub fn from_results(results: &GraphResults) -> Self {
        let actions = results
            .iter()
            .filter(|r| !matches!(r.task_type, TaskType::ResolveAction | TaskType::DeleteDeploy))
            .map(|r| (r.key.clone(), ActionOutcome::from(r)))
            .collect();
        Self { actions }
    }

    pub fn failed(&self) -> impl Iterator<Item = (&String, &ActionOutcome)> {
        self.actions.iter().filter(|(_, o)| o.error.is_some())
    }

    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Build, deploy, run or test the selected actions and everything they need
pub async fn execute_actions(
    ctx: &CommandContext,
    options: ExecuteCommandOptions,
) -> Result<ExecuteResult> {
    let actions = ctx.graph.get_actions_by_kind(options.kind, &options.names)?;
    if actions.is_empty() {
        warn!("No {} actions found. Aborting.", options.kind);
        return Ok(ExecuteResult::default());
    }

    let params = ctx
        .params()
        .force(options.force)
        .force_build(options.force_build)
        .skip_dependencies(options.skip_dependencies)
        .skip_runtime_dependencies(options.skip_runtime_dependencies)
        .start_syncs(options.start_syncs && options.kind == ActionKind::Deploy)
        .build();

    let tasks: Vec<TaskRef> = actions
        .into_iter()
        .map(|action| {
            // A requested Build is also forced by force_build
            let forced = params.force || params.is_forced(&action.reference());
            execute_task_for_action(action, params.with_force(forced))
        })
        .collect();

    info!("Executing {} {} action(s)", tasks.len(), options.kind);
    let results = ctx.solver.process_tasks(tasks).await?;
    let result = ExecuteResult::from_results(&results);

    let failed = result.failed().count();
    if failed > 0 {
        warn!("{} action(s) failed", failed);
    }
    Ok(result)
}
