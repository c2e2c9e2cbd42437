use crate::action::{Action, ActionKind, ActionReference, GraphError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Task type discriminator
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskType {
    ResolveAction,
    Build,
    Deploy,
    Run,
    Test,
    DeleteDeploy,
}

impl TaskType {
    pub const ALL: [TaskType; 6] = [
        TaskType::ResolveAction,
        TaskType::Build,
        TaskType::Deploy,
        TaskType::Run,
        TaskType::Test,
        TaskType::DeleteDeploy,
    ];

    /// The task type that drives an action of the given kind to its executed state.
    ///
    /// This is the single mapping from action kind to execute task.
    pub fn execute_for(kind: ActionKind) -> TaskType {
        match kind {
            ActionKind::Build => TaskType::Build,
            ActionKind::Deploy => TaskType::Deploy,
            ActionKind::Run => TaskType::Run,
            ActionKind::Test => TaskType::Test,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::ResolveAction => "resolve-action",
            TaskType::Build => "build",
            TaskType::Deploy => "deploy",
            TaskType::Run => "run",
            TaskType::Test => "test",
            TaskType::DeleteDeploy => "delete-deploy",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown task type '{0}'")]
pub struct UnknownTaskType(pub String);

impl FromStr for TaskType {
    type Err = UnknownTaskType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTaskType(s.to_string()))
    }
}

/// State of an action as reported by its handlers
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ActionState {
    Ready,
    NotReady,
    Outdated,
    Missing,
    Failed,
    Unknown,
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActionState::Ready => "ready",
            ActionState::NotReady => "not-ready",
            ActionState::Outdated => "outdated",
            ActionState::Missing => "missing",
            ActionState::Failed => "failed",
            ActionState::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// An action whose configuration has been evaluated
#[derive(Debug, Clone)]
pub struct ResolvedAction {
    pub action: Arc<Action>,
    pub version: String,
    /// The action's own static outputs
    pub outputs: Map<String, Value>,
    /// Outputs of the dependencies this action's configuration needed, keyed by action key
    pub dependency_outputs: BTreeMap<String, Map<String, Value>>,
}

impl ResolvedAction {
    pub fn reference(&self) -> ActionReference {
        self.action.reference()
    }
}

/// An action that has reached its terminal executed state
#[derive(Debug, Clone)]
pub struct ExecutedAction {
    pub resolved: ResolvedAction,
    /// Runtime outputs, only observable after execution
    pub outputs: Map<String, Value>,
}

/// What `get_status` and `process` hand back to the solver
#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub state: ActionState,
    pub version: String,
    pub outputs: Map<String, Value>,
    pub detail: Option<String>,
    pub resolved_action: Option<ResolvedAction>,
    pub executed_action: Option<ExecutedAction>,
}

impl TaskOutput {
    pub fn new(state: ActionState, version: impl Into<String>) -> Self {
        Self {
            state,
            version: version.into(),
            outputs: Map::new(),
            detail: None,
            resolved_action: None,
            executed_action: None,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == ActionState::Ready
    }
}

/// Contract violations between tasks and whoever executes them
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InternalError {
    #[error("Could not find {expected} action '{action}' when processing task '{task}'.")]
    MissingResult {
        task: String,
        action: String,
        expected: &'static str,
    },
    #[error("Result for task '{key}' was recorded more than once")]
    DuplicateResult { key: String },
    #[error("Task '{key}' panicked while running")]
    TaskPanicked { key: String },
}

/// Errors returned by a task's `get_status` or `process`
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Fatal for the whole request
    #[error(transparent)]
    Internal(#[from] InternalError),
    /// The action's handler failed; reported on the task's result
    #[error(transparent)]
    Handler(#[from] anyhow::Error),
}

/// Errors that abort a whole solve
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SolveError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Internal(#[from] InternalError),
}
