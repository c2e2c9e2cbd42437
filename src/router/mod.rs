//! Dispatch boundary between tasks and the handlers that actually act on actions.

pub mod local;

pub use local::*;

use crate::task::types::{ActionState, ExecutedAction, ResolvedAction, TaskOutput};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Status of an action as reported by a handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStatus {
    pub state: ActionState,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActionStatus {
    pub fn new(state: ActionState) -> Self {
        Self {
            state,
            outputs: Map::new(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Turn a handler status into a task output for the given resolved action
    pub fn into_output(self, resolved: &ResolvedAction) -> TaskOutput {
        let executed_action = (self.state == ActionState::Ready).then(|| ExecutedAction {
            resolved: resolved.clone(),
            outputs: self.outputs.clone(),
        });
        TaskOutput {
            state: self.state,
            version: resolved.version.clone(),
            outputs: self.outputs,
            detail: self.detail,
            resolved_action: Some(resolved.clone()),
            executed_action,
        }
    }
}

impl From<&TaskOutput> for ActionStatus {
    fn from(output: &TaskOutput) -> Self {
        Self {
            state: output.state,
            outputs: output.outputs.clone(),
            detail: output.detail.clone(),
        }
    }
}

/// Options threaded from the requesting command through to execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub force: bool,
    /// Start code syncs after deploying (develop mode)
    pub start_syncs: bool,
}

/// Status of a provider's environment after cleanup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentStatus {
    pub ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Handlers for every action kind
#[async_trait::async_trait]
pub trait ActionRouter: Send + Sync {
    async fn get_status(&self, action: &ResolvedAction) -> Result<ActionStatus>;

    async fn execute(
        &self,
        action: &ResolvedAction,
        dependencies: &[ExecutedAction],
        options: ExecuteOptions,
    ) -> Result<ActionStatus>;

    async fn delete(&self, action: &ResolvedAction) -> Result<ActionStatus>;

    /// Tear down provider-level resources of the environment, keyed by provider name
    async fn cleanup_environment(&self) -> Result<BTreeMap<String, EnvironmentStatus>>;
}
