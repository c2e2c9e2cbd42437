use crate::action::{Action, ActionKind, ActionReference};
use crate::router::{ActionRouter, ActionStatus, EnvironmentStatus, ExecuteOptions};
use crate::task::types::{ActionState, ExecutedAction, ResolvedAction};
use anyhow::{Result, anyhow};
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Operations a [`LocalRouter`] has been asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GetStatus,
    Execute,
    Delete,
    CleanupEnvironment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouterOperation {
    pub kind: OperationKind,
    pub action: Option<ActionReference>,
}

#[derive(Debug, Clone)]
struct ExecutedState {
    version: String,
    outputs: Map<String, Value>,
}

#[derive(Debug, Default, Clone, Copy)]
struct InFlight {
    current: usize,
    max: usize,
}

/// In-process handlers that simulate executing and deleting actions.
///
/// Keeps track of what is "deployed", records every operation in order and
/// the peak number of concurrent executions per action kind.
pub struct LocalRouter {
    provider_name: String,
    delay: Duration,
    executed: DashMap<ActionReference, ExecutedState>,
    failing: HashSet<ActionReference>,
    operations: Mutex<Vec<RouterOperation>>,
    in_flight: Mutex<HashMap<ActionKind, InFlight>>,
}

impl Default for LocalRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalRouter {
    pub fn new() -> Self {
        Self {
            provider_name: "local".to_string(),
            delay: Duration::ZERO,
            executed: DashMap::new(),
            failing: HashSet::new(),
            operations: Mutex::new(Vec::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Simulated time every execute and delete takes
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Make execute and delete fail for the given action
    pub fn with_failure(mut self, reference: ActionReference) -> Self {
        self.failing.insert(reference);
        self
    }

    /// Pretend the action has already been executed at its current version
    pub fn with_ready(self, action: &Action) -> Self {
        self.executed.insert(
            action.reference(),
            ExecutedState {
                version: action.version_string(),
                outputs: Map::new(),
            },
        );
        self
    }

    pub fn is_executed(&self, reference: &ActionReference) -> bool {
        self.executed.contains_key(reference)
    }

    pub async fn operations(&self) -> Vec<RouterOperation> {
        self.operations.lock().await.clone()
    }

    /// Actions passed to the given operation, in call order
    pub async fn actions_for(&self, kind: OperationKind) -> Vec<ActionReference> {
        self.operations
            .lock()
            .await
            .iter()
            .filter(|op| op.kind == kind)
            .filter_map(|op| op.action.clone())
            .collect()
    }

    /// Highest number of simultaneous executes/deletes seen for one action kind
    pub async fn max_concurrent(&self, kind: ActionKind) -> usize {
        self.in_flight
            .lock()
            .await
            .get(&kind)
            .map(|stats| stats.max)
            .unwrap_or(0)
    }

    async fn record(&self, kind: OperationKind, action: Option<ActionReference>) {
        self.operations
            .lock()
            .await
            .push(RouterOperation { kind, action });
    }

    async fn simulate_work(&self, kind: ActionKind) {
        {
            let mut in_flight = self.in_flight.lock().await;
            let stats = in_flight.entry(kind).or_default();
            stats.current += 1;
            stats.max = stats.max.max(stats.current);
        }

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        let mut in_flight = self.in_flight.lock().await;
        if let Some(stats) = in_flight.get_mut(&kind) {
            stats.current -= 1;
        }
    }

    fn check_failure(&self, reference: &ActionReference, operation: &str) -> Result<()> {
        if self.failing.contains(reference) {
            return Err(anyhow!("{} handler failed for {}", operation, reference));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ActionRouter for LocalRouter {
    async fn get_status(&self, action: &ResolvedAction) -> Result<ActionStatus> {
        let reference = action.reference();
        self.record(OperationKind::GetStatus, Some(reference.clone()))
            .await;

        let status = match self.executed.get(&reference) {
            Some(state) if state.version == action.version => ActionStatus {
                state: ActionState::Ready,
                outputs: state.outputs.clone(),
                detail: None,
            },
            Some(_) => ActionStatus::new(ActionState::Outdated),
            None => ActionStatus::new(ActionState::NotReady),
        };
        debug!("Status of {} is {}", reference, status.state);
        Ok(status)
    }

    async fn execute(
        &self,
        action: &ResolvedAction,
        dependencies: &[ExecutedAction],
        options: ExecuteOptions,
    ) -> Result<ActionStatus> {
        let reference = action.reference();
        self.record(OperationKind::Execute, Some(reference.clone()))
            .await;
        self.simulate_work(reference.kind).await;
        self.check_failure(&reference, "Execute")?;

        let dependency_keys: Vec<Value> = dependencies
            .iter()
            .map(|dep| Value::String(dep.resolved.reference().key()))
            .collect();
        let mut outputs = Map::new();
        outputs.insert("version".to_string(), json!(action.version));
        outputs.insert("dependencies".to_string(), Value::Array(dependency_keys));

        self.executed.insert(
            reference.clone(),
            ExecutedState {
                version: action.version.clone(),
                outputs: outputs.clone(),
            },
        );

        info!("Executed {} ({})", reference, action.version);
        let mut status = ActionStatus {
            state: ActionState::Ready,
            outputs,
            detail: None,
        };
        if options.start_syncs && reference.kind == ActionKind::Deploy {
            status = status.with_detail("syncs started");
        }
        Ok(status)
    }

    async fn delete(&self, action: &ResolvedAction) -> Result<ActionStatus> {
        let reference = action.reference();
        self.record(OperationKind::Delete, Some(reference.clone()))
            .await;
        self.simulate_work(reference.kind).await;
        self.check_failure(&reference, "Delete")?;

        let detail = match self.executed.remove(&reference) {
            Some(_) => "deleted",
            None => "not deployed",
        };
        info!("Deleted {} ({})", reference, detail);
        Ok(ActionStatus::new(ActionState::Missing).with_detail(detail))
    }

    async fn cleanup_environment(&self) -> Result<BTreeMap<String, EnvironmentStatus>> {
        self.record(OperationKind::CleanupEnvironment, None).await;
        Ok(BTreeMap::from([(
            self.provider_name.clone(),
            EnvironmentStatus {
                ready: false,
                detail: Some("environment cleaned up".to_string()),
            },
        )]))
    }
}
