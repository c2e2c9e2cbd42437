use crate::action::{Action, ActionKind, GraphError};
use crate::router::ActionStatus;
use crate::task::action::{ActionTaskCore, ActionTaskParams};
use crate::task::base::*;
use crate::task::results::GraphResults;
use crate::task::types::*;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{Instrument, debug, info};

/// Tears down a deployed action.
///
/// In dependants-first mode, every direct Deploy dependant that is also being
/// deleted becomes a process dependency, so dependants go first. This inverts
/// the normal dependency direction, so it does not use the default classification.
#[derive(Debug)]
pub struct DeleteDeployTask {
    inner: ActionTaskCore,
    delete_deploy_names: Arc<BTreeSet<String>>,
    dependants_first: bool,
}

impl DeleteDeployTask {
    pub fn new(
        action: Arc<Action>,
        params: ActionTaskParams,
        delete_deploy_names: Arc<BTreeSet<String>>,
        dependants_first: bool,
    ) -> Self {
        Self {
            inner: ActionTaskCore::new(action, params),
            delete_deploy_names,
            dependants_first,
        }
    }
}

#[async_trait]
impl Task for DeleteDeployTask {
    fn task_type(&self) -> TaskType {
        TaskType::DeleteDeploy
    }

    fn core(&self) -> &TaskCore {
        self.inner.core()
    }

    fn name(&self) -> &str {
        self.inner.action().name()
    }

    fn description(&self) -> String {
        format!("deleting {}", self.inner.action().long_description())
    }

    fn input_version(&self) -> String {
        self.inner.action().version_string()
    }

    fn resolve_status_dependencies(&self) -> Result<Vec<TaskRef>, GraphError> {
        Ok(self.inner.default_status_dependencies())
    }

    fn resolve_process_dependencies(
        &self,
        _status: Option<&TaskOutput>,
    ) -> Result<Vec<TaskRef>, GraphError> {
        let resolve_task = self.inner.resolve_task(Arc::clone(self.inner.action()));

        if !self.dependants_first {
            return Ok(vec![resolve_task]);
        }

        // Reverse dependency order, so we look up dependants rather than dependencies.
        let dependants = self
            .inner
            .graph()
            .get_dependants(ActionKind::Deploy, self.name(), false)
            .into_iter()
            .filter(|action| action.kind() == ActionKind::Deploy)
            .filter(|action| self.delete_deploy_names.contains(action.name()))
            .map(|action| -> TaskRef {
                Arc::new(DeleteDeployTask::new(
                    action,
                    self.inner.params().with_force(false),
                    Arc::clone(&self.delete_deploy_names),
                    self.dependants_first,
                ))
            });

        let tasks = dedupe_tasks(std::iter::once(resolve_task).chain(dependants));
        debug!(
            "{} waits for {} dependant deletions",
            self.inner.action().key(),
            tasks.len() - 1
        );
        Ok(tasks)
    }

    async fn get_status(
        &self,
        _dependency_results: &GraphResults,
    ) -> Result<Option<TaskOutput>, TaskError> {
        Ok(None)
    }

    async fn process(
        &self,
        dependency_results: &GraphResults,
        _status: Option<&TaskOutput>,
    ) -> Result<TaskOutput, TaskError> {
        let resolved =
            self.inner
                .get_resolved_action(&self.key(), self.inner.action(), dependency_results)?;

        async {
            info!("Deleting {}", resolved.action.key());
            let status = self.inner.router().delete(&resolved).await?;
            let mut output = status.into_output(&resolved);
            output.executed_action = None;
            Ok::<_, TaskError>(output)
        }
        .instrument(self.inner.span().clone())
        .await
    }
}

/// Delete statuses keyed by deploy name, read from the results of deletion tasks
pub fn deleted_deploy_statuses(results: &GraphResults) -> BTreeMap<String, ActionStatus> {
    results
        .of_type(TaskType::DeleteDeploy)
        .map(|result| {
            let status = match (result.output(), result.error()) {
                (Some(output), _) => ActionStatus::from(output),
                (None, error) => ActionStatus::new(ActionState::Failed)
                    .with_detail(error.unwrap_or("unknown error")),
            };
            (result.name.clone(), status)
        })
        .collect()
}
