use crate::action::{Action, ActionKind, GraphError};
use crate::env;
use crate::router::ExecuteOptions;
use crate::task::action::{ActionTaskCore, ActionTaskParams, DependencyNeed};
use crate::task::base::*;
use crate::task::results::GraphResults;
use crate::task::types::*;
use anyhow::anyhow;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{Instrument, info};

/// Drives an action to its terminal executed state: built, deployed, run or tested.
///
/// The task type follows the action kind, see [`TaskType::execute_for`].
#[derive(Debug)]
pub struct ExecuteActionTask {
    inner: ActionTaskCore,
}

/// The execute task for an action of any kind
pub fn execute_task_for_action(action: Arc<Action>, params: ActionTaskParams) -> TaskRef {
    Arc::new(ExecuteActionTask::new(action, params))
}

impl ExecuteActionTask {
    pub fn new(action: Arc<Action>, params: ActionTaskParams) -> Self {
        Self {
            inner: ActionTaskCore::new(action, params),
        }
    }

    fn verb(&self) -> &'static str {
        match self.inner.action().kind() {
            ActionKind::Build => "building",
            ActionKind::Deploy => "deploying",
            ActionKind::Run => "running",
            ActionKind::Test => "testing",
        }
    }

    fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            force: self.force(),
            start_syncs: self.inner.params().start_syncs
                && self.inner.action().kind() == ActionKind::Deploy,
        }
    }

    /// Executed versions of every dependency this task required to be executed first
    fn executed_dependencies(
        &self,
        dependency_results: &GraphResults,
    ) -> Result<Vec<ExecutedAction>, TaskError> {
        let key = self.key();
        let mut executed = Vec::new();
        for dep in self.inner.action().dependency_references() {
            let target = self.inner.lookup(dep).map_err(anyhow::Error::from)?;
            let need = self
                .inner
                .classify_dependency(dep, &target)
                .map_err(anyhow::Error::from)?;
            if need != DependencyNeed::Execute {
                continue;
            }
            match self
                .inner
                .get_executed_action(&key, &target, dependency_results)
            {
                Ok(action) => executed.push(action),
                Err(_) if self.skip_dependencies() => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(executed)
    }
}

#[async_trait]
impl Task for ExecuteActionTask {
    fn task_type(&self) -> TaskType {
        TaskType::execute_for(self.inner.action().kind())
    }

    fn core(&self) -> &TaskCore {
        self.inner.core()
    }

    fn name(&self) -> &str {
        self.inner.action().name()
    }

    fn description(&self) -> String {
        format!("{} {}", self.verb(), self.inner.action().long_description())
    }

    fn input_version(&self) -> String {
        self.inner.action().version_string()
    }

    fn concurrency_limit(&self) -> usize {
        match self.inner.action().kind() {
            ActionKind::Build => env::tasks::BUILD_CONCURRENCY_LIMIT,
            ActionKind::Deploy | ActionKind::Run | ActionKind::Test => {
                env::tasks::DEFAULT_CONCURRENCY_LIMIT
            }
        }
    }

    fn is_execute_task(&self) -> bool {
        true
    }

    fn resolve_status_dependencies(&self) -> Result<Vec<TaskRef>, GraphError> {
        Ok(self.inner.default_status_dependencies())
    }

    fn resolve_process_dependencies(
        &self,
        status: Option<&TaskOutput>,
    ) -> Result<Vec<TaskRef>, GraphError> {
        self.inner.default_process_dependencies(status)
    }

    async fn get_status(
        &self,
        dependency_results: &GraphResults,
    ) -> Result<Option<TaskOutput>, TaskError> {
        let resolved =
            self.inner
                .get_resolved_action(&self.key(), self.inner.action(), dependency_results)?;
        let status = self
            .inner
            .router()
            .get_status(&resolved)
            .instrument(self.inner.span().clone())
            .await?;
        Ok(Some(status.into_output(&resolved)))
    }

    async fn process(
        &self,
        dependency_results: &GraphResults,
        _status: Option<&TaskOutput>,
    ) -> Result<TaskOutput, TaskError> {
        let resolved =
            self.inner
                .get_resolved_action(&self.key(), self.inner.action(), dependency_results)?;
        let dependencies = self.executed_dependencies(dependency_results)?;

        async {
            info!("{} {}", self.verb(), resolved.action.key());
            let status = self
                .inner
                .router()
                .execute(&resolved, &dependencies, self.execute_options())
                .await?;

            if status.state != ActionState::Ready {
                return Err(TaskError::Handler(anyhow!(
                    "{} finished in state {}{}",
                    resolved.action.long_description(),
                    status.state,
                    status
                        .detail
                        .as_deref()
                        .map(|d| format!(": {d}"))
                        .unwrap_or_default()
                )));
            }
            Ok::<_, TaskError>(status.into_output(&resolved))
        }
        .instrument(self.inner.span().clone())
        .await
    }
}
