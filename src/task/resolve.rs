use crate::action::{Action, DependencyReference, GraphError};
use crate::task::action::{ActionTaskCore, ActionTaskParams, DependencyNeed};
use crate::task::base::*;
use crate::task::results::GraphResults;
use crate::task::types::*;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{Instrument, debug};

/// Evaluates an action's configuration without executing it.
///
/// Named by the full action key, since actions of different kinds may share a name.
#[derive(Debug)]
pub struct ResolveActionTask {
    inner: ActionTaskCore,
    name: String,
}

impl ResolveActionTask {
    pub fn new(action: Arc<Action>, params: ActionTaskParams) -> Self {
        Self {
            name: action.key(),
            inner: ActionTaskCore::new(action, params),
        }
    }

    // Resolution needs the configuration of everything referenced explicitly or
    // for static outputs, and the executed state of anything whose runtime
    // outputs end up in this action's configuration.
    fn need(
        &self,
        dep: &DependencyReference,
        target: &Action,
    ) -> Result<DependencyNeed, GraphError> {
        if dep.needs_executed_outputs {
            return self.inner.classify_dependency(dep, target);
        }
        if dep.needs_static_outputs || dep.explicit {
            Ok(DependencyNeed::Resolve)
        } else {
            Ok(DependencyNeed::Nothing)
        }
    }
}

#[async_trait]
impl Task for ResolveActionTask {
    fn task_type(&self) -> TaskType {
        TaskType::ResolveAction
    }

    fn core(&self) -> &TaskCore {
        self.inner.core()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> String {
        format!("resolving {}", self.inner.action().long_description())
    }

    fn input_version(&self) -> String {
        self.inner.action().version_string()
    }

    fn resolve_status_dependencies(&self) -> Result<Vec<TaskRef>, GraphError> {
        Ok(Vec::new())
    }

    fn resolve_process_dependencies(
        &self,
        _status: Option<&TaskOutput>,
    ) -> Result<Vec<TaskRef>, GraphError> {
        let mut tasks = Vec::new();
        for dep in self.inner.action().dependency_references() {
            let target = self.inner.lookup(dep)?;
            match self.need(dep, &target)? {
                DependencyNeed::Execute => tasks.push(self.inner.execute_task(target)),
                DependencyNeed::Resolve => tasks.push(self.inner.resolve_task(target)),
                DependencyNeed::Nothing => {}
            }
        }
        Ok(dedupe_tasks(tasks))
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
        let action = self.inner.action();
        let key = self.key();

        async {
            let mut dependency_outputs = BTreeMap::new();
            for dep in action.dependency_references() {
                let target = self.inner.lookup(dep).map_err(anyhow::Error::from)?;
                let outputs = match self.need(dep, &target).map_err(anyhow::Error::from)? {
                    DependencyNeed::Execute => self
                        .inner
                        .get_executed_action(&key, &target, dependency_results)
                        .map(|executed| executed.outputs),
                    DependencyNeed::Resolve => self
                        .inner
                        .get_resolved_action(&key, &target, dependency_results)
                        .map(|resolved| resolved.outputs),
                    DependencyNeed::Nothing => continue,
                };
                match outputs {
                    Ok(outputs) => {
                        dependency_outputs.insert(target.key(), outputs);
                    }
                    // Dependencies were never requested, so there is nothing to read.
                    Err(_) if self.skip_dependencies() => {}
                    Err(err) => return Err(TaskError::from(err)),
                }
            }

            let resolved = ResolvedAction {
                action: Arc::clone(action),
                version: action.version_string(),
                outputs: action.static_outputs().clone(),
                dependency_outputs,
            };
            debug!("Resolved {} at {}", action.key(), resolved.version);

            let mut output = TaskOutput::new(ActionState::Ready, resolved.version.clone());
            output.outputs = resolved.outputs.clone();
            output.resolved_action = Some(resolved);
            Ok::<_, TaskError>(output)
        }
        .instrument(self.inner.span().clone())
        .await
    }
}
