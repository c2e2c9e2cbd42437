use crate::action::GraphError;
use crate::env;
use crate::task::results::GraphResults;
use crate::task::types::*;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Shared handle to a task of any type
pub type TaskRef = Arc<dyn Task>;

/// A memoized dependency list. Repeated queries hand back the same allocation.
pub type DependencyList = Arc<Vec<TaskRef>>;

pub fn make_base_key(task_type: TaskType, name: &str) -> String {
    format!("{}.{}", task_type, name)
}

/// Identity and policy state every task carries
pub struct TaskCore {
    uid: Uuid,
    force: bool,
    skip_dependencies: bool,
    status_dependencies: OnceLock<DependencyList>,
    process_dependencies: DashMap<Option<ActionState>, DependencyList>,
}

impl TaskCore {
    pub fn new(force: bool, skip_dependencies: bool) -> Self {
        Self {
            uid: Uuid::new_v4(),
            force,
            skip_dependencies,
            status_dependencies: OnceLock::new(),
            process_dependencies: DashMap::new(),
        }
    }

    pub fn uid(&self) -> Uuid {
        self.uid
    }

    pub fn force(&self) -> bool {
        self.force
    }

    pub fn skip_dependencies(&self) -> bool {
        self.skip_dependencies
    }

    fn memoize_status(
        &self,
        compute: impl FnOnce() -> Result<Vec<TaskRef>, GraphError>,
    ) -> Result<DependencyList, GraphError> {
        if let Some(deps) = self.status_dependencies.get() {
            return Ok(Arc::clone(deps));
        }
        let deps = Arc::new(compute()?);
        Ok(Arc::clone(self.status_dependencies.get_or_init(|| deps)))
    }

    // The computation runs outside the map lock; it may construct other tasks.
    fn memoize_process(
        &self,
        state: Option<ActionState>,
        compute: impl FnOnce() -> Result<Vec<TaskRef>, GraphError>,
    ) -> Result<DependencyList, GraphError> {
        if let Some(deps) = self
            .process_dependencies
            .get(&state)
            .map(|entry| Arc::clone(entry.value()))
        {
            return Ok(deps);
        }
        let deps = Arc::new(compute()?);
        Ok(Arc::clone(
            self.process_dependencies.entry(state).or_insert(deps).value(),
        ))
    }
}

impl fmt::Debug for TaskCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskCore")
            .field("uid", &self.uid)
            .field("force", &self.force)
            .field("skip_dependencies", &self.skip_dependencies)
            .finish_non_exhaustive()
    }
}

/// A unit of schedulable work.
///
/// The solver first waits for [`TaskDependencies::get_status_dependencies`],
/// calls [`Task::get_status`], and unless the status is ready (and the task is
/// not forced) waits for [`TaskDependencies::get_process_dependencies`] before
/// calling [`Task::process`].
#[async_trait]
pub trait Task: Send + Sync {
    fn task_type(&self) -> TaskType;

    fn core(&self) -> &TaskCore;

    fn name(&self) -> &str;

    fn description(&self) -> String;

    /// Version of the task's inputs before any resolution or execution happens.
    ///
    /// The output version is whatever `get_status` and `process` report.
    fn input_version(&self) -> String;

    /// Which dependencies must be complete before `get_status` may be called
    fn resolve_status_dependencies(&self) -> Result<Vec<TaskRef>, GraphError>;

    /// Which dependencies must be complete before `process` may be called, in addition to the above
    fn resolve_process_dependencies(
        &self,
        status: Option<&TaskOutput>,
    ) -> Result<Vec<TaskRef>, GraphError>;

    async fn get_status(
        &self,
        dependency_results: &GraphResults,
    ) -> Result<Option<TaskOutput>, TaskError>;

    async fn process(
        &self,
        dependency_results: &GraphResults,
        status: Option<&TaskOutput>,
    ) -> Result<TaskOutput, TaskError>;

    /// How many tasks of this exact type may run concurrently
    fn concurrency_limit(&self) -> usize {
        env::tasks::DEFAULT_CONCURRENCY_LIMIT
    }

    fn is_execute_task(&self) -> bool {
        false
    }

    fn force(&self) -> bool {
        self.core().force()
    }

    fn skip_dependencies(&self) -> bool {
        self.core().skip_dependencies()
    }

    /// The basic type and name of the task
    fn base_key(&self) -> String {
        make_base_key(self.task_type(), self.name())
    }

    /// Key used to coalesce overlapping requests for the same work.
    // Sync mode and force are not part of the key.
    fn key(&self) -> String {
        self.base_key()
    }

    /// A completely unique key for this instance of the task
    fn id(&self) -> String {
        format!("{}.{}", self.base_key(), self.core().uid())
    }
}

impl fmt::Debug for dyn Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id())
    }
}

/// Memoized dependency queries.
///
/// Implemented for every task through a blanket impl, so the skip-dependencies
/// policy cannot be overridden by a concrete task type.
pub trait TaskDependencies {
    fn get_status_dependencies(&self) -> Result<DependencyList, GraphError>;

    fn get_process_dependencies(
        &self,
        status: Option<&TaskOutput>,
    ) -> Result<DependencyList, GraphError>;
}

impl<T: Task + ?Sized> TaskDependencies for T {
    fn get_status_dependencies(&self) -> Result<DependencyList, GraphError> {
        self.core()
            .memoize_status(|| self.resolve_status_dependencies())
    }

    fn get_process_dependencies(
        &self,
        status: Option<&TaskOutput>,
    ) -> Result<DependencyList, GraphError> {
        self.core().memoize_process(status.map(|s| s.state), || {
            if self.skip_dependencies() {
                return Ok(Vec::new());
            }
            self.resolve_process_dependencies(status)
        })
    }
}

/// Collapse tasks with the same key, keeping the first occurrence
pub fn dedupe_tasks(tasks: impl IntoIterator<Item = TaskRef>) -> Vec<TaskRef> {
    let mut seen = HashSet::new();
    tasks
        .into_iter()
        .filter(|task| seen.insert(task.key()))
        .collect()
}
