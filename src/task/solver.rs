use crate::action::GraphError;
use crate::task::base::*;
use crate::task::results::*;
use crate::task::types::*;
use chrono::Utc;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info, warn};

type SharedResult = Shared<BoxFuture<'static, Arc<GraphResult>>>;

/// Solver configuration
#[derive(Debug, Clone, Default)]
pub struct SolverConfig {
    /// Per task type concurrency ceilings that take precedence over the task's own limit
    pub concurrency_overrides: HashMap<TaskType, usize>,
}

impl SolverConfig {
    pub fn with_limit(mut self, task_type: TaskType, limit: usize) -> Self {
        self.concurrency_overrides.insert(task_type, limit);
        self
    }
}

/// Walks a set of root tasks and everything they transitively depend on.
///
/// Tasks are coalesced by key, so each key runs at most once per call to
/// [`GraphSolver::process_tasks`], and every dependant waits on that one run.
#[derive(Debug, Clone, Default)]
pub struct GraphSolver {
    config: SolverConfig,
}

impl GraphSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Execute the tasks and return the results of every task that was discovered.
    ///
    /// Handler failures are reported on the results. Graph construction and
    /// internal consistency errors abort the whole request and are returned.
    pub async fn process_tasks(&self, tasks: Vec<TaskRef>) -> Result<GraphResults, SolveError> {
        if tasks.is_empty() {
            return Ok(GraphResults::new());
        }

        info!("Processing {} requested tasks", tasks.len());
        let run = Arc::new(SolveRun::new(self.config.clone()));
        let roots: Vec<SharedResult> = tasks.into_iter().map(|task| run.solve(task)).collect();
        join_all(roots).await;

        // Shared futures hold the run alive; drop them now that everything finished.
        run.nodes.clear();

        if let Some(err) = run.error.lock().await.take() {
            error!("Aborted: {}", err);
            return Err(err);
        }

        let results = std::mem::take(&mut *run.results.lock().await);
        let failed = results.failed().count();
        if failed > 0 {
            warn!("{} of {} tasks did not complete", failed, results.len());
        } else {
            info!("Completed {} tasks", results.len());
        }
        Ok(results)
    }
}

enum StepError {
    /// Aborts the whole request
    Fatal(SolveError),
    /// The task's handler failed
    Failed(String),
    DependencyFailed(String),
    Cancelled,
}

impl From<GraphError> for StepError {
    fn from(err: GraphError) -> Self {
        StepError::Fatal(err.into())
    }
}

impl From<TaskError> for StepError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Internal(err) => StepError::Fatal(err.into()),
            TaskError::Handler(err) => StepError::Failed(format!("{err:#}")),
        }
    }
}

struct SolveRun {
    config: SolverConfig,
    nodes: DashMap<String, SharedResult>,
    limits: DashMap<TaskType, Arc<Semaphore>>,
    /// Which keys are waiting on which, used to detect cycles before waiting
    waits: Mutex<HashMap<String, HashSet<String>>>,
    aborted: AtomicBool,
    error: Mutex<Option<SolveError>>,
    results: Mutex<GraphResults>,
}

impl SolveRun {
    fn new(config: SolverConfig) -> Self {
        Self {
            config,
            nodes: DashMap::new(),
            limits: DashMap::new(),
            waits: Mutex::new(HashMap::new()),
            aborted: AtomicBool::new(false),
            error: Mutex::new(None),
            results: Mutex::new(GraphResults::new()),
        }
    }

    /// The single shared run for the task's key, started on first request
    fn solve(self: &Arc<Self>, task: TaskRef) -> SharedResult {
        let key = task.key();
        if let Some(existing) = self.nodes.get(&key) {
            return existing.value().clone();
        }

        self.nodes
            .entry(key.clone())
            .or_insert_with(|| {
                debug!("Scheduling {}", task.id());
                let run = Arc::clone(self);
                let (id, task_type, name, input_version) = (
                    task.id(),
                    task.task_type(),
                    task.name().to_string(),
                    task.input_version(),
                );
                let handle = tokio::spawn(Arc::clone(self).run_task(task));

                async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(err) => {
                            error!("Task {} panicked: {}", key, err);
                            run.abort(InternalError::TaskPanicked { key: key.clone() }.into())
                                .await;
                            let now = Utc::now();
                            let result = Arc::new(GraphResult {
                                key,
                                id,
                                task_type,
                                name,
                                input_version,
                                outcome: TaskOutcome::Aborted {
                                    reason: err.to_string(),
                                },
                                started_at: now,
                                completed_at: now,
                            });
                            run.record(Arc::clone(&result)).await;
                            result
                        }
                    }
                }
                .boxed()
                .shared()
            })
            .value()
            .clone()
    }

    async fn run_task(self: Arc<Self>, task: TaskRef) -> Arc<GraphResult> {
        let started_at = Utc::now();
        let outcome = match self.execute(&task).await {
            Ok(outcome) => outcome,
            Err(StepError::Fatal(err)) => {
                error!("{} aborted the request: {}", task.key(), err);
                let reason = err.to_string();
                self.abort(err).await;
                TaskOutcome::Aborted { reason }
            }
            Err(StepError::Failed(error)) => {
                error!("Failed {}: {}", task.description(), error);
                TaskOutcome::Failed { error }
            }
            Err(StepError::DependencyFailed(dependency)) => {
                warn!("Not {}: dependency {} failed", task.description(), dependency);
                TaskOutcome::Aborted {
                    reason: format!("Dependency {dependency} did not complete"),
                }
            }
            Err(StepError::Cancelled) => TaskOutcome::Aborted {
                reason: "Operation aborted".to_string(),
            },
        };

        let result = Arc::new(GraphResult {
            key: task.key(),
            id: task.id(),
            task_type: task.task_type(),
            name: task.name().to_string(),
            input_version: task.input_version(),
            outcome,
            started_at,
            completed_at: Utc::now(),
        });
        self.record(Arc::clone(&result)).await;
        result
    }

    // pending -> (status ready, not forced) -> skipped
    // pending -> (not ready | forced) -> processing -> done | failed
    async fn execute(self: &Arc<Self>, task: &TaskRef) -> Result<TaskOutcome, StepError> {
        let key = task.key();
        self.ensure_running()?;

        let status_dependencies = task.get_status_dependencies()?;
        let mut dependency_results = self.wait_for(&key, &status_dependencies).await?;

        self.ensure_running()?;
        let status = {
            let _permit = self.acquire(task.as_ref()).await?;
            task.get_status(&dependency_results).await?
        };

        if let Some(status) = status.as_ref().filter(|s| s.is_ready()) {
            if !task.force() {
                debug!("{} is ready, skipping {}", key, task.description());
                return Ok(TaskOutcome::Skipped(status.clone()));
            }
        }

        let process_dependencies = task.get_process_dependencies(status.as_ref())?;
        let process_results = self.wait_for(&key, &process_dependencies).await?;
        dependency_results.merge(&process_results);

        self.ensure_running()?;
        let _permit = self.acquire(task.as_ref()).await?;
        info!("Started {}", task.description());
        let output = task.process(&dependency_results, status.as_ref()).await?;
        debug!("Finished {} ({})", task.id(), output.state);
        Ok(TaskOutcome::Processed(output))
    }

    async fn wait_for(
        self: &Arc<Self>,
        key: &str,
        dependencies: &[TaskRef],
    ) -> Result<GraphResults, StepError> {
        let mut results = GraphResults::new();
        if dependencies.is_empty() {
            return Ok(results);
        }

        self.register_waits(key, dependencies).await?;
        let pending: Vec<SharedResult> = dependencies
            .iter()
            .map(|dep| self.solve(Arc::clone(dep)))
            .collect();

        let mut failed = None;
        for result in join_all(pending).await {
            if !result.is_success() && failed.is_none() {
                failed = Some(result.key.clone());
            }
            if !results.contains_key(&result.key) {
                results
                    .set_result(result)
                    .map_err(|err| StepError::Fatal(err.into()))?;
            }
        }

        match failed {
            Some(dependency) => Err(StepError::DependencyFailed(dependency)),
            None => Ok(results),
        }
    }

    async fn register_waits(&self, key: &str, dependencies: &[TaskRef]) -> Result<(), StepError> {
        let mut waits = self.waits.lock().await;
        for dep in dependencies {
            let dep_key = dep.key();
            if let Some(path) = find_path(&waits, &dep_key, key) {
                let path = std::iter::once(key.to_string()).chain(path).collect();
                return Err(GraphError::Cycle { path }.into());
            }
            waits.entry(key.to_string()).or_default().insert(dep_key);
        }
        Ok(())
    }

    async fn acquire(&self, task: &dyn Task) -> Result<OwnedSemaphorePermit, StepError> {
        let task_type = task.task_type();
        let semaphore = Arc::clone(
            self.limits
                .entry(task_type)
                .or_insert_with(|| {
                    let limit = self
                        .config
                        .concurrency_overrides
                        .get(&task_type)
                        .copied()
                        .unwrap_or_else(|| task.concurrency_limit())
                        .max(1);
                    debug!("Limiting {} tasks to {} at a time", task_type, limit);
                    Arc::new(Semaphore::new(limit))
                })
                .value(),
        );
        semaphore
            .acquire_owned()
            .await
            .map_err(|_| StepError::Cancelled)
    }

    fn ensure_running(&self) -> Result<(), StepError> {
        if self.aborted.load(Ordering::SeqCst) {
            return Err(StepError::Cancelled);
        }
        Ok(())
    }

    async fn abort(&self, err: SolveError) {
        self.aborted.store(true, Ordering::SeqCst);
        let mut slot = self.error.lock().await;
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    async fn record(&self, result: Arc<GraphResult>) {
        let recorded = self.results.lock().await.set_result(result);
        if let Err(err) = recorded {
            self.abort(err.into()).await;
        }
    }
}

/// Path of keys from `from` to `to` following wait edges, if one exists
fn find_path(
    edges: &HashMap<String, HashSet<String>>,
    from: &str,
    to: &str,
) -> Option<Vec<String>> {
    if from == to {
        return Some(vec![from.to_string()]);
    }

    let mut visited = HashSet::new();
    let mut stack = vec![vec![from.to_string()]];
    while let Some(path) = stack.pop() {
        let current = path.last()?;
        if !visited.insert(current.clone()) {
            continue;
        }
        for next in edges.get(current).into_iter().flatten() {
            let mut extended = path.clone();
            extended.push(next.clone());
            if next == to {
                return Some(extended);
            }
            stack.push(extended);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_path() {
        let mut edges: HashMap<String, HashSet<String>> = HashMap::new();
        edges.entry("a".into()).or_default().insert("b".into());
        edges.entry("b".into()).or_default().insert("c".into());

        assert_eq!(
            find_path(&edges, "a", "c"),
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );
        assert_eq!(find_path(&edges, "c", "a"), None);
        assert_eq!(find_path(&edges, "x", "x"), Some(vec!["x".to_string()]));
    }
}
