use crate::task::base::Task;
use crate::task::types::*;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How a task ended up
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    /// Status was ready and the task was not forced, so `process` never ran
    Skipped(TaskOutput),
    Processed(TaskOutput),
    /// `get_status` or `process` returned a handler error
    Failed { error: String },
    /// Never ran because a dependency failed or the request was aborted
    Aborted { reason: String },
}

/// Outcome of one task, as recorded by the solver
#[derive(Debug, Clone)]
pub struct GraphResult {
    pub key: String,
    pub id: String,
    pub task_type: TaskType,
    pub name: String,
    pub input_version: String,
    pub outcome: TaskOutcome,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl GraphResult {
    pub fn output(&self) -> Option<&TaskOutput> {
        match &self.outcome {
            TaskOutcome::Skipped(output) | TaskOutcome::Processed(output) => Some(output),
            TaskOutcome::Failed { .. } | TaskOutcome::Aborted { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.output().is_some()
    }

    pub fn was_skipped(&self) -> bool {
        matches!(self.outcome, TaskOutcome::Skipped(_))
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Failed { error } => Some(error),
            TaskOutcome::Aborted { reason } => Some(reason),
            _ => None,
        }
    }
}

/// Key-addressed store of completed task outcomes. At most one result per key.
#[derive(Debug, Clone, Default)]
pub struct GraphResults {
    results: BTreeMap<String, Arc<GraphResult>>,
}

impl GraphResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_result(&mut self, result: Arc<GraphResult>) -> Result<(), InternalError> {
        if self.results.contains_key(&result.key) {
            return Err(InternalError::DuplicateResult {
                key: result.key.clone(),
            });
        }
        self.results.insert(result.key.clone(), result);
        Ok(())
    }

    /// Merge results from another store; a key present in both keeps its existing entry
    pub fn merge(&mut self, other: &GraphResults) {
        for (key, result) in &other.results {
            self.results
                .entry(key.clone())
                .or_insert_with(|| Arc::clone(result));
        }
    }

    pub fn get_result(&self, task: &dyn Task) -> Option<&GraphResult> {
        self.get(&task.key())
    }

    pub fn get(&self, key: &str) -> Option<&GraphResult> {
        self.results.get(key).map(Arc::as_ref)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.results.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphResult> {
        self.results.values().map(Arc::as_ref)
    }

    pub fn of_type(&self, task_type: TaskType) -> impl Iterator<Item = &GraphResult> {
        self.iter().filter(move |r| r.task_type == task_type)
    }

    pub fn failed(&self) -> impl Iterator<Item = &GraphResult> {
        self.iter().filter(|r| !r.is_success())
    }
}
