use crate::action::types::*;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::debug;

/// Errors that make the shape of the requested graph invalid.
///
/// These abort the whole request; they are never reported per task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error(
        "{description} depends on one or more runtime outputs from action {dependency}, which is disabled. Please either remove the reference or enable the action."
    )]
    DisabledRuntimeDependency {
        dependant: String,
        dependency: String,
        description: String,
    },
    #[error("Could not find action {reference}{}", referenced_by(.dependant))]
    ActionNotFound {
        reference: String,
        dependant: Option<String>,
    },
    #[error("Action {reference} is disabled")]
    ActionDisabled { reference: String },
    #[error("Action {reference} is declared more than once")]
    DuplicateAction { reference: String },
    #[error("Dependency cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

fn referenced_by(dependant: &Option<String>) -> String {
    dependant
        .as_ref()
        .map(|d| format!(" (referenced by {d})"))
        .unwrap_or_default()
}

/// The static, already-loaded graph of all actions and their declared references
#[derive(Debug, Clone, Default)]
pub struct ConfigGraph {
    actions: BTreeMap<ActionReference, Arc<Action>>,
    dependants: HashMap<ActionReference, Vec<ActionReference>>,
}

impl ConfigGraph {
    /// Build a graph, validating that every dependency reference points at a declared action
    pub fn from_actions(actions: impl IntoIterator<Item = Action>) -> Result<Self, GraphError> {
        let mut graph = Self::default();

        for action in actions {
            let reference = action.reference();
            if graph.actions.contains_key(&reference) {
                return Err(GraphError::DuplicateAction {
                    reference: reference.key(),
                });
            }
            graph.actions.insert(reference, Arc::new(action));
        }

        for (reference, action) in &graph.actions {
            for dep in action.dependency_references() {
                let target = dep.reference();
                if !graph.actions.contains_key(&target) {
                    return Err(GraphError::ActionNotFound {
                        reference: target.key(),
                        dependant: Some(reference.key()),
                    });
                }
                let entry = graph.dependants.entry(target).or_default();
                if !entry.contains(reference) {
                    entry.push(reference.clone());
                }
            }
        }

        debug!("Loaded config graph with {} actions", graph.actions.len());
        Ok(graph)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// All actions, ordered by kind and name
    pub fn actions(&self) -> impl Iterator<Item = &Arc<Action>> {
        self.actions.values()
    }

    pub fn get_action_by_ref(
        &self,
        reference: &ActionReference,
        include_disabled: bool,
    ) -> Result<Arc<Action>, GraphError> {
        let action = self
            .actions
            .get(reference)
            .ok_or_else(|| GraphError::ActionNotFound {
                reference: reference.key(),
                dependant: None,
            })?;

        if action.is_disabled() && !include_disabled {
            return Err(GraphError::ActionDisabled {
                reference: reference.key(),
            });
        }

        Ok(Arc::clone(action))
    }

    /// Actions of one kind. An empty `names` slice selects every enabled action of that kind.
    pub fn get_actions_by_kind(
        &self,
        kind: ActionKind,
        names: &[String],
    ) -> Result<Vec<Arc<Action>>, GraphError> {
        if names.is_empty() {
            return Ok(self
                .actions
                .values()
                .filter(|a| a.kind() == kind && !a.is_disabled())
                .cloned()
                .collect());
        }

        let mut seen = HashSet::new();
        names
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .map(|name| self.get_action_by_ref(&ActionReference::new(kind, name.clone()), false))
            .collect()
    }

    pub fn get_deploys(&self, names: &[String]) -> Result<Vec<Arc<Action>>, GraphError> {
        self.get_actions_by_kind(ActionKind::Deploy, names)
    }

    /// Every enabled Build action
    pub fn get_builds(&self) -> Vec<Arc<Action>> {
        self.actions
            .values()
            .filter(|a| a.kind() == ActionKind::Build && !a.is_disabled())
            .cloned()
            .collect()
    }

    /// Actions that reference the given action, directly or (with `recursive`) transitively.
    ///
    /// Results are in breadth-first discovery order and never include the action itself.
    pub fn get_dependants(
        &self,
        kind: ActionKind,
        name: &str,
        recursive: bool,
    ) -> Vec<Arc<Action>> {
        let origin = ActionReference::new(kind, name);
        let mut seen: HashSet<ActionReference> = HashSet::from([origin.clone()]);
        let mut queue = VecDeque::from([origin]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            let Some(direct) = self.dependants.get(&current) else {
                continue;
            };
            for dependant in direct {
                if !seen.insert(dependant.clone()) {
                    continue;
                }
                if let Some(action) = self.actions.get(dependant) {
                    found.push(Arc::clone(action));
                }
                if recursive {
                    queue.push_back(dependant.clone());
                }
            }
        }

        found
    }
}
