//! Project configuration discovery and loading
//!
//! This module handles the project file discovery hierarchy:
//! 1. Explicit path: `--project <file>`
//! 2. Current directory: ./actiongraph.toml
//! 3. Project directory: ./.actiongraph/config.toml

use crate::action::{Action, ActionKind, ActionReference, ConfigGraph, DependencyReference};
use crate::env;
use crate::task::{SolverConfig, TaskType};
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Top level of an `actiongraph.toml` file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: ProjectSettings,
    #[serde(default)]
    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Used when `RUST_LOG` is not set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    /// Concurrency ceiling per task type, e.g. `build = 2`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub concurrency: BTreeMap<String, usize>,
}

impl ProjectSettings {
    pub fn solver_config(&self) -> Result<SolverConfig> {
        let mut config = SolverConfig::default();
        for (task_type, limit) in &self.concurrency {
            let task_type: TaskType = task_type
                .parse()
                .with_context(|| "Invalid [settings.concurrency] entry")?;
            if *limit == 0 {
                bail!("Concurrency limit for {} must be at least 1", task_type);
            }
            config = config.with_limit(task_type, *limit);
        }
        Ok(config)
    }
}

/// One `[[actions]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    pub kind: ActionKind,
    pub name: String,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<DependencyConfig>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub static_outputs: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub spec: Value,
}

/// A dependency as written in the project file.
///
/// `"build.api"` declares an explicit dependency; the table form spells out
/// every flag, e.g. `{ kind = "Deploy", name = "db", needs_executed_outputs = true }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencyConfig {
    Reference(String),
    Detailed(DependencyReference),
}

impl DependencyConfig {
    pub fn to_reference(&self) -> Result<DependencyReference> {
        match self {
            DependencyConfig::Reference(reference) => {
                let reference: ActionReference = reference.parse()?;
                Ok(DependencyReference::explicit(reference.kind, reference.name))
            }
            DependencyConfig::Detailed(dep) => Ok(dep.clone()),
        }
    }
}

impl ActionConfig {
    pub fn to_action(&self) -> Result<Action> {
        let dependencies = self
            .dependencies
            .iter()
            .map(DependencyConfig::to_reference)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("Invalid dependency on {}.{}", self.kind, self.name))?;

        let mut action = Action::new(self.kind, self.name.clone())
            .with_disabled(self.disabled)
            .with_dependencies(dependencies)
            .with_spec(self.spec.clone());
        for (key, value) in &self.static_outputs {
            action = action.with_static_output(key.clone(), value.clone());
        }
        Ok(action)
    }
}

impl ProjectConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read project file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse project file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ProjectConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("Failed to write project file {}", path.display()))?;
        Ok(())
    }

    /// Build the validated action graph described by this project
    pub fn to_config_graph(&self) -> Result<ConfigGraph> {
        let actions = self
            .actions
            .iter()
            .map(ActionConfig::to_action)
            .collect::<Result<Vec<_>>>()?;
        let graph = ConfigGraph::from_actions(actions)?;
        debug!(
            "Project {} has {} actions",
            self.name.as_deref().unwrap_or("<unnamed>"),
            graph.len()
        );
        Ok(graph)
    }
}

/// Project file discovery
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load the project file from the explicit path, or discover it under `workspace_root`
    pub fn discover_config(
        explicit: Option<&Path>,
        workspace_root: &Path,
    ) -> Result<(PathBuf, ProjectConfig)> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => Self::find_config_file(workspace_root).ok_or_else(|| {
                anyhow!(
                    "No project file found in {}. Create {} or pass --project.",
                    workspace_root.display(),
                    env::PROJECT_FILE_NAME
                )
            })?,
        };

        info!("Loading project from: {:?}", path);
        let config = ProjectConfig::from_toml_file(&path)?;
        Ok((path, config))
    }

    /// Find the project file using the discovery hierarchy
    pub fn find_config_file(workspace_root: &Path) -> Option<PathBuf> {
        for candidate in Self::get_config_candidates(workspace_root) {
            debug!("Checking for project file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found project file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No project file found in discovery hierarchy");
        None
    }

    /// Project file candidates in priority order
    fn get_config_candidates(workspace_root: &Path) -> Vec<PathBuf> {
        vec![
            env::project_file_path(workspace_root),
            env::local_config_file_path(workspace_root),
        ]
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info(workspace_root: &Path) {
        println!("Project Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates(workspace_root);
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file(workspace_root) {
            Some(found) => println!("Active project file: {:?}", found),
            None => println!("Active project file: none"),
        }
    }
}
