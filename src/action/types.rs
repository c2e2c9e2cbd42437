use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The kinds of actions a project can declare
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActionKind {
    Build,
    Deploy,
    Run,
    Test,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Build,
        ActionKind::Deploy,
        ActionKind::Run,
        ActionKind::Test,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Build => "Build",
            ActionKind::Deploy => "Deploy",
            ActionKind::Run => "Run",
            ActionKind::Test => "Test",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = ParseReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseReferenceError::UnknownKind(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseReferenceError {
    #[error("Unknown action kind '{0}' (expected one of Build, Deploy, Run, Test)")]
    UnknownKind(String),
    #[error("Invalid action reference '{0}', expected '<kind>.<name>'")]
    Malformed(String),
}

/// Identifies an action by kind and name
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionReference {
    pub kind: ActionKind,
    pub name: String,
}

impl ActionReference {
    pub fn new(kind: ActionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Fully-qualified key, e.g. `deploy.api`
    pub fn key(&self) -> String {
        format!("{}.{}", self.kind.as_str().to_lowercase(), self.name)
    }
}

impl fmt::Display for ActionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl FromStr for ActionReference {
    type Err = ParseReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, name) = s
            .split_once('.')
            .filter(|(_, name)| !name.is_empty())
            .ok_or_else(|| ParseReferenceError::Malformed(s.to_string()))?;
        Ok(Self::new(kind.parse()?, name))
    }
}

/// A declared or inferred edge from one action to another.
///
/// The flags are set by the declaring action and are only ever interpreted
/// by the task layer.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct DependencyReference {
    pub kind: ActionKind,
    pub name: String,
    /// Declared directly rather than inferred from a template reference
    #[serde(default)]
    pub explicit: bool,
    /// The dependant reads configuration-time outputs of the dependency
    #[serde(default)]
    pub needs_static_outputs: bool,
    /// The dependant reads outputs only available once the dependency has executed
    #[serde(default)]
    pub needs_executed_outputs: bool,
}

impl DependencyReference {
    pub fn explicit(kind: ActionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            explicit: true,
            needs_static_outputs: false,
            needs_executed_outputs: false,
        }
    }

    pub fn implicit(kind: ActionKind, name: impl Into<String>) -> Self {
        Self {
            explicit: false,
            ..Self::explicit(kind, name)
        }
    }

    pub fn with_static_outputs(mut self) -> Self {
        self.needs_static_outputs = true;
        self
    }

    pub fn with_executed_outputs(mut self) -> Self {
        self.needs_executed_outputs = true;
        self
    }

    pub fn reference(&self) -> ActionReference {
        ActionReference::new(self.kind, self.name.clone())
    }
}

/// A named, typed, versioned unit of user configuration
#[derive(Clone, Debug, PartialEq)]
pub struct Action {
    kind: ActionKind,
    name: String,
    disabled: bool,
    dependencies: Vec<DependencyReference>,
    spec: Value,
    static_outputs: Map<String, Value>,
}

impl Action {
    pub fn new(kind: ActionKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            disabled: false,
            dependencies: Vec::new(),
            spec: Value::Null,
            static_outputs: Map::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: DependencyReference) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_dependencies(
        mut self,
        dependencies: impl IntoIterator<Item = DependencyReference>,
    ) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    pub fn with_spec(mut self, spec: Value) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_static_output(mut self, key: impl Into<String>, value: Value) -> Self {
        self.static_outputs.insert(key.into(), value);
        self
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn spec(&self) -> &Value {
        &self.spec
    }

    pub fn static_outputs(&self) -> &Map<String, Value> {
        &self.static_outputs
    }

    pub fn dependency_references(&self) -> &[DependencyReference] {
        &self.dependencies
    }

    pub fn reference(&self) -> ActionReference {
        ActionReference::new(self.kind, self.name.clone())
    }

    pub fn key(&self) -> String {
        self.reference().key()
    }

    pub fn long_description(&self) -> String {
        format!("{} type action {}", self.kind, self.name)
    }

    /// Content hash of everything that affects how this action resolves and executes.
    pub fn version_string(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.kind.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.name.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.spec.to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(Value::Object(self.static_outputs.clone()).to_string().as_bytes());
        for dep in &self.dependencies {
            hasher.update(b"\0");
            hasher.update(dep.reference().key().as_bytes());
            hasher.update(&[
                dep.explicit as u8,
                dep.needs_static_outputs as u8,
                dep.needs_executed_outputs as u8,
            ]);
        }
        let hash = hasher.finalize();
        format!("v-{}", &hash.to_hex().as_str()[..10])
    }
}
