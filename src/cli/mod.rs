//! CLI-specific functionality for actiongraph
//!
//! This module contains all CLI-related code including argument parsing
//! and project file discovery.

pub mod args;
pub mod config;

pub use args::{Args, CleanupCommands, Commands, ExecuteFlags, ExecutionMode};
pub use config::{ActionConfig, ConfigDiscovery, DependencyConfig, ProjectConfig, ProjectSettings};
