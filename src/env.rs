//! Environment constants and path utilities for actiongraph.
//!
//! This module centralizes the hardcoded file names, directory names and
//! defaults used throughout the application.

use std::path::{Path, PathBuf};

/// Project directory name (hidden directory like .git, .vscode)
pub const PROJECT_DIR_NAME: &str = ".actiongraph";

/// Project file name looked up in the working directory
pub const PROJECT_FILE_NAME: &str = "actiongraph.toml";

/// Configuration file name inside the project directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Default log filter when neither `RUST_LOG` nor the project settings provide one
pub const DEFAULT_LOG_FILTER: &str = "actiongraph=info";

/// Task scheduling defaults
pub mod tasks {
    /// How many tasks of one type may run at the same time unless the type says otherwise
    pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;

    /// Builds are heavier than other executions and get a lower ceiling
    pub const BUILD_CONCURRENCY_LIMIT: usize = 5;
}

/// Build the project directory path from a workspace root
pub fn project_dir_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(PROJECT_DIR_NAME)
}

/// Build the project file path (`./actiongraph.toml`) from a workspace root
pub fn project_file_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(PROJECT_FILE_NAME)
}

/// Build the local configuration file path (`./.actiongraph/config.toml`)
pub fn local_config_file_path(workspace_root: &Path) -> PathBuf {
    project_dir_path(workspace_root).join(CONFIG_FILE_NAME)
}
