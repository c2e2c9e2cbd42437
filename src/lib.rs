//! # Actiongraph
//!
//! A task dependency engine for build and deployment actions. Actions
//! declare references to each other; every request (build, deploy, run,
//! test or cleanup) is turned into a graph of tasks that is resolved and
//! executed with the minimum necessary work.
//!
//! ## Architecture Overview
//!
//! - **[`action`]**: The action model and the static [`action::ConfigGraph`]
//! - **[`task`]**: Task identity, dependency contracts, the concrete action tasks and the solver
//! - **[`router`]**: The boundary between tasks and the handlers that act on actions
//! - **[`commands`]**: Execute and cleanup commands built on top of the solver
//! - **[`cli`]**: Argument parsing and project file discovery
//!
//! ## Features
//!
//! ### Two-phase dependencies
//! - **Status dependencies**: what a task needs to decide whether it has work to do
//! - **Process dependencies**: what it needs to actually do it, skipped when already ready
//! - **Minimal execution**: dependencies are only executed when their runtime outputs are needed
//!
//! ### Scheduling
//! - **Coalescing**: tasks with the same key run once per request
//! - **Per-type concurrency**: builds and deploys are capped independently
//! - **Cycle detection**: waiting on a task that waits on you is a graph error
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use actiongraph::action::{Action, ActionKind, ConfigGraph, DependencyReference};
//! use actiongraph::commands::{CommandContext, ExecuteCommandOptions, execute_actions};
//! use actiongraph::router::LocalRouter;
//! use actiongraph::task::GraphSolver;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let graph = ConfigGraph::from_actions([
//!         Action::new(ActionKind::Build, "api"),
//!         Action::new(ActionKind::Deploy, "api")
//!             .with_dependency(DependencyReference::explicit(ActionKind::Build, "api")),
//!     ])?;
//!
//!     let ctx = CommandContext::new(
//!         Arc::new(graph),
//!         Arc::new(LocalRouter::new()),
//!         GraphSolver::default(),
//!     );
//!     let options = ExecuteCommandOptions::new(ActionKind::Deploy, vec!["api".to_string()]);
//!     let result = execute_actions(&ctx, options).await?;
//!
//!     println!("Executed {} actions", result.actions.len());
//!     Ok(())
//! }
//! ```

/// Actions and the static configuration graph.
///
/// Defines action kinds, references between actions, and the validated
/// graph that tasks query for dependencies and dependants.
pub mod action;

/// Task model and execution.
///
/// Provides task identity and policy, memoized dependency contracts, the
/// resolve/execute/delete tasks, graph results and the graph solver.
pub mod task;

/// Action handler dispatch.
pub mod router;

/// Commands shared by the binary and library users.
pub mod commands;

/// Environment constants and path utilities.
///
/// Centralizes all hardcoded paths and defaults used throughout
/// the application for easier maintenance and consistency.
pub mod env;

// Re-export main action types
pub use action::{Action, ActionKind, ActionReference, ConfigGraph, DependencyReference, GraphError};

// Re-export main task types
pub use task::{GraphResults, GraphSolver, SolveError, Task, TaskRef, TaskType};

// CLI module for command-line interface
pub mod cli;
