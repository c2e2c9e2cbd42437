//! Command implementations shared by the binary and library users.
//!
//! Each command selects actions from the graph, builds the root tasks and
//! hands them to the [`GraphSolver`].

pub mod delete;
pub mod execute;

pub use delete::*;
pub use execute::*;

use crate::action::ConfigGraph;
use crate::router::ActionRouter;
use crate::task::{ActionTaskParams, ActionTaskParamsBuilder, GraphSolver};
use std::sync::Arc;

/// Everything a command needs to run against one project
#[derive(Clone)]
pub struct CommandContext {
    pub graph: Arc<ConfigGraph>,
    pub router: Arc<dyn ActionRouter>,
    pub solver: GraphSolver,
}

impl CommandContext {
    pub fn new(
        graph: Arc<ConfigGraph>,
        router: Arc<dyn ActionRouter>,
        solver: GraphSolver,
    ) -> Self {
        Self {
            graph,
            router,
            solver,
        }
    }

    pub fn params(&self) -> ActionTaskParamsBuilder {
        ActionTaskParams::builder(Arc::clone(&self.graph), Arc::clone(&self.router))
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("actions", &self.graph.len())
            .field("solver", &self.solver)
            .finish_non_exhaustive()
    }
}
