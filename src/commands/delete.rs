use crate::action::{Action, ActionKind};
use crate::commands::CommandContext;
use crate::router::{ActionStatus, EnvironmentStatus};
use crate::task::{DeleteDeployTask, TaskRef, deleted_deploy_statuses};
use anyhow::Result;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct DeleteDeployOptions {
    /// Deploys to delete; every deploy in the project when empty
    pub names: Vec<String>,
    /// Delete dependants before the deploys they depend on
    pub dependants_first: bool,
    /// Also delete every deploy that depends on a target, recursively. Implies `dependants_first`.
    pub with_dependants: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteEnvironmentResult {
    pub deploy_statuses: BTreeMap<String, ActionStatus>,
    pub provider_statuses: BTreeMap<String, EnvironmentStatus>,
}

/// Targets plus all of their recursive Deploy dependants, unique by name, targets first
pub fn expand_with_dependants(ctx: &CommandContext, targets: Vec<Arc<Action>>) -> Vec<Arc<Action>> {
    let dependants: Vec<Arc<Action>> = targets
        .iter()
        .flat_map(|action| {
            ctx.graph
                .get_dependants(ActionKind::Deploy, action.name(), true)
        })
        .filter(|action| action.kind() == ActionKind::Deploy)
        .collect();

    let mut seen = HashSet::new();
    targets
        .into_iter()
        .chain(dependants)
        .filter(|action| seen.insert(action.name().to_string()))
        .collect()
}

/// Delete deploys and return their statuses keyed by deploy name
pub async fn delete_deploys(
    ctx: &CommandContext,
    options: DeleteDeployOptions,
) -> Result<BTreeMap<String, ActionStatus>> {
    let mut targets = ctx.graph.get_deploys(&options.names)?;

    if targets.is_empty() {
        warn!("No deploys found. Aborting.");
        return Ok(BTreeMap::new());
    }

    if options.with_dependants {
        targets = expand_with_dependants(ctx, targets);
    }
    let dependants_first = options.dependants_first || options.with_dependants;

    let delete_deploy_names: Arc<BTreeSet<String>> =
        Arc::new(targets.iter().map(|a| a.name().to_string()).collect());
    info!(
        "Cleaning up {} deploy(s){}",
        delete_deploy_names.len(),
        if dependants_first {
            " in dependants-first order"
        } else {
            ""
        }
    );

    let params = ctx.params().build();
    let tasks: Vec<TaskRef> = targets
        .into_iter()
        .map(|action| -> TaskRef {
            Arc::new(DeleteDeployTask::new(
                action,
                params.clone(),
                Arc::clone(&delete_deploy_names),
                dependants_first,
            ))
        })
        .collect();

    let results = ctx.solver.process_tasks(tasks).await?;
    Ok(deleted_deploy_statuses(&results))
}

/// Delete every deploy, then let the router clean up the rest of the environment
pub async fn delete_environment(
    ctx: &CommandContext,
    dependants_first: bool,
) -> Result<DeleteEnvironmentResult> {
    let deploy_statuses = delete_deploys(
        ctx,
        DeleteDeployOptions {
            names: Vec::new(),
            dependants_first,
            with_dependants: false,
        },
    )
    .await?;

    let provider_statuses = ctx.router.cleanup_environment().await?;
    info!("Cleaned up {} provider(s)", provider_statuses.len());

    Ok(DeleteEnvironmentResult {
        deploy_statuses,
        provider_statuses,
    })
}
