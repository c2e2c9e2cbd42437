//! Integration tests for the cleanup commands
//!
//! Deletion order is observed through the operation log of the in-memory router.

use actiongraph::action::*;
use actiongraph::commands::*;
use actiongraph::router::{LocalRouter, OperationKind};
use actiongraph::task::{ActionState, GraphSolver};
use std::sync::Arc;

fn deploy(name: &str) -> Action {
    Action::new(ActionKind::Deploy, name)
}

fn depends_on(action: Action, name: &str) -> Action {
    action.with_dependency(DependencyReference::explicit(ActionKind::Deploy, name))
}

fn reference(name: &str) -> ActionReference {
    ActionReference::new(ActionKind::Deploy, name)
}

fn context(actions: Vec<Action>, router: Arc<LocalRouter>) -> CommandContext {
    let graph = ConfigGraph::from_actions(actions).unwrap();
    CommandContext::new(Arc::new(graph), router, GraphSolver::default())
}

fn names(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[tokio::test]
async fn test_dependants_first_order() {
    // a depends on b
    let router = Arc::new(LocalRouter::new());
    let ctx = context(vec![depends_on(deploy("a"), "b"), deploy("b")], Arc::clone(&router));

    let statuses = delete_deploys(
        &ctx,
        DeleteDeployOptions {
            names: names(&["b", "a"]),
            dependants_first: true,
            with_dependants: false,
        },
    )
    .await
    .unwrap();

    assert_eq!(statuses.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    assert_eq!(
        router.actions_for(OperationKind::Delete).await,
        vec![reference("a"), reference("b")]
    );
}

#[tokio::test]
async fn test_with_dependants_expands_targets() {
    // a -> b -> c
    let router = Arc::new(LocalRouter::new());
    let ctx = context(
        vec![
            depends_on(deploy("a"), "b"),
            depends_on(deploy("b"), "c"),
            deploy("c"),
            deploy("unrelated"),
        ],
        Arc::clone(&router),
    );

    let statuses = delete_deploys(
        &ctx,
        DeleteDeployOptions {
            names: names(&["c"]),
            dependants_first: false,
            with_dependants: true,
        },
    )
    .await
    .unwrap();

    assert_eq!(statuses.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    // with_dependants implies dependants first
    assert_eq!(
        router.actions_for(OperationKind::Delete).await,
        vec![reference("a"), reference("b"), reference("c")]
    );
}

#[tokio::test]
async fn test_expand_with_dependants_is_unique_by_name() {
    let ctx = context(
        vec![
            depends_on(depends_on(deploy("a"), "b"), "c"),
            depends_on(deploy("b"), "c"),
            deploy("c"),
        ],
        Arc::new(LocalRouter::new()),
    );
    let targets = ctx.graph.get_deploys(&names(&["c", "b"])).unwrap();

    let expanded = expand_with_dependants(&ctx, targets);
    let expanded: Vec<&str> = expanded.iter().map(|a| a.name()).collect();
    assert_eq!(expanded, vec!["c", "b", "a"]);
}

#[tokio::test]
async fn test_empty_target_is_a_no_op() {
    let router = Arc::new(LocalRouter::new());
    let ctx = context(vec![Action::new(ActionKind::Build, "api")], Arc::clone(&router));

    let statuses = delete_deploys(&ctx, DeleteDeployOptions::default())
        .await
        .unwrap();

    assert!(statuses.is_empty());
    assert!(router.operations().await.is_empty());
}

#[tokio::test]
async fn test_unknown_deploy_is_an_error() {
    let ctx = context(vec![deploy("a")], Arc::new(LocalRouter::new()));
    let err = delete_deploys(
        &ctx,
        DeleteDeployOptions {
            names: names(&["missing"]),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<GraphError>(),
        Some(GraphError::ActionNotFound { .. })
    ));
}

#[tokio::test]
async fn test_delete_statuses() {
    let a = deploy("a");
    let router = Arc::new(
        LocalRouter::new()
            .with_ready(&a)
            .with_failure(reference("broken")),
    );
    let ctx = context(vec![a, deploy("b"), deploy("broken")], Arc::clone(&router));

    let statuses = delete_deploys(&ctx, DeleteDeployOptions::default())
        .await
        .unwrap();

    assert_eq!(statuses.len(), 3);
    assert_eq!(statuses["a"].state, ActionState::Missing);
    assert_eq!(statuses["a"].detail.as_deref(), Some("deleted"));
    assert_eq!(statuses["b"].detail.as_deref(), Some("not deployed"));
    assert_eq!(statuses["broken"].state, ActionState::Failed);
    assert!(
        statuses["broken"]
            .detail
            .as_deref()
            .unwrap()
            .contains("Delete handler failed")
    );
    assert!(!router.is_executed(&reference("a")));
}

#[tokio::test]
async fn test_delete_environment() {
    let router = Arc::new(LocalRouter::new());
    let ctx = context(
        vec![depends_on(deploy("a"), "b"), deploy("b")],
        Arc::clone(&router),
    );

    let result = delete_environment(&ctx, true).await.unwrap();

    assert_eq!(result.deploy_statuses.len(), 2);
    assert!(!result.provider_statuses["local"].ready);

    let operations = router.operations().await;
    assert_eq!(
        operations.last().map(|op| op.kind),
        Some(OperationKind::CleanupEnvironment)
    );
    assert_eq!(
        router.actions_for(OperationKind::Delete).await,
        vec![reference("a"), reference("b")]
    );
}
