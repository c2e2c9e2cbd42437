#[cfg(test)]
mod tests {
    use crate::action::*;
    use crate::router::LocalRouter;
    use crate::task::*;
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    // Helper graph covering every dependency flavour
    fn create_test_graph() -> ConfigGraph {
        ConfigGraph::from_actions([
            Action::new(ActionKind::Build, "api").with_static_output("image", json!("api:latest")),
            Action::new(ActionKind::Build, "old").with_disabled(true),
            Action::new(ActionKind::Deploy, "db"),
            Action::new(ActionKind::Deploy, "legacy").with_disabled(true),
            Action::new(ActionKind::Deploy, "api").with_dependencies([
                DependencyReference::explicit(ActionKind::Build, "api"),
                DependencyReference::explicit(ActionKind::Deploy, "db"),
            ]),
            Action::new(ActionKind::Deploy, "web").with_dependencies([
                DependencyReference::implicit(ActionKind::Deploy, "api").with_executed_outputs(),
                DependencyReference::implicit(ActionKind::Build, "api").with_static_outputs(),
                DependencyReference::implicit(ActionKind::Deploy, "db"),
            ]),
            Action::new(ActionKind::Run, "migrate").with_dependencies([
                DependencyReference::implicit(ActionKind::Deploy, "db").with_executed_outputs(),
                DependencyReference::explicit(ActionKind::Deploy, "db"),
            ]),
            Action::new(ActionKind::Test, "legacy-check").with_dependency(
                DependencyReference::implicit(ActionKind::Deploy, "legacy").with_executed_outputs(),
            ),
            Action::new(ActionKind::Test, "old-build-check").with_dependency(
                DependencyReference::implicit(ActionKind::Build, "old").with_executed_outputs(),
            ),
        ])
        .unwrap()
    }

    fn builder() -> ActionTaskParamsBuilder {
        ActionTaskParams::builder(
            Arc::new(create_test_graph()),
            Arc::new(LocalRouter::new()),
        )
    }

    fn create_test_params() -> ActionTaskParams {
        builder().build()
    }

    fn get_action(params: &ActionTaskParams, kind: ActionKind, name: &str) -> Arc<Action> {
        params
            .graph
            .get_action_by_ref(&ActionReference::new(kind, name), true)
            .unwrap()
    }

    fn execute_task(params: &ActionTaskParams, kind: ActionKind, name: &str) -> TaskRef {
        execute_task_for_action(get_action(params, kind, name), params.clone())
    }

    fn resolve_task(params: &ActionTaskParams, kind: ActionKind, name: &str) -> ResolveActionTask {
        ResolveActionTask::new(get_action(params, kind, name), params.clone())
    }

    fn keys(tasks: &[TaskRef]) -> Vec<String> {
        tasks.iter().map(|t| t.key()).collect()
    }

    fn not_ready() -> TaskOutput {
        TaskOutput::new(ActionState::NotReady, "v-0")
    }

    fn ready() -> TaskOutput {
        TaskOutput::new(ActionState::Ready, "v-0")
    }

    #[test]
    fn test_task_identity() {
        let params = create_test_params();
        let task = execute_task(&params, ActionKind::Build, "api");

        assert_eq!(task.task_type(), TaskType::Build);
        assert_eq!(task.base_key(), "build.api");
        assert_eq!(task.key(), task.base_key());

        let id = task.id();
        let suffix = id.strip_prefix("build.api.").unwrap();
        assert!(uuid::Uuid::parse_str(suffix).is_ok());

        // Same logical work, different instance
        let other = execute_task(&params, ActionKind::Build, "api");
        assert_eq!(other.key(), task.key());
        assert_ne!(other.id(), task.id());
        assert_eq!(task.id(), task.id());
    }

    #[test]
    fn test_resolve_tasks_are_keyed_by_action() {
        let params = create_test_params();
        let deploy = resolve_task(&params, ActionKind::Deploy, "api");
        let build = resolve_task(&params, ActionKind::Build, "api");

        assert_eq!(deploy.key(), "resolve-action.deploy.api");
        assert_eq!(build.key(), "resolve-action.build.api");
        assert_eq!(deploy.task_type(), TaskType::ResolveAction);
        assert!(!deploy.is_execute_task());
    }

    #[test]
    fn test_execute_task_for_every_kind() {
        let params = create_test_params();
        for action in params.graph.actions() {
            let task = execute_task_for_action(Arc::clone(action), params.clone());
            assert_eq!(task.task_type(), TaskType::execute_for(action.kind()));
            assert!(task.is_execute_task());
            assert_eq!(task.name(), action.name());
        }
    }

    #[test]
    fn test_concurrency_limits() {
        let params = create_test_params();
        assert_eq!(execute_task(&params, ActionKind::Build, "api").concurrency_limit(), 5);
        assert_eq!(execute_task(&params, ActionKind::Deploy, "api").concurrency_limit(), 10);
        assert_eq!(execute_task(&params, ActionKind::Run, "migrate").concurrency_limit(), 10);
    }

    #[test]
    fn test_status_dependencies() {
        let params = create_test_params();
        let task = execute_task(&params, ActionKind::Deploy, "api");
        let deps = task.get_status_dependencies().unwrap();
        assert_eq!(keys(&deps), vec!["resolve-action.deploy.api"]);

        let resolve = resolve_task(&params, ActionKind::Deploy, "api");
        assert!(resolve.get_status_dependencies().unwrap().is_empty());
    }

    #[test]
    fn test_explicit_dependencies_are_executed() {
        let params = create_test_params();
        let task = execute_task(&params, ActionKind::Deploy, "api");
        let deps = task.get_process_dependencies(Some(&not_ready())).unwrap();

        assert_eq!(
            keys(&deps),
            vec!["resolve-action.deploy.api", "build.api", "deploy.db"]
        );
    }

    #[test]
    fn test_executed_outputs_require_execute_task() {
        let params = create_test_params();
        let task = execute_task(&params, ActionKind::Deploy, "web");
        let deps = task.get_process_dependencies(None).unwrap();

        // deploy.db is referenced implicitly without needing outputs, so it never shows up
        assert_eq!(
            keys(&deps),
            vec![
                "resolve-action.deploy.web",
                "deploy.api",
                "resolve-action.build.api"
            ]
        );
        assert!(deps[1].is_execute_task());
        assert!(!deps[2].is_execute_task());
    }

    #[test]
    fn test_resolve_task_process_dependencies() {
        let params = create_test_params();

        let web = resolve_task(&params, ActionKind::Deploy, "web");
        let deps = web.get_process_dependencies(None).unwrap();
        assert_eq!(keys(&deps), vec!["deploy.api", "resolve-action.build.api"]);

        // Explicit references only need to be resolved to resolve the dependant
        let api = resolve_task(&params, ActionKind::Deploy, "api");
        let deps = api.get_process_dependencies(None).unwrap();
        assert_eq!(
            keys(&deps),
            vec!["resolve-action.build.api", "resolve-action.deploy.db"]
        );
    }

    #[test]
    fn test_dependencies_are_deduplicated() {
        let params = create_test_params();
        let task = execute_task(&params, ActionKind::Run, "migrate");
        let deps = task.get_process_dependencies(Some(&not_ready())).unwrap();

        assert_eq!(keys(&deps), vec!["resolve-action.run.migrate", "deploy.db"]);
    }

    #[test]
    fn test_dependency_queries_are_memoized() {
        let params = create_test_params();
        let task = execute_task(&params, ActionKind::Deploy, "api");

        let first = task.get_status_dependencies().unwrap();
        let second = task.get_status_dependencies().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let first = task.get_process_dependencies(Some(&not_ready())).unwrap();
        let second = task.get_process_dependencies(Some(&not_ready())).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(keys(&first), keys(&second));

        // A different status is a different query
        let when_ready = task.get_process_dependencies(Some(&ready())).unwrap();
        assert!(!Arc::ptr_eq(&first, &when_ready));
    }

    #[test]
    fn test_ready_status_only_resolves() {
        let params = create_test_params();
        let task = execute_task(&params, ActionKind::Deploy, "api");
        let deps = task.get_process_dependencies(Some(&ready())).unwrap();
        assert_eq!(keys(&deps), vec!["resolve-action.deploy.api"]);
    }

    #[test]
    fn test_force_disables_ready_short_circuit() {
        let params = create_test_params().with_force(true);
        let task = execute_task(&params, ActionKind::Deploy, "api");
        assert!(task.force());

        let deps = task.get_process_dependencies(Some(&ready())).unwrap();
        assert_eq!(
            keys(&deps),
            vec!["resolve-action.deploy.api", "build.api", "deploy.db"]
        );
        // Forcing the root does not force its dependencies
        assert!(deps.iter().all(|dep| !dep.force()));
    }

    #[test]
    fn test_force_actions_propagate() {
        let params = builder()
            .force_action(ActionReference::new(ActionKind::Build, "api"))
            .build();
        let task = execute_task(&params, ActionKind::Deploy, "api");
        assert!(!task.force());

        let deps = task.get_process_dependencies(Some(&not_ready())).unwrap();
        let forced: Vec<String> = deps.iter().filter(|d| d.force()).map(|d| d.key()).collect();
        assert_eq!(forced, vec!["build.api"]);

        // The set travels to grandchildren unchanged
        let build = deps.iter().find(|d| d.key() == "build.api").unwrap();
        let build_deps = build.get_status_dependencies().unwrap();
        assert_eq!(keys(&build_deps), vec!["resolve-action.build.api"]);
        assert!(build_deps[0].force());
    }

    #[test]
    fn test_force_build_shorthand() {
        let params = builder().force_build(true).build();
        assert!(params.is_forced(&ActionReference::new(ActionKind::Build, "api")));
        // Disabled builds are not part of the graph's builds
        assert!(!params.is_forced(&ActionReference::new(ActionKind::Build, "old")));
        assert!(!params.is_forced(&ActionReference::new(ActionKind::Deploy, "api")));

        let task = execute_task(&params, ActionKind::Deploy, "api");
        let deps = task.get_process_dependencies(None).unwrap();
        let build = deps.iter().find(|d| d.key() == "build.api").unwrap();
        assert!(build.force());
    }

    #[test]
    fn test_disabled_runtime_dependency_is_an_error() {
        let params = create_test_params();
        let task = execute_task(&params, ActionKind::Test, "legacy-check");
        let err = task.get_process_dependencies(None).unwrap_err();

        match &err {
            GraphError::DisabledRuntimeDependency {
                dependant,
                dependency,
                ..
            } => {
                assert_eq!(dependant, "test.legacy-check");
                assert_eq!(dependency, "deploy.legacy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("which is disabled"));
        assert!(err.to_string().starts_with("Test type action legacy-check"));
    }

    #[test]
    fn test_disabled_build_dependency_is_allowed() {
        let params = create_test_params();
        let task = execute_task(&params, ActionKind::Test, "old-build-check");
        let deps = task.get_process_dependencies(None).unwrap();
        assert_eq!(
            keys(&deps),
            vec!["resolve-action.test.old-build-check", "build.old"]
        );
    }

    #[test]
    fn test_explicit_disabled_dependency_is_not_executed() {
        let graph = ConfigGraph::from_actions([
            Action::new(ActionKind::Build, "old").with_disabled(true),
            Action::new(ActionKind::Deploy, "legacy").with_disabled(true),
            Action::new(ActionKind::Deploy, "api").with_dependencies([
                DependencyReference::explicit(ActionKind::Deploy, "legacy"),
                DependencyReference::explicit(ActionKind::Build, "old"),
            ]),
            Action::new(ActionKind::Deploy, "web").with_dependency(
                DependencyReference::explicit(ActionKind::Deploy, "legacy").with_static_outputs(),
            ),
        ])
        .unwrap();
        let params =
            ActionTaskParams::builder(Arc::new(graph), Arc::new(LocalRouter::new())).build();

        // Disabled builds still run, other disabled actions are never executed
        let api = execute_task(&params, ActionKind::Deploy, "api");
        let deps = api.get_process_dependencies(None).unwrap();
        assert_eq!(keys(&deps), vec!["resolve-action.deploy.api", "build.old"]);

        let web = execute_task(&params, ActionKind::Deploy, "web");
        let deps = web.get_process_dependencies(None).unwrap();
        assert_eq!(
            keys(&deps),
            vec!["resolve-action.deploy.web", "resolve-action.deploy.legacy"]
        );
    }

    #[test]
    fn test_skip_runtime_dependencies() {
        let params = builder().skip_runtime_dependencies(true).build();
        let task = execute_task(&params, ActionKind::Deploy, "api");
        let deps = task.get_process_dependencies(None).unwrap();

        // Builds are still executed; the explicit deploy is dropped
        assert_eq!(keys(&deps), vec!["resolve-action.deploy.api", "build.api"]);
    }

    #[test]
    fn test_skip_dependencies() {
        let params = builder().skip_dependencies(true).build();
        let task = execute_task(&params, ActionKind::Deploy, "api");
        assert!(task.skip_dependencies());

        assert!(task.get_process_dependencies(None).unwrap().is_empty());
        assert!(task.get_process_dependencies(Some(&not_ready())).unwrap().is_empty());
        // Status dependencies are not affected
        assert_eq!(
            keys(&task.get_status_dependencies().unwrap()),
            vec!["resolve-action.deploy.api"]
        );
    }

    fn create_delete_task(
        params: &ActionTaskParams,
        name: &str,
        names: &[&str],
        dependants_first: bool,
    ) -> DeleteDeployTask {
        let names: BTreeSet<String> = names.iter().map(|n| n.to_string()).collect();
        DeleteDeployTask::new(
            get_action(params, ActionKind::Deploy, name),
            params.clone(),
            Arc::new(names),
            dependants_first,
        )
    }

    #[test]
    fn test_delete_dependants_first() {
        let params = create_test_params();

        // deploy.api and deploy.web both depend on deploy.db, but only api is being deleted
        let task = create_delete_task(&params, "db", &["db", "api"], true);
        let deps = task.get_process_dependencies(None).unwrap();
        assert_eq!(keys(&deps), vec!["resolve-action.deploy.db", "delete-deploy.api"]);
        assert_eq!(task.key(), "delete-deploy.db");
        assert_eq!(task.task_type(), TaskType::DeleteDeploy);
    }

    #[test]
    fn test_delete_without_dependants_first() {
        let params = create_test_params();
        let task = create_delete_task(&params, "db", &["db", "api", "web"], false);
        let deps = task.get_process_dependencies(None).unwrap();
        assert_eq!(keys(&deps), vec!["resolve-action.deploy.db"]);
    }

    #[test]
    fn test_delete_dependants_are_not_forced() {
        let params = create_test_params().with_force(true);
        let task = create_delete_task(&params, "db", &["db", "api", "web"], true);
        assert!(task.force());

        let deps = task.get_process_dependencies(None).unwrap();
        assert_eq!(
            keys(&deps),
            vec![
                "resolve-action.deploy.db",
                "delete-deploy.api",
                "delete-deploy.web"
            ]
        );
        assert!(deps.iter().skip(1).all(|d| !d.force()));
    }

    fn create_test_result(key: &str, outcome: TaskOutcome) -> Arc<GraphResult> {
        Arc::new(GraphResult {
            key: key.to_string(),
            id: format!("{key}.0"),
            task_type: TaskType::Build,
            name: "api".to_string(),
            input_version: "v-1".to_string(),
            outcome,
            started_at: Utc::now(),
            completed_at: Utc::now(),
        })
    }

    #[test]
    fn test_graph_results() {
        let mut results = GraphResults::new();
        assert!(results.is_empty());

        results
            .set_result(create_test_result(
                "build.api",
                TaskOutcome::Processed(ready()),
            ))
            .unwrap();
        let err = results
            .set_result(create_test_result(
                "build.api",
                TaskOutcome::Failed {
                    error: "boom".to_string(),
                },
            ))
            .unwrap_err();
        assert_eq!(
            err,
            InternalError::DuplicateResult {
                key: "build.api".to_string()
            }
        );

        let mut other = GraphResults::new();
        other
            .set_result(create_test_result(
                "build.web",
                TaskOutcome::Aborted {
                    reason: "dependency failed".to_string(),
                },
            ))
            .unwrap();
        results.merge(&other);

        assert_eq!(results.len(), 2);
        assert!(results.get("build.api").unwrap().is_success());
        assert_eq!(
            results.failed().map(|r| r.key.as_str()).collect::<Vec<_>>(),
            vec!["build.web"]
        );
        assert_eq!(results.get("build.web").unwrap().error(), Some("dependency failed"));
    }

    #[tokio::test]
    async fn test_process_requires_resolved_action() {
        let params = create_test_params();
        let empty = GraphResults::new();

        let task = execute_task(&params, ActionKind::Deploy, "api");
        let err = task.process(&empty, None).await.unwrap_err();
        match err {
            TaskError::Internal(InternalError::MissingResult {
                task,
                action,
                expected,
            }) => {
                assert_eq!(task, "deploy.api");
                assert_eq!(action, "deploy.api");
                assert_eq!(expected, "resolved");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let delete = create_delete_task(&params, "db", &["db"], false);
        assert!(matches!(
            delete.process(&empty, None).await,
            Err(TaskError::Internal(InternalError::MissingResult {
                expected: "resolved",
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_process_requires_executed_dependencies() {
        let params = create_test_params();
        let web = get_action(&params, ActionKind::Deploy, "web");
        let task = execute_task(&params, ActionKind::Deploy, "web");

        // Resolved, but deploy.api was never executed
        let mut results = GraphResults::new();
        let resolve = resolve_task(&params, ActionKind::Deploy, "web");
        let mut output = TaskOutput::new(ActionState::Ready, web.version_string());
        output.resolved_action = Some(ResolvedAction {
            action: Arc::clone(&web),
            version: web.version_string(),
            outputs: web.static_outputs().clone(),
            dependency_outputs: Default::default(),
        });
        results
            .set_result(create_test_result(&resolve.key(), TaskOutcome::Processed(output)))
            .unwrap();

        let err = task.process(&results, None).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::Internal(InternalError::MissingResult {
                expected: "executed",
                ..
            })
        ));
    }

    #[test]
    fn test_task_type_parsing() {
        assert_eq!("delete-deploy".parse::<TaskType>().unwrap(), TaskType::DeleteDeploy);
        assert_eq!("Build".parse::<TaskType>().unwrap(), TaskType::Build);
        assert!("compile".parse::<TaskType>().is_err());
    }
}
