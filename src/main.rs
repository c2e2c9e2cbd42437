use actiongraph::action::ConfigGraph;
use actiongraph::cli::{Args, ConfigDiscovery, ExecutionMode};
use actiongraph::commands::{CommandContext, delete_deploys, delete_environment, execute_actions};
use actiongraph::env;
use actiongraph::router::LocalRouter;
use actiongraph::task::GraphSolver;
use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mode = match args.mode() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    let workspace_root = std::env::current_dir().context("Could not determine current directory")?;

    match mode {
        ExecutionMode::ShowConfig => {
            init_logging(None, args.verbose);
            ConfigDiscovery::show_discovery_info(&workspace_root);
            Ok(())
        }
        mode => run_project_command(&args, &workspace_root, mode).await,
    }
}

// Logs go to stderr so command results on stdout stay machine readable.
fn init_logging(project_filter: Option<&str>, verbose: bool) {
    let default_filter = if verbose {
        "actiongraph=debug"
    } else {
        project_filter.unwrap_or(env::DEFAULT_LOG_FILTER)
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_project_command(
    args: &Args,
    workspace_root: &Path,
    mode: ExecutionMode,
) -> Result<()> {
    let (project_path, project) =
        ConfigDiscovery::discover_config(args.project.as_deref(), workspace_root)?;
    init_logging(project.settings.log_filter.as_deref(), args.verbose);
    info!("Starting actiongraph with project {:?}", project_path);

    let graph = Arc::new(project.to_config_graph()?);
    let solver = GraphSolver::new(project.settings.solver_config()?);
    let ctx = CommandContext::new(graph, Arc::new(LocalRouter::new()), solver);

    match mode {
        ExecutionMode::Execute(options) => {
            let result = execute_actions(&ctx, options).await?;
            print_json(&result)?;
            let failed = result.failed().count();
            if failed > 0 {
                bail!("{} action(s) failed", failed);
            }
        }
        ExecutionMode::DeleteDeploys(options) => {
            let statuses = delete_deploys(&ctx, options).await?;
            print_json(&statuses)?;
        }
        ExecutionMode::DeleteEnvironment { dependants_first } => {
            let result = delete_environment(&ctx, dependants_first).await?;
            print_json(&result)?;
        }
        ExecutionMode::ShowGraph => print_graph(&ctx.graph),
        ExecutionMode::ShowConfig => ConfigDiscovery::show_discovery_info(workspace_root),
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_graph(graph: &ConfigGraph) {
    for action in graph.actions() {
        let disabled = if action.is_disabled() { " (disabled)" } else { "" };
        println!("{} {}{}", action.key(), action.version_string(), disabled);

        for dep in action.dependency_references() {
            let mut flags = Vec::new();
            if dep.explicit {
                flags.push("explicit");
            }
            if dep.needs_static_outputs {
                flags.push("static outputs");
            }
            if dep.needs_executed_outputs {
                flags.push("runtime outputs");
            }
            println!("  -> {} [{}]", dep.reference(), flags.join(", "));
        }
    }
}
