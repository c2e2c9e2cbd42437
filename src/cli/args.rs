//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `build`, `deploy`, `run`, `test`: Execute actions of one kind and their dependencies
//! - `cleanup deploy`: Delete deployed actions
//! - `cleanup namespace`: Delete every deploy and clean up the environment
//! - `graph`: Print the actions and their dependency references
//! - `show-config`: Show project discovery information

use crate::action::ActionKind;
use crate::commands::{DeleteDeployOptions, ExecuteCommandOptions};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Execute(ExecuteCommandOptions),
    DeleteDeploys(DeleteDeployOptions),
    DeleteEnvironment { dependants_first: bool },
    ShowGraph,
    ShowConfig,
}

#[derive(Debug, Parser)]
#[command(name = "actiongraph")]
#[command(author = "Actiongraph Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve, execute and tear down dependent build and deployment actions")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Project file path (defaults to discovery from the current directory)
    #[arg(short = 'p', long = "project", global = true)]
    pub project: Option<PathBuf>,
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags shared by the execute commands
#[derive(Debug, Clone, Default, ClapArgs)]
pub struct ExecuteFlags {
    /// Names of the actions to execute (all actions of the kind when omitted)
    pub names: Vec<String>,
    /// Execute the requested actions even if they are already up to date
    #[arg(short = 'f', long = "force")]
    pub force: bool,
    /// Force rebuilding every build the requested actions depend on
    #[arg(long = "force-build")]
    pub force_build: bool,
    /// Don't execute any dependencies, only the requested actions
    #[arg(long = "skip-dependencies")]
    pub skip_dependencies: bool,
    /// Don't execute explicit runtime dependencies, builds are still executed
    #[arg(long = "skip-runtime-dependencies")]
    pub skip_runtime_dependencies: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build actions and their dependencies
    Build(ExecuteFlags),
    /// Deploy actions and their dependencies
    Deploy {
        #[command(flatten)]
        flags: ExecuteFlags,
        /// Start code syncs after deploying
        #[arg(long = "sync")]
        sync: bool,
    },
    /// Run actions and their dependencies
    Run(ExecuteFlags),
    /// Run tests and their dependencies
    Test(ExecuteFlags),
    /// Clean up resources
    #[command(subcommand)]
    #[command(alias = "delete")]
    Cleanup(CleanupCommands),
    /// Print the actions and their dependency references
    Graph,
    /// Show project discovery information
    ShowConfig,
}

#[derive(Debug, Subcommand)]
pub enum CleanupCommands {
    /// Cleans up running deployments (all deploys when no names are given)
    #[command(alias = "deploys")]
    Deploy {
        /// The name(s) of the deploy(s) to delete
        names: Vec<String>,
        /// Delete deploys in reverse dependency order
        #[arg(long = "dependants-first")]
        dependants_first: bool,
        /// Also delete deploys that depend on the named ones (recursively).
        /// Implies --dependants-first.
        #[arg(long = "with-dependants")]
        with_dependants: bool,
    },
    /// Deletes every deploy and cleans up the environment
    #[command(aliases = ["environment", "env", "ns"])]
    Namespace {
        /// Delete deploys in reverse dependency order
        #[arg(long = "dependants-first")]
        dependants_first: bool,
    },
}

impl ExecuteFlags {
    fn into_options(self, kind: ActionKind) -> ExecuteCommandOptions {
        ExecuteCommandOptions {
            kind,
            names: self.names,
            force: self.force,
            force_build: self.force_build,
            skip_dependencies: self.skip_dependencies,
            skip_runtime_dependencies: self.skip_runtime_dependencies,
            start_syncs: false,
        }
    }
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Build(flags)) => Ok(ExecutionMode::Execute(
                flags.clone().into_options(ActionKind::Build),
            )),
            Some(Commands::Deploy { flags, sync }) => {
                let mut options = flags.clone().into_options(ActionKind::Deploy);
                options.start_syncs = *sync;
                Ok(ExecutionMode::Execute(options))
            }
            Some(Commands::Run(flags)) => Ok(ExecutionMode::Execute(
                flags.clone().into_options(ActionKind::Run),
            )),
            Some(Commands::Test(flags)) => Ok(ExecutionMode::Execute(
                flags.clone().into_options(ActionKind::Test),
            )),
            Some(Commands::Cleanup(CleanupCommands::Deploy {
                names,
                dependants_first,
                with_dependants,
            })) => Ok(ExecutionMode::DeleteDeploys(DeleteDeployOptions {
                names: names.clone(),
                dependants_first: *dependants_first,
                with_dependants: *with_dependants,
            })),
            Some(Commands::Cleanup(CleanupCommands::Namespace { dependants_first })) => {
                Ok(ExecutionMode::DeleteEnvironment {
                    dependants_first: *dependants_first,
                })
            }
            Some(Commands::Graph) => Ok(ExecutionMode::ShowGraph),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            None => Err(
                "No command specified. Use 'actiongraph --help' to see available commands."
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("actiongraph").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_deploy_command() {
        let args = parse(&["deploy", "api", "web", "--force", "--sync"]);
        let mode = args.mode().unwrap();

        if let ExecutionMode::Execute(options) = mode {
            assert_eq!(options.kind, ActionKind::Deploy);
            assert_eq!(options.names, vec!["api", "web"]);
            assert!(options.force);
            assert!(options.start_syncs);
            assert!(!options.force_build);
        } else {
            panic!("Expected Execute mode");
        }
    }

    #[test]
    fn test_build_command_without_names() {
        let args = parse(&["build", "--force-build", "--skip-dependencies"]);
        let mode = args.mode().unwrap();

        if let ExecutionMode::Execute(options) = mode {
            assert_eq!(options.kind, ActionKind::Build);
            assert!(options.names.is_empty());
            assert!(options.force_build);
            assert!(options.skip_dependencies);
            assert!(!options.start_syncs);
        } else {
            panic!("Expected Execute mode");
        }
    }

    #[test]
    fn test_cleanup_deploy_command() {
        let args = parse(&["cleanup", "deploy", "a", "b", "--with-dependants"]);
        let mode = args.mode().unwrap();

        if let ExecutionMode::DeleteDeploys(options) = mode {
            assert_eq!(options.names, vec!["a", "b"]);
            assert!(options.with_dependants);
            assert!(!options.dependants_first);
        } else {
            panic!("Expected DeleteDeploys mode");
        }
    }

    #[test]
    fn test_cleanup_namespace_aliases() {
        for alias in ["namespace", "ns", "env"] {
            let args = parse(&["cleanup", alias, "--dependants-first"]);
            assert!(matches!(
                args.mode().unwrap(),
                ExecutionMode::DeleteEnvironment {
                    dependants_first: true
                }
            ));
        }
    }

    #[test]
    fn test_global_flags() {
        let args = parse(&["test", "smoke", "--project", "other.toml", "-v"]);
        assert_eq!(args.project, Some(PathBuf::from("other.toml")));
        assert!(args.verbose);
    }

    #[test]
    fn test_no_command_error() {
        let args = Args {
            project: None,
            verbose: false,
            command: None,
        };
        let result = args.mode();
        assert!(result.is_err());
    }
}
