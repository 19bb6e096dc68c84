pub mod commands;
pub mod output;
pub mod progress;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::env;
use std::path::PathBuf;
use std::process::exit;

use crate::application::services::DEFAULT_WORKERS;
use crate::domain::value_objects::VcsType;

use self::commands::{
    CommandContext, ExportHandler, HelpHandler, ImportHandler, RunHandler, ValidateHandler,
};

/// Output format for job results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    Text,
    /// JSON output
    Json,
    /// YAML output
    Yaml,
}

/// vcs - Run version control commands across many repositories
#[derive(Parser, Debug)]
#[command(name = "vcs")]
#[command(about = "Run version control commands across many repositories")]
#[command(version)]
#[command(long_version = long_version())]
#[command(propagate_version = true)]
#[command(infer_subcommands = true)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Show debug messages and run jobs one at a time
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "VCS_NO_COLOR")]
    pub no_color: bool,

    /// Working directory (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_HASH"),
        " ",
        env!("BUILD_DATE"),
        ")"
    )
}

/// Options shared by every command that runs jobs
#[derive(Args, Debug, Clone)]
pub struct JobArgs {
    /// Number of parallel worker threads, 0 for one per CPU
    #[arg(short = 'w', long, env = "VCS_WORKERS", default_value_t = DEFAULT_WORKERS)]
    pub workers: usize,

    /// Don't output any information for repositories with empty output
    #[arg(short = 's', long)]
    pub hide_empty: bool,

    /// Abort a single VCS command after this many seconds
    #[arg(long, env = "VCS_TIMEOUT", value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output format of the results
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Options of commands operating on existing working copies
#[derive(Args, Debug, Clone)]
pub struct DiscoveryArgs {
    /// Base paths to look for repositories
    #[arg(default_value = ".")]
    pub paths: Vec<PathBuf>,

    /// Search for nested repositories
    #[arg(short = 'n', long)]
    pub nested: bool,

    /// List repositories which the command operates on
    #[arg(long)]
    pub repos: bool,

    #[command(flatten)]
    pub jobs: JobArgs,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import the list of repositories
    Import {
        /// Base path to clone repositories to
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Where to read YAML from (file path, URL or - for stdin)
        #[arg(long, default_value = "-")]
        input: String,

        /// Delete existing directories if they don't contain the repository being imported
        #[arg(long)]
        force: bool,

        /// Create a shallow clone without a history
        #[arg(long)]
        shallow: bool,

        /// Recurse into submodules
        #[arg(long)]
        recursive: bool,

        /// Number of retries for network operations
        #[arg(long, env = "VCS_RETRY", default_value_t = 2)]
        retry: u32,

        /// Don't overwrite existing directories or change custom checkouts
        #[arg(long)]
        skip_existing: bool,

        /// List repositories which the command operates on
        #[arg(long)]
        repos: bool,

        #[command(flatten)]
        jobs: JobArgs,
    },

    /// Validate the repository list file
    Validate {
        /// Where to read YAML from (file path, URL or - for stdin)
        #[arg(long, default_value = "-")]
        input: String,

        /// Number of retries for network operations
        #[arg(long, env = "VCS_RETRY", default_value_t = 2)]
        retry: u32,

        #[command(flatten)]
        jobs: JobArgs,
    },

    /// Export the list of repositories
    Export {
        /// Export commit hashes instead of branch names
        #[arg(long, conflicts_with = "exact_with_tags")]
        exact: bool,

        /// Export unique tag names or commit hashes instead of branch names
        #[arg(long)]
        exact_with_tags: bool,

        /// Write one .tar.gz archive per repository into this directory
        #[arg(long, value_name = "DIR", conflicts_with_all = ["exact", "exact_with_tags"])]
        archive: Option<PathBuf>,

        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Bring working copies up to date
    Pull {
        /// Number of retries for network operations
        #[arg(long, env = "VCS_RETRY", default_value_t = 2)]
        retry: u32,

        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Push changes from the working copy to the repository
    Push {
        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Show the working copy status
    Status {
        /// Don't show unversioned items
        #[arg(short, long)]
        quiet: bool,

        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Show changes in the working tree
    Diff {
        /// Output N lines of context
        #[arg(long, value_name = "N")]
        context: Option<u32>,

        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Show commit logs
    Log {
        /// Limit number of log entries, 0 for no limit
        #[arg(short, long, default_value_t = 3)]
        limit: u32,

        /// Limit number of log entries to those since this tag
        #[arg(long, value_name = "TAG", conflicts_with = "limit_untagged")]
        limit_tag: Option<String>,

        /// Limit number of log entries to those since the last tag
        #[arg(long)]
        limit_untagged: bool,

        /// Show only merge commits
        #[arg(long)]
        merge_only: bool,

        /// Show the full commit message
        #[arg(long)]
        verbose: bool,

        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Show the branches
    Branch {
        /// Show all branches
        #[arg(short, long)]
        all: bool,

        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Show the URL of the repository
    Remotes {
        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Run a custom command in each repository
    Custom {
        /// Run command in git repositories
        #[arg(long)]
        git: bool,

        /// Run command in hg repositories
        #[arg(long)]
        hg: bool,

        /// Run command in svn repositories
        #[arg(long)]
        svn: bool,

        /// Run command in bzr repositories
        #[arg(long)]
        bzr: bool,

        /// Arbitrary arguments passed to each VCS invocation
        #[arg(long, required = true, num_args = 1.., allow_hyphen_values = true)]
        args: Vec<String>,

        #[command(flatten)]
        discovery: DiscoveryArgs,
    },

    /// Show help for the available commands
    Help {
        /// Show help of this command
        command: Option<String>,

        /// Show the available VCS clients
        #[arg(long)]
        clients: bool,

        /// Output a list of available commands
        #[arg(long)]
        commands: bool,
    },
}

impl Commands {
    /// VCS types selected by `custom`, all of them when none is given
    fn custom_types(git: bool, hg: bool, svn: bool, bzr: bool) -> Vec<VcsType> {
        let selected: Vec<VcsType> = [
            (bzr, VcsType::Bzr),
            (git, VcsType::Git),
            (hg, VcsType::Hg),
            (svn, VcsType::Svn),
        ]
        .into_iter()
        .filter_map(|(flag, vcs_type)| flag.then_some(vcs_type))
        .collect();
        if selected.is_empty() {
            vec![VcsType::Bzr, VcsType::Git, VcsType::Hg, VcsType::Svn]
        } else {
            selected
        }
    }
}

/// CLI application runner
pub struct CliApp {
    cli: Cli,
}

impl Default for CliApp {
    fn default() -> Self {
        Self::new()
    }
}

impl CliApp {
    pub fn new() -> Self {
        Self { cli: Cli::parse() }
    }

    pub fn from_cli(cli: Cli) -> Self {
        Self { cli }
    }

    pub fn cli(&self) -> &Cli {
        &self.cli
    }

    pub async fn run(self) -> anyhow::Result<()> {
        colored::control::set_override(!self.cli.no_color && console::colors_enabled());

        if let Some(ref dir) = self.cli.directory {
            env::set_current_dir(dir)?;
        }

        match self.handle_command().await {
            Ok(true) => Ok(()),
            Ok(false) => exit(1),
            Err(e) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                exit(1);
            }
        }
    }

    /// Run the selected command, `Ok(false)` when any job failed
    async fn handle_command(&self) -> anyhow::Result<bool> {
        use crate::infrastructure::vcs::{
            BranchCommand, CustomCommand, DiffCommand, LogCommand, Operation, PullCommand,
            PushCommand, RemotesCommand, StatusCommand,
        };

        let context = CommandContext::new(self.cli.debug);
        match &self.cli.command {
            Commands::Import {
                path,
                input,
                force,
                shallow,
                recursive,
                retry,
                skip_existing,
                repos,
                jobs,
            } => {
                ImportHandler::new(context, path.clone(), input.clone(), jobs.clone())
                    .with_flags(*force, *shallow, *recursive, *skip_existing)
                    .with_retry(*retry)
                    .with_repos(*repos)
                    .execute()
                    .await
            }
            Commands::Validate { input, retry, jobs } => {
                ValidateHandler::new(context, input.clone(), *retry, jobs.clone())
                    .execute()
                    .await
            }
            Commands::Export {
                exact,
                exact_with_tags,
                archive,
                discovery,
            } => {
                ExportHandler::new(context, discovery.clone())
                    .with_exact(*exact || *exact_with_tags, *exact_with_tags)
                    .with_archive(archive.clone())
                    .execute()
                    .await
            }
            Commands::Pull { retry, discovery } => {
                RunHandler::new(context, discovery.clone())
                    .execute(Operation::Pull(PullCommand { retry: *retry }))
                    .await
            }
            Commands::Push { discovery } => {
                RunHandler::new(context, discovery.clone())
                    .execute(Operation::Push(PushCommand))
                    .await
            }
            Commands::Status { quiet, discovery } => {
                RunHandler::new(context, discovery.clone())
                    .execute(Operation::Status(StatusCommand { quiet: *quiet }))
                    .await
            }
            Commands::Diff { context: lines, discovery } => {
                RunHandler::new(context, discovery.clone())
                    .execute(Operation::Diff(DiffCommand { context: *lines }))
                    .await
            }
            Commands::Log {
                limit,
                limit_tag,
                limit_untagged,
                merge_only,
                verbose,
                discovery,
            } => {
                let command = LogCommand {
                    limit: *limit,
                    limit_tag: limit_tag.clone(),
                    limit_untagged: *limit_untagged,
                    merge_only: *merge_only,
                    verbose: *verbose,
                };
                RunHandler::new(context, discovery.clone())
                    .execute(Operation::Log(command))
                    .await
            }
            Commands::Branch { all, discovery } => {
                RunHandler::new(context, discovery.clone())
                    .execute(Operation::Branch(BranchCommand { all: *all }))
                    .await
            }
            Commands::Remotes { discovery } => {
                RunHandler::new(context, discovery.clone())
                    .execute(Operation::Remotes(RemotesCommand))
                    .await
            }
            Commands::Custom {
                git,
                hg,
                svn,
                bzr,
                args,
                discovery,
            } => {
                RunHandler::new(context, discovery.clone())
                    .with_types(Commands::custom_types(*git, *hg, *svn, *bzr))
                    .execute(Operation::Custom(CustomCommand { args: args.clone() }))
                    .await
            }
            Commands::Help {
                command,
                clients,
                commands,
            } => HelpHandler::new(command.clone(), *clients, *commands).execute(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_unique_prefix_selects_command() {
        let cli = Cli::try_parse_from(["vcs", "st", "-q"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { quiet: true, .. }));

        // pull and push share the prefix
        assert!(Cli::try_parse_from(["vcs", "pu"]).is_err());
    }

    #[test]
    fn test_discovery_defaults() {
        let cli = Cli::try_parse_from(["vcs", "remotes"]).unwrap();
        match cli.command {
            Commands::Remotes { discovery } => {
                assert_eq!(discovery.paths, vec![PathBuf::from(".")]);
                assert!(!discovery.nested);
                assert_eq!(discovery.jobs.format, OutputFormat::Text);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_custom_arguments_keep_hyphens() {
        let cli =
            Cli::try_parse_from(["vcs", "custom", "--git", "src", "--args", "log", "-1"]).unwrap();
        match cli.command {
            Commands::Custom {
                git,
                args,
                discovery,
                ..
            } => {
                assert!(git);
                assert_eq!(args, vec!["log".to_string(), "-1".to_string()]);
                assert_eq!(discovery.paths, vec![PathBuf::from("src")]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_custom_types_default_to_all_vcs() {
        assert_eq!(
            Commands::custom_types(false, false, false, false),
            vec![VcsType::Bzr, VcsType::Git, VcsType::Hg, VcsType::Svn]
        );
        assert_eq!(
            Commands::custom_types(false, true, false, false),
            vec![VcsType::Hg]
        );
    }

    #[test]
    fn test_export_modes_conflict() {
        assert!(Cli::try_parse_from(["vcs", "export", "--exact", "--archive", "out"]).is_err());
    }
}
