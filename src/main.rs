//! git-ws CLI entry point

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use git_ws::cli::commands::edit::DepAddArgs;
use git_ws::cli::commands::foreach::IterOp;
use git_ws::cli::commands::init::InitOptions;
use git_ws::cli::commands::update::UpdateOptions;
use git_ws::cli::commands::{
    checkout, deinit, edit, foreach, info, init, manifest_cmd, tag, update,
};
use git_ws::cli::{Output, WorkspaceContext};
use git_ws::core::workspace::Workspace;

#[derive(Parser)]
#[command(name = "git-ws")]
#[command(author, version, about = "Multi-repo workspace tool", long_about = None)]
struct Cli {
    /// Suppress non-essential output
    #[arg(short, long, global = true, env = "GIT_WS_QUIET")]
    quiet: bool,
    /// Show verbose output
    #[arg(short, long, global = true, env = "GIT_WS_VERBOSE")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a workspace around the current main project clone
    Init {
        /// Manifest path relative to the main project
        #[arg(short, long, env = "GIT_WS_MANIFEST")]
        manifest: Option<String>,
        /// Group filter, e.g. '+dev' or '-doc@docs' (repeatable)
        #[arg(short = 'g', long = "group-filter", env = "GIT_WS_GROUP_FILTER", allow_hyphen_values = true)]
        group_filter: Vec<String>,
        /// Shallow clone depth for dependencies
        #[arg(long, env = "GIT_WS_DEPTH")]
        depth: Option<u32>,
        /// Run update after initializing
        #[arg(short, long)]
        update: bool,
    },
    /// Clone a main project and initialize a workspace around it
    Clone {
        /// Git URL of the main project
        url: String,
        /// Target directory (defaults to the repository name)
        path: Option<PathBuf>,
        #[arg(short, long, env = "GIT_WS_MANIFEST")]
        manifest: Option<String>,
        #[arg(short = 'g', long = "group-filter", env = "GIT_WS_GROUP_FILTER", allow_hyphen_values = true)]
        group_filter: Vec<String>,
        #[arg(long, env = "GIT_WS_DEPTH")]
        depth: Option<u32>,
        /// Skip the update after cloning
        #[arg(long)]
        no_update: bool,
    },
    /// Resolve the manifest and reconcile all clones
    Update {
        /// Leave the main project alone
        #[arg(long)]
        skip_main: bool,
        /// Pull with rebase instead of fast-forward
        #[arg(long)]
        rebase: bool,
        /// Remove clones that left the resolved set
        #[arg(long)]
        prune: bool,
        /// Override safety checks
        #[arg(short, long)]
        force: bool,
        /// Restrict to these projects (name or path, repeatable)
        #[arg(short, long = "project")]
        project: Vec<String>,
        #[arg(short = 'g', long = "group-filter", env = "GIT_WS_GROUP_FILTER", allow_hyphen_values = true)]
        group_filter: Vec<String>,
        /// Use this manifest instead of the configured one
        #[arg(long, env = "GIT_WS_MANIFEST")]
        manifest: Option<String>,
        /// Sync projects one at a time
        #[arg(long)]
        sequential: bool,
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Reset every clone to its manifest-declared revision
    Checkout {
        /// Check out even when a clone has local changes
        #[arg(short, long)]
        force: bool,
    },
    /// Run a shell command in every project
    Foreach {
        /// Iterate dependencies before the main project
        #[arg(long)]
        reverse: bool,
        /// Command and arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<String>,
    },
    /// Run git with the given arguments in every project
    Git {
        #[arg(long)]
        reverse: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
    /// git pull in every project
    Pull {
        #[arg(long)]
        reverse: bool,
    },
    /// git push in every project
    Push {
        #[arg(long)]
        reverse: bool,
    },
    /// git fetch in every project
    Fetch {
        #[arg(long)]
        reverse: bool,
    },
    /// git rebase in every project
    Rebase {
        #[arg(long)]
        reverse: bool,
    },
    /// Short status of every project
    Status {
        #[arg(long)]
        reverse: bool,
    },
    /// Diff stat of every project
    Diff {
        #[arg(long)]
        reverse: bool,
    },
    /// Manifest transformations
    Manifest {
        #[command(subcommand)]
        action: ManifestCommands,
    },
    /// Edit manifest dependencies
    Dep {
        #[command(subcommand)]
        action: DepCommands,
    },
    /// Edit manifest remotes
    Remote {
        #[command(subcommand)]
        action: RemoteCommands,
    },
    /// Read or write manifest defaults
    Default {
        #[command(subcommand)]
        action: DefaultCommands,
    },
    /// Edit the manifest's group-filter list
    GroupFilters {
        #[command(subcommand)]
        action: GroupFilterCommands,
    },
    /// Read-only workspace introspection
    Info {
        #[command(subcommand)]
        action: InfoCommands,
    },
    /// Freeze the workspace into a tagged manifest and create a Git tag
    Tag {
        /// Tag name
        name: String,
        /// Tag message
        #[arg(short, long)]
        message: String,
    },
    /// Remove workspace metadata, leaving clones in place
    Deinit,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ManifestCommands {
    /// Flatten the recursive manifest graph into one manifest
    Resolve {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Like resolve, with every revision pinned to a commit SHA
    Freeze {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Load and validate the live manifest
    Validate,
    /// Rewrite the live manifest at the current schema version
    Upgrade,
    /// Print the live manifest path
    Path,
    /// Print the manifest paths of all resolved projects
    Paths,
    /// Write a starter manifest
    Create {
        path: Option<PathBuf>,
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum DepCommands {
    /// Add a dependency
    Add {
        name: String,
        #[arg(long)]
        remote: Option<String>,
        #[arg(long)]
        sub_url: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        revision: Option<String>,
        #[arg(long)]
        path: Option<String>,
        #[arg(long = "group")]
        groups: Vec<String>,
    },
    /// Remove a dependency
    Delete { name: String },
    /// List dependency names
    List,
}

#[derive(Subcommand)]
enum RemoteCommands {
    Add { name: String, url_base: String },
    Delete { name: String },
    List,
}

#[derive(Subcommand)]
enum DefaultCommands {
    /// Print default values
    Get { field: Option<String> },
    /// Set a default value; an empty value clears it
    Set { field: String, value: String },
}

#[derive(Subcommand)]
enum GroupFilterCommands {
    /// Replace the manifest's group-filter list
    Set {
        #[arg(allow_hyphen_values = true)]
        filters: Vec<String>,
    },
    /// Print the manifest's group-filter list
    List,
}

#[derive(Subcommand)]
enum InfoCommands {
    /// Print the main project path
    MainPath,
    /// Print the workspace root path
    WorkspacePath,
    /// Print the paths of all resolved projects
    ProjectPaths,
    /// Render the dependency tree
    DepTree {
        /// Hide dropped entries and show filter traces
        #[arg(long)]
        primary: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "git_ws=debug" } else { "git_ws=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        Output::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;

    // Commands that do not need an existing workspace.
    match &cli.command {
        Commands::Init {
            manifest,
            group_filter,
            depth,
            update,
        } => {
            return init::run_init(
                &cwd,
                InitOptions {
                    manifest: manifest.clone(),
                    group_filters: group_filter.clone(),
                    depth: *depth,
                    update: *update,
                    quiet: cli.quiet,
                },
            )
            .await;
        }
        Commands::Clone {
            url,
            path,
            manifest,
            group_filter,
            depth,
            no_update,
        } => {
            return init::run_clone(
                url,
                path.clone(),
                &cwd,
                InitOptions {
                    manifest: manifest.clone(),
                    group_filters: group_filter.clone(),
                    depth: *depth,
                    update: !no_update,
                    quiet: cli.quiet,
                },
            )
            .await;
        }
        Commands::Manifest {
            action: ManifestCommands::Create { path, force },
        } => {
            return manifest_cmd::run_create(path.clone(), *force);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(*shell, &mut cmd, "git-ws", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let workspace = Workspace::find(&cwd)?;
    let ctx = WorkspaceContext {
        workspace,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Update {
            skip_main,
            rebase,
            prune,
            force,
            project,
            group_filter,
            manifest,
            sequential,
            json,
        } => {
            update::run_update(
                &ctx,
                UpdateOptions {
                    skip_main,
                    rebase,
                    prune,
                    force,
                    projects: project,
                    group_filters: group_filter,
                    manifest,
                    sequential,
                    json,
                },
            )
            .await
        }
        Commands::Checkout { force } => checkout::run_checkout(&ctx, force),
        Commands::Foreach { reverse, command } => foreach::run_foreach(&ctx, &command, reverse),
        Commands::Git { reverse, args } => foreach::run_git_passthrough(&ctx, &args, reverse),
        Commands::Pull { reverse } => foreach::run_iter_op(&ctx, IterOp::Pull, reverse),
        Commands::Push { reverse } => foreach::run_iter_op(&ctx, IterOp::Push, reverse),
        Commands::Fetch { reverse } => foreach::run_iter_op(&ctx, IterOp::Fetch, reverse),
        Commands::Rebase { reverse } => foreach::run_iter_op(&ctx, IterOp::Rebase, reverse),
        Commands::Status { reverse } => foreach::run_iter_op(&ctx, IterOp::Status, reverse),
        Commands::Diff { reverse } => foreach::run_iter_op(&ctx, IterOp::Diff, reverse),
        Commands::Manifest { action } => match action {
            ManifestCommands::Resolve { output } => manifest_cmd::run_resolve(&ctx, output),
            ManifestCommands::Freeze { output } => manifest_cmd::run_freeze(&ctx, output),
            ManifestCommands::Validate => manifest_cmd::run_validate(&ctx),
            ManifestCommands::Upgrade => manifest_cmd::run_upgrade(&ctx),
            ManifestCommands::Path => manifest_cmd::run_path(&ctx),
            ManifestCommands::Paths => manifest_cmd::run_paths(&ctx),
            ManifestCommands::Create { .. } => unreachable!("handled before discovery"),
        },
        Commands::Dep { action } => match action {
            DepCommands::Add {
                name,
                remote,
                sub_url,
                url,
                revision,
                path,
                groups,
            } => edit::run_dep_add(
                &ctx,
                DepAddArgs {
                    name,
                    remote,
                    sub_url,
                    url,
                    revision,
                    path,
                    groups,
                },
            ),
            DepCommands::Delete { name } => edit::run_dep_delete(&ctx, &name),
            DepCommands::List => edit::run_dep_list(&ctx),
        },
        Commands::Remote { action } => match action {
            RemoteCommands::Add { name, url_base } => edit::run_remote_add(&ctx, &name, &url_base),
            RemoteCommands::Delete { name } => edit::run_remote_delete(&ctx, &name),
            RemoteCommands::List => edit::run_remote_list(&ctx),
        },
        Commands::Default { action } => match action {
            DefaultCommands::Get { field } => edit::run_default_get(&ctx, field.as_deref()),
            DefaultCommands::Set { field, value } => edit::run_default_set(&ctx, &field, &value),
        },
        Commands::GroupFilters { action } => match action {
            GroupFilterCommands::Set { filters } => edit::run_group_filters_set(&ctx, &filters),
            GroupFilterCommands::List => edit::run_group_filters_list(&ctx),
        },
        Commands::Info { action } => match action {
            InfoCommands::MainPath => info::run_main_path(&ctx),
            InfoCommands::WorkspacePath => info::run_workspace_path(&ctx),
            InfoCommands::ProjectPaths => info::run_project_paths(&ctx),
            InfoCommands::DepTree { primary } => info::run_dep_tree(&ctx, primary),
        },
        Commands::Tag { name, message } => tag::run_tag(&ctx, &name, &message),
        Commands::Deinit => deinit::run_deinit(ctx),
        Commands::Init { .. } | Commands::Clone { .. } | Commands::Completions { .. } => {
            unreachable!("handled before discovery")
        }
    }
}
