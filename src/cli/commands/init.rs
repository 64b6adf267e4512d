//! Init and clone command implementations
//!
//! `init` creates workspace metadata around an existing main project clone
//! (or a bare manifest for a main-less workspace); `clone` fetches the main
//! project first and then initializes around it. Both optionally run the
//! materializer afterwards.

use std::path::{Path, PathBuf};

use crate::cli::commands::update::{run_update, UpdateOptions};
use crate::cli::context::WorkspaceContext;
use crate::cli::output::Output;
use crate::core::group_filter::GroupFilter;
use crate::core::manifest::{ManifestSpec, MANIFEST_FILE};
use crate::core::workspace::{Workspace, WorkspaceConfig};
use crate::git;

/// Flags shared by `init` and `clone`.
#[derive(Debug, Default, Clone)]
pub struct InitOptions {
    /// Manifest path relative to the main project (or workspace).
    pub manifest: Option<String>,
    pub group_filters: Vec<String>,
    pub depth: Option<u32>,
    /// Run `update` after initializing.
    pub update: bool,
    pub quiet: bool,
}

/// Initialize a workspace around the current directory.
///
/// Run inside the main project clone: the clone becomes the main project
/// and its parent directory the workspace root. Run in a directory that is
/// not a git clone but contains a manifest: a main-less workspace.
pub async fn run_init(cwd: &Path, opts: InitOptions) -> anyhow::Result<()> {
    for expr in &opts.group_filters {
        GroupFilter::parse(expr)?;
    }
    let manifest_path = opts.manifest.clone().unwrap_or_else(|| MANIFEST_FILE.to_string());

    let (root, main_path) = if git::is_git_repo(cwd) {
        let main_name = cwd
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("cannot determine main project directory name"))?;
        let root = cwd
            .parent()
            .ok_or_else(|| anyhow::anyhow!("main project has no parent directory"))?
            .to_path_buf();
        (root, main_name)
    } else {
        // Main-less workspace: the manifest must already be here.
        if !cwd.join(&manifest_path).exists() {
            anyhow::bail!(
                "{} is neither a git clone nor does it contain {}",
                cwd.display(),
                manifest_path
            );
        }
        (cwd.to_path_buf(), String::new())
    };

    // Fail early on an unreadable manifest.
    let manifest_file = if main_path.is_empty() {
        root.join(&manifest_path)
    } else {
        root.join(&main_path).join(&manifest_path)
    };
    ManifestSpec::load(&manifest_file)?;

    let mut config = WorkspaceConfig::new(&main_path, &manifest_path);
    config.group_filters = opts.group_filters.clone();
    config.clone_depth = opts.depth;
    let workspace = Workspace::init(&root, config)?;

    if !opts.quiet {
        Output::success(&format!("Initialized workspace at {}", workspace.root.display()));
    }

    if opts.update {
        let ctx = WorkspaceContext {
            workspace,
            quiet: opts.quiet,
            verbose: false,
        };
        run_update(&ctx, UpdateOptions::default()).await?;
    }
    Ok(())
}

/// Clone a main project and initialize a workspace around it.
pub async fn run_clone(
    url: &str,
    target: Option<PathBuf>,
    cwd: &Path,
    opts: InitOptions,
) -> anyhow::Result<()> {
    let main_name = match &target {
        Some(dir) => dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| anyhow::anyhow!("invalid target directory"))?,
        None => url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .map(|n| n.trim_end_matches(".git").to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| anyhow::anyhow!("cannot derive a directory name from '{}'", url))?,
    };

    let main_dir = match target {
        Some(dir) => cwd.join(dir),
        None => cwd.join(&main_name),
    };
    if main_dir.exists() {
        anyhow::bail!("target directory {} already exists", main_dir.display());
    }

    if !opts.quiet {
        Output::info(&format!("Cloning {} into {}", url, main_dir.display()));
    }
    git::clone(url, &main_dir, opts.depth)?;

    run_init(&main_dir, opts).await
}
