//! Tag command implementation
//!
//! Freezes the current workspace into `.git-ws/manifests/<name>.toml`
//! inside the main project, commits that file, and creates an annotated
//! Git tag. Checking out such a tag later makes `update` use the frozen
//! manifest instead of the live one, reproducing the workspace exactly.

use crate::cli::context::WorkspaceContext;
use crate::cli::output::Output;
use crate::core::transform;
use crate::core::workspace::FROZEN_DIR;
use crate::git;

pub fn run_tag(ctx: &WorkspaceContext, name: &str, message: &str) -> anyhow::Result<()> {
    let _lock = ctx.workspace.lock_exclusive()?;

    let main_dir = ctx
        .workspace
        .main_dir()
        .ok_or_else(|| anyhow::anyhow!("tag requires a workspace with a main project"))?;
    if !git::is_git_repo(&main_dir) {
        anyhow::bail!("main project at {} is not a git clone", main_dir.display());
    }

    let set = ctx.resolve(None, &[])?;
    let frozen = transform::freeze_manifest(&set, &ctx.workspace.root)?;

    let rel_file = format!("{}/{}.toml", FROZEN_DIR, name);
    let abs_file = main_dir.join(&rel_file);
    if let Some(parent) = abs_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    frozen.save(&abs_file)?;

    git::add_and_commit(
        &main_dir,
        &[rel_file.as_str()],
        &format!("Add frozen manifest for tag {}", name),
    )?;
    git::create_tag(&main_dir, name, message)?;

    if !ctx.quiet {
        Output::success(&format!("Created tag '{}' with frozen manifest {}", name, rel_file));
    }
    Ok(())
}
