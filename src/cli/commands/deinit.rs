//! Deinit command implementation
//!
//! Removes `.git-ws/` from the workspace. Clones are left in place; only
//! the metadata is deleted.

use crate::cli::context::WorkspaceContext;
use crate::cli::output::Output;

pub fn run_deinit(ctx: WorkspaceContext) -> anyhow::Result<()> {
    let root = ctx.workspace.root.clone();
    let quiet = ctx.quiet;
    ctx.workspace.deinit()?;
    if !quiet {
        Output::success(&format!("Removed workspace metadata from {}", root.display()));
    }
    Ok(())
}
