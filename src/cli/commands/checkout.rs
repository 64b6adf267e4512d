//! Checkout command implementation
//!
//! Resets every clone to its manifest-declared revision. Clones with local
//! changes are refused unless forced; projects without a revision are left
//! alone.

use crate::cli::context::WorkspaceContext;
use crate::cli::output::Output;
use crate::git::{self, GitError};

pub fn run_checkout(ctx: &WorkspaceContext, force: bool) -> anyhow::Result<()> {
    let _lock = ctx.workspace.lock_exclusive()?;
    let set = ctx.resolve(None, &[])?;

    let mut error_count = 0;
    for project in &set.projects {
        let target = project.abs_path(&ctx.workspace.root);
        Output::project_banner(&project.path, project.role());

        if !target.exists() {
            Output::warning(&format!("{}: not cloned, run update first", project.path));
            continue;
        }

        let revision = match project.revision {
            Some(ref rev) => rev,
            None => {
                if !ctx.quiet {
                    Output::info(&format!("{}: no revision declared", project.path));
                }
                continue;
            }
        };

        if !force {
            match git::is_clean(&target) {
                Ok(true) => {}
                Ok(false) => {
                    let err = GitError::DirtyTree {
                        path: target.clone(),
                    };
                    Output::error(&format!("{}: {}", project.path, err));
                    error_count += 1;
                    continue;
                }
                Err(e) => {
                    Output::error(&format!("{}: {}", project.path, e));
                    error_count += 1;
                    continue;
                }
            }
        }

        match git::checkout(&target, revision) {
            Ok(()) => {
                if !ctx.quiet {
                    Output::success(&format!("{}: checked out {}", project.path, revision));
                }
            }
            Err(e) => {
                Output::error(&format!("{}: {}", project.path, e));
                error_count += 1;
            }
        }
    }

    if error_count > 0 {
        anyhow::bail!("{} project(s) failed to check out", error_count);
    }
    Ok(())
}
