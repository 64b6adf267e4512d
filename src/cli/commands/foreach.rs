//! Project iteration commands
//!
//! `foreach` runs an arbitrary shell command in every resolved project;
//! `git` forwards raw arguments to git; `pull`, `push`, `fetch`, `rebase`,
//! `status`, and `diff` are fixed git invocations. All of them iterate the
//! resolved set in BFS order (main first), reversed on request, and print
//! captured output under a per-project banner.

use std::process::Command;

use crate::cli::context::WorkspaceContext;
use crate::cli::output::Output;
use crate::core::project::Project;
use crate::git;
use crate::util::log_cmd;

/// Run a shell command in every project.
pub fn run_foreach(ctx: &WorkspaceContext, command: &[String], reverse: bool) -> anyhow::Result<()> {
    let shell_line = command.join(" ");
    iterate(ctx, reverse, |project, target| {
        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&shell_line)
            .current_dir(target)
            .env("GIT_WS_PROJECT_NAME", &project.name)
            .env("GIT_WS_PROJECT_PATH", &project.path)
            .env("GIT_WS_PROJECT_URL", &project.url);
        log_cmd(&cmd);
        let output = cmd.output()?;
        Ok(Captured {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    })
}

/// Forward raw arguments to git in every project.
pub fn run_git_passthrough(
    ctx: &WorkspaceContext,
    args: &[String],
    reverse: bool,
) -> anyhow::Result<()> {
    iterate(ctx, reverse, |_, target| {
        let captured = git::run_captured(target, args)?;
        Ok(Captured {
            success: captured.success,
            stdout: captured.stdout,
            stderr: captured.stderr,
        })
    })
}

/// The fixed-invocation iteration commands.
#[derive(Debug, Clone, Copy)]
pub enum IterOp {
    Pull,
    Push,
    Fetch,
    Rebase,
    Status,
    Diff,
}

impl IterOp {
    fn args(&self) -> &'static [&'static str] {
        match self {
            IterOp::Pull => &["pull"],
            IterOp::Push => &["push"],
            IterOp::Fetch => &["fetch"],
            IterOp::Rebase => &["rebase"],
            IterOp::Status => &["status", "--short", "--branch"],
            IterOp::Diff => &["diff", "--stat"],
        }
    }
}

pub fn run_iter_op(ctx: &WorkspaceContext, op: IterOp, reverse: bool) -> anyhow::Result<()> {
    let args: Vec<String> = op.args().iter().map(|s| s.to_string()).collect();
    run_git_passthrough(ctx, &args, reverse)
}

struct Captured {
    success: bool,
    stdout: String,
    stderr: String,
}

fn iterate<F>(ctx: &WorkspaceContext, reverse: bool, mut op: F) -> anyhow::Result<()>
where
    F: FnMut(&Project, &std::path::Path) -> anyhow::Result<Captured>,
{
    let _lock = ctx.workspace.lock_shared()?;
    let set = ctx.resolve(None, &[])?;

    let mut projects: Vec<&Project> = set.projects.iter().collect();
    if reverse {
        projects.reverse();
    }

    let mut error_count = 0;
    let mut skip_count = 0;

    for project in projects {
        let target = project.abs_path(&ctx.workspace.root);
        if !target.exists() {
            if !ctx.quiet {
                Output::warning(&format!("{}: not cloned, skipping", project.path));
            }
            skip_count += 1;
            continue;
        }

        Output::project_banner(&project.path, project.role());
        match op(project, &target) {
            Ok(captured) => {
                print!("{}", captured.stdout);
                if !captured.stderr.is_empty() {
                    eprint!("{}", captured.stderr);
                }
                if !captured.success {
                    error_count += 1;
                }
            }
            Err(e) => {
                Output::error(&e.to_string());
                error_count += 1;
            }
        }
    }

    if !ctx.quiet {
        println!();
        if error_count == 0 {
            Output::success(&format!(
                "Done{}",
                if skip_count > 0 {
                    format!(" ({} skipped)", skip_count)
                } else {
                    String::new()
                }
            ));
        }
    }

    if error_count > 0 {
        anyhow::bail!("command failed in {} project(s)", error_count);
    }
    Ok(())
}
