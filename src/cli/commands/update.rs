//! Update command implementation
//!
//! The workspace materializer: runs the resolver, then reconciles the
//! filesystem against the resolved project list. Each project is synced
//! independently; failures are collected and reported at the end rather
//! than aborting the loop. Re-running over a clean tree is a no-op.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::task::JoinSet;

use crate::cli::context::WorkspaceContext;
use crate::cli::output::Output;
use crate::core::project::Project;
use crate::core::resolver::ResolvedSet;
use crate::core::workspace::{PruneReason, WorkspaceError, INFO_DIR};
use crate::files::apply_file_refs;
use crate::git;

/// Flags accepted by `git-ws update`.
#[derive(Debug, Default, Clone)]
pub struct UpdateOptions {
    pub skip_main: bool,
    pub rebase: bool,
    pub prune: bool,
    pub force: bool,
    /// Restrict to projects matching these names or paths.
    pub projects: Vec<String>,
    /// Override the stored group filters for this run.
    pub group_filters: Vec<String>,
    /// Override the manifest path for this run.
    pub manifest: Option<String>,
    /// Disable the parallel sync path.
    pub sequential: bool,
    pub json: bool,
}

/// Result of syncing a single project.
#[derive(Debug, Clone, serde::Serialize)]
struct SyncResult {
    path: String,
    #[serde(skip)]
    role: &'static str,
    action: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Run the update command
pub async fn run_update(ctx: &WorkspaceContext, opts: UpdateOptions) -> anyhow::Result<()> {
    let _lock = ctx.workspace.lock_exclusive()?;

    let manifest_override = match &opts.manifest {
        Some(path) => Some(path.clone()),
        None => frozen_manifest_override(ctx),
    };

    let depth = ctx.workspace.config.clone_depth;
    let select = |p: &Project| {
        !(p.is_main && opts.skip_main)
            && (opts.projects.is_empty()
                || p.is_main
                || opts
                    .projects
                    .iter()
                    .any(|sel| sel == &p.name || sel == &p.path))
    };

    // Cloning a dependency can surface its manifest and with it deeper
    // dependencies, so resolution and materialization interleave until the
    // resolved set stops growing.
    let mut synced: HashSet<String> = HashSet::new();
    let mut results: Vec<SyncResult> = Vec::new();
    let mut set: ResolvedSet;
    loop {
        set = ctx.resolve(manifest_override.as_deref(), &opts.group_filters)?;
        let targets: Vec<Project> = set
            .projects
            .iter()
            .filter(|p| select(p) && !synced.contains(&p.path))
            .cloned()
            .collect();
        if targets.is_empty() {
            break;
        }

        let progress = !ctx.quiet && !opts.json;
        if progress {
            Output::header(&format!("Updating {} project(s)...", targets.len()));
        }

        let round = if opts.sequential {
            sync_sequential(&ctx.workspace.root, &targets, &opts, depth, progress)
        } else {
            sync_parallel(&ctx.workspace.root, &targets, &opts, depth, progress).await?
        };
        synced.extend(targets.iter().map(|p| p.path.clone()));
        results.extend(round);
    }

    if !ctx.quiet && !opts.json {
        for diag in &set.diagnostics {
            Output::warning(&diag.to_string());
        }
    }

    if !opts.json {
        for result in &results {
            Output::project_banner(&result.path, result.role);
            if result.success {
                if !ctx.quiet {
                    Output::success(&format!("{}: {}", result.path, result.action));
                }
            } else {
                Output::error(&format!(
                    "{}: {}",
                    result.path,
                    result.error.as_deref().unwrap_or("failed")
                ));
            }
        }
    }

    let mut failures: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.path.clone())
        .collect();

    let mut state = ctx.workspace.load_state()?;
    let old_tracked = state.tracked_paths.clone();

    // Link/copy files of the main project and first-level dependencies only.
    for project in set.projects.iter().filter(|p| p.is_main || p.level == 1) {
        if project.linkfiles.is_empty() && project.copyfiles.is_empty() {
            continue;
        }
        match apply_file_refs(
            &ctx.workspace.root,
            project,
            &set.filters,
            &mut state,
            opts.force,
        ) {
            Ok(report) => {
                for warning in &report.warnings {
                    if !opts.json {
                        Output::warning(&format!("{}: {}", project.path, warning));
                    }
                }
            }
            Err(e) => {
                if !opts.json {
                    Output::error(&format!("{}: {}", project.path, e));
                }
                failures.push(project.path.clone());
            }
        }
    }

    if opts.prune {
        let pruned = prune_obsolete(ctx, &set, &old_tracked, opts.force, opts.json)?;
        if !ctx.quiet && !opts.json && pruned > 0 {
            Output::success(&format!("Pruned {} obsolete clone(s)", pruned));
        }
    }

    // Keep tracking refused prune candidates that are still on disk, so a
    // later forced prune can find them.
    let mut tracked: Vec<String> = set.non_main().map(|p| p.path.clone()).collect();
    for path in &old_tracked {
        if !tracked.contains(path)
            && path != &ctx.workspace.config.main_path
            && ctx.workspace.root.join(path).exists()
        {
            tracked.push(path.clone());
        }
    }
    state.tracked_paths = tracked;
    ctx.workspace.save_state(&state)?;

    if opts.json {
        #[derive(serde::Serialize)]
        struct JsonUpdate<'a> {
            success: bool,
            projects: &'a [SyncResult],
        }
        println!(
            "{}",
            serde_json::to_string_pretty(&JsonUpdate {
                success: failures.is_empty(),
                projects: &results,
            })?
        );
    } else if failures.is_empty() {
        if !ctx.quiet {
            Output::success(&format!("All {} project(s) up to date.", results.len()));
        }
    }

    if !failures.is_empty() {
        anyhow::bail!("{} project(s) failed: {}", failures.len(), failures.join(", "));
    }
    Ok(())
}

/// When HEAD of the main project sits on a tag with a frozen manifest,
/// that manifest supersedes the live one.
fn frozen_manifest_override(ctx: &WorkspaceContext) -> Option<String> {
    let main_dir = ctx.workspace.main_dir()?;
    if !git::is_git_repo(&main_dir) {
        return None;
    }
    for tag in git::tags_at_head(&main_dir).ok()? {
        let rel = format!("{}/{}.toml", crate::core::workspace::FROZEN_DIR, tag);
        if main_dir.join(&rel).exists() {
            if !ctx.quiet {
                Output::info(&format!("Using frozen manifest for tag '{}'", tag));
            }
            return Some(rel);
        }
    }
    None
}

fn sync_sequential(
    root: &Path,
    targets: &[Project],
    opts: &UpdateOptions,
    depth: Option<u32>,
    progress: bool,
) -> Vec<SyncResult> {
    targets
        .iter()
        .map(|p| {
            let spinner = progress.then(|| Output::spinner(&format!("Syncing {}...", p.path)));
            let result = sync_single_project(root, p, opts.rebase, opts.force, depth);
            if let Some(s) = spinner {
                s.finish_and_clear();
            }
            result
        })
        .collect()
}

/// Sync projects in parallel. Results are buffered and re-ordered so the
/// output is still grouped per project in BFS order.
async fn sync_parallel(
    root: &Path,
    targets: &[Project],
    opts: &UpdateOptions,
    depth: Option<u32>,
    progress: bool,
) -> anyhow::Result<Vec<SyncResult>> {
    let spinner =
        progress.then(|| Output::spinner(&format!("Syncing {} project(s)...", targets.len())));
    let mut join_set: JoinSet<(usize, SyncResult)> = JoinSet::new();

    for (idx, project) in targets.iter().cloned().enumerate() {
        let root = root.to_path_buf();
        let rebase = opts.rebase;
        let force = opts.force;
        join_set.spawn_blocking(move || {
            let result = sync_single_project(&root, &project, rebase, force, depth);
            (idx, result)
        });
    }

    let mut results: Vec<(usize, SyncResult)> = Vec::with_capacity(targets.len());
    while let Some(res) = join_set.join_next().await {
        results.push(res?);
    }
    if let Some(s) = spinner {
        s.finish_and_clear();
    }
    results.sort_by_key(|(idx, _)| *idx);
    Ok(results.into_iter().map(|(_, r)| r).collect())
}

/// Reconcile a single clone with its resolved record.
fn sync_single_project(
    root: &Path,
    project: &Project,
    rebase: bool,
    force: bool,
    depth: Option<u32>,
) -> SyncResult {
    let target = project.abs_path(root);

    let outcome = if !target.exists() {
        clone_project(project, &target, depth)
    } else if !git::is_git_repo(&target) {
        if force {
            return result_ok(project, "skipped (not a git clone)".to_string());
        }
        Err(WorkspaceError::NotAGitClone { path: target.clone() }.to_string())
    } else {
        sync_existing(project, &target, rebase)
    };

    match outcome {
        Ok(action) => {
            if project.submodules && git::is_git_repo(&target) {
                if let Err(e) = git::submodule_update(&target) {
                    return result_err(project, e.to_string());
                }
            }
            result_ok(project, action)
        }
        Err(error) => result_err(project, error),
    }
}

fn clone_project(
    project: &Project,
    target: &Path,
    depth: Option<u32>,
) -> Result<String, String> {
    if project.url.is_empty() {
        return Err("no URL to clone from".to_string());
    }
    git::clone(&project.url, target, depth).map_err(|e| e.to_string())?;
    if let Some(ref rev) = project.revision {
        git::checkout(target, rev).map_err(|e| e.to_string())?;
        Ok(format!("cloned at {}", rev))
    } else {
        Ok("cloned".to_string())
    }
}

fn sync_existing(project: &Project, target: &Path, rebase: bool) -> Result<String, String> {
    let revision = match project.revision {
        Some(ref rev) => rev,
        // No declared revision: leave the checked-out branch alone.
        None => return Ok("no revision declared; left alone".to_string()),
    };

    let on_branch = git::current_branch(target).map_err(|e| e.to_string())?;
    if on_branch.as_deref() == Some(revision.as_str()) {
        if rebase {
            git::pull_rebase(target).map_err(|e| e.to_string())?;
            Ok(format!("rebased onto origin/{}", revision))
        } else {
            git::pull(target).map_err(|e| e.to_string())?;
            Ok(format!("pulled {}", revision))
        }
    } else {
        // A tag, SHA, or a branch other than the current one: fetch and
        // check out the pinned ref (detached HEAD permitted).
        git::fetch(target).map_err(|e| e.to_string())?;
        git::checkout(target, revision).map_err(|e| e.to_string())?;
        Ok(format!("checked out {}", revision))
    }
}

fn result_ok(project: &Project, action: String) -> SyncResult {
    SyncResult {
        path: project.path.clone(),
        role: project.role(),
        action,
        success: true,
        error: None,
    }
}

fn result_err(project: &Project, error: String) -> SyncResult {
    SyncResult {
        path: project.path.clone(),
        role: project.role(),
        action: "failed".to_string(),
        success: false,
        error: Some(error),
    }
}

/// Remove clones that were materialized by a previous update but left the
/// resolved set. Candidates carrying uncommitted work are refused.
fn prune_obsolete(
    ctx: &WorkspaceContext,
    set: &ResolvedSet,
    old_tracked: &[String],
    force: bool,
    json: bool,
) -> anyhow::Result<usize> {
    let resolved: HashSet<&str> = set.projects.iter().map(|p| p.path.as_str()).collect();
    let main_path = ctx.workspace.config.main_path.as_str();

    let mut pruned = 0;
    for path in old_tracked {
        if resolved.contains(path.as_str()) || path == main_path || path == INFO_DIR {
            continue;
        }
        let abs = ctx.workspace.root.join(path);
        if !abs.exists() {
            continue;
        }

        if !force {
            if let Err(e) = check_prunable(path, &abs) {
                if !json {
                    Output::warning(&e.to_string());
                }
                continue;
            }
        }

        std::fs::remove_dir_all(&abs)?;
        if !ctx.quiet && !json {
            Output::success(&format!("pruned {}", path));
        }
        pruned += 1;
    }
    Ok(pruned)
}

fn check_prunable(rel: &str, abs: &PathBuf) -> Result<(), WorkspaceError> {
    if !git::is_git_repo(abs) {
        return Err(WorkspaceError::NotAGitClone { path: abs.clone() });
    }
    let refused = |reason: PruneReason| WorkspaceError::PruneRefused {
        path: rel.to_string(),
        reason,
    };
    let git_err = |_| WorkspaceError::ForceRequired {
        action: format!("prune {}", rel),
    };

    if git::has_untracked(abs).map_err(git_err)? {
        return Err(refused(PruneReason::Untracked));
    }
    if git::has_staged(abs).map_err(git_err)? {
        return Err(refused(PruneReason::Staged));
    }
    if git::has_unpushed(abs).map_err(git_err)? {
        return Err(refused(PruneReason::Unpushed));
    }
    if git::has_stash(abs).map_err(git_err)? {
        return Err(refused(PruneReason::Stashed));
    }
    Ok(())
}
