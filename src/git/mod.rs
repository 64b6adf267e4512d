//! Git driver
//!
//! Wraps the external `git` executable behind structured operations. Every
//! function returns a typed result; callers never parse freeform stderr.
//! Local read-only queries (repo detection, current branch) go through git2
//! instead of spawning a subprocess.
//!
//! Operations within a single clone directory are inherently serialized by
//! the callers; there is no internal locking here.

use git2::Repository;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

use crate::util::log_cmd;

/// Errors that can occur during git operations
#[derive(Error, Debug)]
pub enum GitError {
    #[error("git clone failed for {url}: {stderr}")]
    CloneFailed { url: String, stderr: String },

    #[error("git checkout of '{revision}' failed in {path}: {stderr}")]
    CheckoutFailed {
        path: PathBuf,
        revision: String,
        stderr: String,
    },

    #[error("git pull failed in {path}: {stderr}")]
    PullFailed { path: PathBuf, stderr: String },

    #[error("git fetch failed in {path}: {stderr}")]
    FetchFailed { path: PathBuf, stderr: String },

    #[error("git rebase stopped on conflicts in {path}: {stderr}")]
    RebaseConflict { path: PathBuf, stderr: String },

    #[error("Working tree has local changes: {path}")]
    DirtyTree { path: PathBuf },

    #[error("Not a git repository: {path}")]
    NotARepo { path: PathBuf },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("git {context} failed: {stderr}")]
    OperationFailed { context: String, stderr: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check if a path is a git repository
pub fn is_git_repo<P: AsRef<Path>>(path: P) -> bool {
    Repository::open(path.as_ref()).is_ok()
}

/// Open a git repository at the given path
pub fn open_repo<P: AsRef<Path>>(path: P) -> Result<Repository, GitError> {
    Repository::open(path.as_ref()).map_err(|_| GitError::NotARepo {
        path: path.as_ref().to_path_buf(),
    })
}

/// Get the currently checked-out branch, or `None` on a detached HEAD.
pub fn current_branch(path: &Path) -> Result<Option<String>, GitError> {
    let repo = open_repo(path)?;
    let head = repo.head()?;
    if head.is_branch() {
        Ok(head.shorthand().map(str::to_string))
    } else {
        Ok(None)
    }
}

/// Run git in `dir`, capturing output. Only spawn failures are errors here;
/// non-zero exits are the caller's to classify.
fn run_git(dir: &Path, args: &[&str]) -> Result<std::process::Output, GitError> {
    let mut cmd = Command::new("git");
    cmd.args(args).current_dir(dir);
    log_cmd(&cmd);
    Ok(cmd.output()?)
}

fn stderr_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Clone a repository, optionally shallow.
pub fn clone(url: &str, target: &Path, depth: Option<u32>) -> Result<(), GitError> {
    let mut cmd = Command::new("git");
    cmd.arg("clone");
    let depth_arg;
    if let Some(d) = depth {
        depth_arg = format!("--depth={}", d);
        cmd.arg(&depth_arg);
    }
    cmd.arg(url).arg(target);
    log_cmd(&cmd);
    let output = cmd.output()?;
    if !output.status.success() {
        return Err(GitError::CloneFailed {
            url: url.to_string(),
            stderr: stderr_of(&output),
        });
    }
    Ok(())
}

/// Fetch from origin, including tags.
pub fn fetch(path: &Path) -> Result<(), GitError> {
    let output = run_git(path, &["fetch", "--tags", "origin"])?;
    if !output.status.success() {
        return Err(GitError::FetchFailed {
            path: path.to_path_buf(),
            stderr: stderr_of(&output),
        });
    }
    Ok(())
}

/// Fast-forward pull on the current branch.
pub fn pull(path: &Path) -> Result<(), GitError> {
    let output = run_git(path, &["pull", "--ff-only"])?;
    if !output.status.success() {
        return Err(GitError::PullFailed {
            path: path.to_path_buf(),
            stderr: stderr_of(&output),
        });
    }
    Ok(())
}

/// Pull with rebase on the current branch.
pub fn pull_rebase(path: &Path) -> Result<(), GitError> {
    let output = run_git(path, &["pull", "--rebase"])?;
    if !output.status.success() {
        return Err(GitError::RebaseConflict {
            path: path.to_path_buf(),
            stderr: stderr_of(&output),
        });
    }
    Ok(())
}

/// Checkout a revision verbatim: branch, tag, or SHA. A detached HEAD is
/// fine. When git cannot tell branch from tag, whatever `git checkout`
/// prefers wins.
pub fn checkout(path: &Path, revision: &str) -> Result<(), GitError> {
    let output = run_git(path, &["checkout", revision])?;
    if !output.status.success() {
        return Err(GitError::CheckoutFailed {
            path: path.to_path_buf(),
            revision: revision.to_string(),
            stderr: stderr_of(&output),
        });
    }
    Ok(())
}

/// Initialize and update submodules recursively.
pub fn submodule_update(path: &Path) -> Result<(), GitError> {
    let output = run_git(path, &["submodule", "update", "--init", "--recursive"])?;
    if !output.status.success() {
        return Err(GitError::OperationFailed {
            context: "submodule update".to_string(),
            stderr: stderr_of(&output),
        });
    }
    Ok(())
}

/// URL of the `origin` remote, if configured.
pub fn remote_url(path: &Path) -> Result<Option<String>, GitError> {
    let output = run_git(path, &["remote", "get-url", "origin"])?;
    if output.status.success() {
        Ok(Some(stdout_of(&output)))
    } else {
        Ok(None)
    }
}

/// Full commit SHA of HEAD.
pub fn rev_parse_head(path: &Path) -> Result<String, GitError> {
    let output = run_git(path, &["rev-parse", "HEAD"])?;
    if !output.status.success() {
        return Err(GitError::OperationFailed {
            context: "rev-parse HEAD".to_string(),
            stderr: stderr_of(&output),
        });
    }
    Ok(stdout_of(&output))
}

/// Tags pointing at HEAD, used for frozen-manifest lookup.
pub fn tags_at_head(path: &Path) -> Result<Vec<String>, GitError> {
    let output = run_git(path, &["tag", "--points-at", "HEAD"])?;
    if !output.status.success() {
        return Err(GitError::OperationFailed {
            context: "tag --points-at".to_string(),
            stderr: stderr_of(&output),
        });
    }
    Ok(stdout_of(&output)
        .lines()
        .map(str::to_string)
        .filter(|l| !l.is_empty())
        .collect())
}

/// True when neither the index nor the working tree has changes
/// (untracked files count as changes).
pub fn is_clean(path: &Path) -> Result<bool, GitError> {
    Ok(porcelain_status(path)?.is_empty())
}

pub fn has_untracked(path: &Path) -> Result<bool, GitError> {
    Ok(porcelain_status(path)?
        .iter()
        .any(|(index, worktree, _)| *index == '?' && *worktree == '?'))
}

pub fn has_staged(path: &Path) -> Result<bool, GitError> {
    Ok(porcelain_status(path)?
        .iter()
        .any(|(index, _, _)| matches!(index, 'A' | 'M' | 'D' | 'R' | 'C' | 'T')))
}

/// True when any local branch has commits missing from its upstream, or has
/// no upstream at all while carrying commits.
pub fn has_unpushed(path: &Path) -> Result<bool, GitError> {
    let output = run_git(
        path,
        &[
            "for-each-ref",
            "--format=%(refname:short) %(upstream:short)",
            "refs/heads",
        ],
    )?;
    if !output.status.success() {
        return Err(GitError::OperationFailed {
            context: "for-each-ref".to_string(),
            stderr: stderr_of(&output),
        });
    }

    for line in stdout_of(&output).lines() {
        let mut parts = line.split_whitespace();
        let branch = match parts.next() {
            Some(b) => b,
            None => continue,
        };
        match parts.next() {
            Some(upstream) => {
                let range = format!("{}..{}", upstream, branch);
                let count = run_git(path, &["rev-list", "--count", &range])?;
                if count.status.success() && stdout_of(&count).parse::<u64>().unwrap_or(0) > 0 {
                    return Ok(true);
                }
            }
            // A branch without any upstream cannot have been pushed.
            None => return Ok(true),
        }
    }
    Ok(false)
}

pub fn has_stash(path: &Path) -> Result<bool, GitError> {
    let output = run_git(path, &["stash", "list"])?;
    if !output.status.success() {
        return Err(GitError::OperationFailed {
            context: "stash list".to_string(),
            stderr: stderr_of(&output),
        });
    }
    Ok(!stdout_of(&output).is_empty())
}

/// Stage files and commit them.
pub fn add_and_commit(path: &Path, files: &[&str], message: &str) -> Result<(), GitError> {
    let mut args = vec!["add", "--"];
    args.extend_from_slice(files);
    let output = run_git(path, &args)?;
    if !output.status.success() {
        return Err(GitError::OperationFailed {
            context: "add".to_string(),
            stderr: stderr_of(&output),
        });
    }

    let output = run_git(path, &["commit", "-m", message])?;
    if !output.status.success() {
        return Err(GitError::OperationFailed {
            context: "commit".to_string(),
            stderr: stderr_of(&output),
        });
    }
    Ok(())
}

/// Create an annotated tag.
pub fn create_tag(path: &Path, name: &str, message: &str) -> Result<(), GitError> {
    let output = run_git(path, &["tag", "-a", name, "-m", message])?;
    if !output.status.success() {
        return Err(GitError::OperationFailed {
            context: format!("tag {}", name),
            stderr: stderr_of(&output),
        });
    }
    Ok(())
}

/// Run an arbitrary git invocation and return its combined output. Used by
/// the foreach-family commands; the exit status travels with the result.
pub struct CapturedGit {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub fn run_captured(path: &Path, args: &[String]) -> Result<CapturedGit, GitError> {
    let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
    let output = run_git(path, &arg_refs)?;
    Ok(CapturedGit {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Parse `git status --porcelain=v1` into (index, worktree, path) tuples.
fn porcelain_status(path: &Path) -> Result<Vec<(char, char, String)>, GitError> {
    let output = run_git(path, &["status", "--porcelain=v1"])?;
    if !output.status.success() {
        return Err(GitError::OperationFailed {
            context: "status".to_string(),
            stderr: stderr_of(&output),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut entries = Vec::new();
    for line in stdout.lines() {
        if line.len() < 3 {
            continue;
        }
        let mut chars = line.chars();
        let index = chars.next().unwrap_or(' ');
        let worktree = chars.next().unwrap_or(' ');
        entries.push((index, worktree, line[3..].to_string()));
    }
    Ok(entries)
}
