//! Git helpers for integration tests.
//!
//! Thin wrappers around the `git` binary; every helper panics with the
//! captured stderr on failure so test output points at the real problem.

use std::path::Path;
use std::process::Command;

/// Run git with the given args in `dir`, panicking on failure.
pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {:?}: {}", args, e));
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Run git and return trimmed stdout.
pub fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("failed to run git {:?}: {}", args, e));
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Initialize a non-bare repo with an identity configured.
pub fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "-b", "main"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test User"]);
}

/// Write a file and commit it.
pub fn commit_file(dir: &Path, name: &str, content: &str, message: &str) {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    git(dir, &["add", name]);
    git(dir, &["commit", "-m", message]);
}

/// Clone a repo.
pub fn clone_repo(url: &str, dest: &Path) {
    let output = Command::new("git")
        .args(["clone", url, dest.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git clone {} failed: {}",
        url,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Current branch name, or "HEAD" when detached.
pub fn current_branch(dir: &Path) -> String {
    git_stdout(dir, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Full SHA of HEAD.
pub fn head_sha(dir: &Path) -> String {
    git_stdout(dir, &["rev-parse", "HEAD"])
}
