//! Test fixtures for creating workspace environments.
//!
//! Provides a `WorkspaceBuilder` pattern for creating temporary workspaces
//! with configurable bare remotes and manifest files -- all offline via
//! `file://` URLs.
//!
//! Bare remotes are created without a `.git` suffix so that sibling URL
//! derivation (`../name`) resolves to them directly.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use git_ws::cli::WorkspaceContext;
use git_ws::core::workspace::{Workspace, WorkspaceConfig};

use super::git_helpers;

/// A test workspace with temporary directories that are cleaned up on drop.
pub struct WorkspaceFixture {
    /// Keeps the temp tree alive for the lifetime of the fixture.
    pub _temp: TempDir,
    /// Workspace root (contains .git-ws/ and the clones).
    pub root: PathBuf,
    /// Directory holding the bare remotes.
    pub remotes_dir: PathBuf,
}

impl WorkspaceFixture {
    /// `file://` URL of a bare remote.
    pub fn remote_url(&self, name: &str) -> String {
        format!("file://{}", self.remotes_dir.join(name).display())
    }

    /// Path of a project clone inside the workspace.
    pub fn project_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Path of the main project clone.
    pub fn main_dir(&self) -> PathBuf {
        self.project_path("app")
    }

    /// Build a quiet command context over this workspace.
    pub fn context(&self) -> WorkspaceContext {
        WorkspaceContext {
            workspace: Workspace::find(&self.root).expect("fixture workspace should open"),
            quiet: true,
            verbose: false,
        }
    }

    /// Overwrite the main project's manifest in the working tree.
    pub fn write_main_manifest(&self, content: &str) {
        std::fs::write(self.main_dir().join("git-ws.toml"), content).unwrap();
    }

    /// Push a new commit to a bare remote through a scratch clone.
    pub fn push_commit(&self, name: &str, file: &str, content: &str) {
        let scratch = self._temp.path().join(format!("scratch-{}", name));
        if scratch.exists() {
            std::fs::remove_dir_all(&scratch).unwrap();
        }
        git_helpers::clone_repo(&self.remote_url(name), &scratch);
        git_helpers::git(&scratch, &["config", "user.email", "test@example.com"]);
        git_helpers::git(&scratch, &["config", "user.name", "Test User"]);
        git_helpers::commit_file(&scratch, file, content, &format!("Update {}", file));
        git_helpers::git(&scratch, &["push", "origin", "main"]);
    }

    /// Create a tag on a bare remote through a scratch clone.
    pub fn tag_remote(&self, name: &str, tag: &str) {
        let scratch = self._temp.path().join(format!("scratch-tag-{}", name));
        if scratch.exists() {
            std::fs::remove_dir_all(&scratch).unwrap();
        }
        git_helpers::clone_repo(&self.remote_url(name), &scratch);
        git_helpers::git(&scratch, &["config", "user.email", "test@example.com"]);
        git_helpers::git(&scratch, &["config", "user.name", "Test User"]);
        git_helpers::git(&scratch, &["tag", "-a", tag, "-m", tag]);
        git_helpers::git(&scratch, &["push", "origin", "--tags"]);
    }
}

struct RemoteSpec {
    name: String,
    /// Manifest committed as git-ws.toml, when the repo has one.
    manifest: Option<String>,
    files: Vec<(String, String)>,
}

/// Builder for creating test workspaces.
pub struct WorkspaceBuilder {
    main_manifest: String,
    remotes: Vec<RemoteSpec>,
    group_filters: Vec<String>,
    clone_depth: Option<u32>,
}

impl WorkspaceBuilder {
    pub fn new() -> Self {
        Self {
            main_manifest: "version = 1\n".to_string(),
            remotes: Vec::new(),
            group_filters: Vec::new(),
            clone_depth: None,
        }
    }

    /// Manifest of the main project (`app`).
    pub fn main_manifest(mut self, toml: &str) -> Self {
        self.main_manifest = toml.to_string();
        self
    }

    /// Add a bare remote for a dependency, optionally with its own manifest.
    pub fn add_remote(mut self, name: &str, manifest: Option<&str>) -> Self {
        self.remotes.push(RemoteSpec {
            name: name.to_string(),
            manifest: manifest.map(str::to_string),
            files: vec![("README.md".to_string(), format!("# {}\n", name))],
        });
        self
    }

    /// Add a bare remote with an extra committed file.
    pub fn add_remote_with_file(mut self, name: &str, file: &str, content: &str) -> Self {
        self.remotes.push(RemoteSpec {
            name: name.to_string(),
            manifest: None,
            files: vec![
                ("README.md".to_string(), format!("# {}\n", name)),
                (file.to_string(), content.to_string()),
            ],
        });
        self
    }

    /// Group filters stored in the workspace config at init time.
    pub fn group_filters(mut self, filters: &[&str]) -> Self {
        self.group_filters = filters.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn build(self) -> WorkspaceFixture {
        let temp = TempDir::new().unwrap();
        let remotes_dir = temp.path().join("remotes");
        std::fs::create_dir_all(&remotes_dir).unwrap();

        make_remote(
            temp.path(),
            &remotes_dir,
            "app",
            &[
                ("README.md".to_string(), "# app\n".to_string()),
                ("git-ws.toml".to_string(), self.main_manifest.clone()),
            ],
        );
        for remote in &self.remotes {
            let mut files = remote.files.clone();
            if let Some(ref manifest) = remote.manifest {
                files.push(("git-ws.toml".to_string(), manifest.clone()));
            }
            make_remote(temp.path(), &remotes_dir, &remote.name, &files);
        }

        let root = temp.path().join("ws");
        std::fs::create_dir_all(&root).unwrap();
        let app_url = format!("file://{}", remotes_dir.join("app").display());
        git_helpers::clone_repo(&app_url, &root.join("app"));
        git_helpers::git(&root.join("app"), &["config", "user.email", "test@example.com"]);
        git_helpers::git(&root.join("app"), &["config", "user.name", "Test User"]);

        let mut config = WorkspaceConfig::new("app", "git-ws.toml");
        config.group_filters = self.group_filters.clone();
        config.clone_depth = self.clone_depth;
        Workspace::init(&root, config).unwrap();

        WorkspaceFixture {
            _temp: temp,
            root,
            remotes_dir,
        }
    }
}

/// Create a bare remote seeded with the given files on branch `main`.
fn make_remote(temp: &Path, remotes_dir: &Path, name: &str, files: &[(String, String)]) {
    let bare = remotes_dir.join(name);
    std::fs::create_dir_all(&bare).unwrap();
    git_helpers::git(remotes_dir, &["init", "--bare", "-b", "main", name]);

    let staging = temp.join(format!("staging-{}", name));
    git_helpers::init_repo(&staging);
    for (file, content) in files {
        git_helpers::commit_file(&staging, file, content, &format!("Add {}", file));
    }
    git_helpers::git(
        &staging,
        &[
            "remote",
            "add",
            "origin",
            &format!("file://{}", bare.display()),
        ],
    );
    git_helpers::git(&staging, &["push", "-u", "origin", "main"]);
}
