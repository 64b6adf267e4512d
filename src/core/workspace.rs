//! Workspace metadata store
//!
//! A workspace is any directory containing a `.git-ws/` folder. The store
//! persists the main project location, manifest path, chosen group filters,
//! and shallow clone depth in `config.toml`, plus materializer bookkeeping
//! (tracked clones, copy-file hashes) in `state.toml`. Every command reloads
//! this state from disk; nothing is cached across invocations.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::manifest::MANIFEST_FILE;

/// Metadata directory name under the workspace root.
pub const INFO_DIR: &str = ".git-ws";

const CONFIG_FILE: &str = "config.toml";
const STATE_FILE: &str = "state.toml";
const LOCK_FILE: &str = "lock";

/// Subdirectory of frozen tag manifests, inside the main project.
pub const FROZEN_DIR: &str = ".git-ws/manifests";

#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("No workspace found at or above {start} (missing {INFO_DIR}/)")]
    NotFound { start: PathBuf },

    #[error("Workspace already initialized at {root}")]
    AlreadyInitialized { root: PathBuf },

    #[error("Target exists but is not a Git clone: {path}")]
    NotAGitClone { path: PathBuf },

    #[error("Path is outside the workspace: {path}")]
    PathOutsideWorkspace { path: String },

    #[error("Refusing to {action}; pass --force to override")]
    ForceRequired { action: String },

    #[error("Refusing to prune {path}: {reason}")]
    PruneRefused { path: String, reason: PruneReason },

    #[error("Copy destination was modified since last update: {dest}")]
    CopyFileModified { dest: String },

    #[error("Failed to read workspace metadata: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid workspace metadata: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to write workspace metadata: {0}")]
    Emit(#[from] toml::ser::Error),
}

/// Why a prune candidate was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneReason {
    Untracked,
    Staged,
    Unpushed,
    Stashed,
}

impl fmt::Display for PruneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PruneReason::Untracked => write!(f, "untracked files present"),
            PruneReason::Staged => write!(f, "staged changes present"),
            PruneReason::Unpushed => write!(f, "unpushed commits present"),
            PruneReason::Stashed => write!(f, "stash entries present"),
        }
    }
}

/// Persisted workspace configuration (`.git-ws/config.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WorkspaceConfig {
    /// Main project path relative to the workspace root; empty for a
    /// main-less workspace.
    pub main_path: String,
    /// Manifest path relative to the main project (or the workspace root
    /// when main-less).
    pub manifest_path: String,
    /// Group filters chosen at init/clone time.
    pub group_filters: Vec<String>,
    /// Shallow clone depth.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_depth: Option<u32>,
}

impl WorkspaceConfig {
    pub fn new(main_path: &str, manifest_path: &str) -> WorkspaceConfig {
        WorkspaceConfig {
            main_path: main_path.to_string(),
            manifest_path: if manifest_path.is_empty() {
                MANIFEST_FILE.to_string()
            } else {
                manifest_path.to_string()
            },
            group_filters: Vec::new(),
            clone_depth: None,
        }
    }
}

/// Materializer bookkeeping (`.git-ws/state.toml`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WorkspaceState {
    /// Workspace-relative paths last materialized as clones. Prune
    /// candidates are tracked paths that left the resolved set.
    pub tracked_paths: Vec<String>,
    /// Copy destinations mapped to the sha256 of the content written at the
    /// last update, for modification detection.
    pub copyfile_hashes: BTreeMap<String, String>,
}

/// An open workspace: root directory plus loaded configuration.
#[derive(Debug)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: WorkspaceConfig,
}

impl Workspace {
    /// Walk upward from `start` until a directory containing `.git-ws/` is
    /// found.
    pub fn find(start: &Path) -> Result<Workspace, WorkspaceError> {
        let mut dir = start.to_path_buf();
        loop {
            if dir.join(INFO_DIR).is_dir() {
                return Workspace::open(&dir);
            }
            if !dir.pop() {
                return Err(WorkspaceError::NotFound {
                    start: start.to_path_buf(),
                });
            }
        }
    }

    /// Open a workspace whose root is already known.
    pub fn open(root: &Path) -> Result<Workspace, WorkspaceError> {
        let config_path = root.join(INFO_DIR).join(CONFIG_FILE);
        let content = std::fs::read_to_string(&config_path)?;
        let config: WorkspaceConfig = toml::from_str(&content)?;
        Ok(Workspace {
            root: root.to_path_buf(),
            config,
        })
    }

    /// Create `.git-ws/` and persist the initial configuration.
    pub fn init(root: &Path, config: WorkspaceConfig) -> Result<Workspace, WorkspaceError> {
        let info_dir = root.join(INFO_DIR);
        if info_dir.exists() {
            return Err(WorkspaceError::AlreadyInitialized {
                root: root.to_path_buf(),
            });
        }
        std::fs::create_dir_all(&info_dir)?;
        let workspace = Workspace {
            root: root.to_path_buf(),
            config,
        };
        workspace.save_config()?;
        Ok(workspace)
    }

    /// Delete `.git-ws/`, leaving clones in place.
    pub fn deinit(self) -> Result<(), WorkspaceError> {
        std::fs::remove_dir_all(self.root.join(INFO_DIR))?;
        Ok(())
    }

    pub fn info_dir(&self) -> PathBuf {
        self.root.join(INFO_DIR)
    }

    /// Main project directory, when the workspace has one.
    pub fn main_dir(&self) -> Option<PathBuf> {
        if self.config.main_path.is_empty() {
            None
        } else {
            Some(self.root.join(&self.config.main_path))
        }
    }

    /// Path of the live manifest file.
    pub fn manifest_file(&self) -> PathBuf {
        match self.main_dir() {
            Some(main) => main.join(&self.config.manifest_path),
            None => self.root.join(&self.config.manifest_path),
        }
    }

    /// Directory of frozen tag manifests inside the main project.
    pub fn frozen_manifest_dir(&self) -> Option<PathBuf> {
        self.main_dir().map(|main| main.join(FROZEN_DIR))
    }

    pub fn save_config(&self) -> Result<(), WorkspaceError> {
        let content = toml::to_string_pretty(&self.config)?;
        atomic_write(&self.info_dir().join(CONFIG_FILE), &content)?;
        Ok(())
    }

    pub fn load_state(&self) -> Result<WorkspaceState, WorkspaceError> {
        let path = self.info_dir().join(STATE_FILE);
        if !path.exists() {
            return Ok(WorkspaceState::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save_state(&self, state: &WorkspaceState) -> Result<(), WorkspaceError> {
        let content = toml::to_string_pretty(state)?;
        atomic_write(&self.info_dir().join(STATE_FILE), &content)?;
        Ok(())
    }

    /// Take the workspace lock for a mutating command. Blocks until the
    /// lock is available.
    pub fn lock_exclusive(&self) -> Result<WorkspaceLock, WorkspaceError> {
        let file = self.open_lock_file()?;
        file.lock_exclusive()?;
        Ok(WorkspaceLock { file })
    }

    /// Take the shared lock for a read-only command.
    pub fn lock_shared(&self) -> Result<WorkspaceLock, WorkspaceError> {
        let file = self.open_lock_file()?;
        file.lock_shared()?;
        Ok(WorkspaceLock { file })
    }

    fn open_lock_file(&self) -> Result<File, WorkspaceError> {
        Ok(OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.info_dir().join(LOCK_FILE))?)
    }

    /// Check that a workspace-relative path stays inside the workspace.
    pub fn check_inside(&self, rel: &str) -> Result<(), WorkspaceError> {
        if crate::core::manifest::path_escapes_boundary(rel) {
            return Err(WorkspaceError::PathOutsideWorkspace {
                path: rel.to_string(),
            });
        }
        Ok(())
    }
}

/// Advisory lock on the workspace metadata, released on drop.
pub struct WorkspaceLock {
    file: File,
}

impl Drop for WorkspaceLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn atomic_write(path: &Path, content: &str) -> Result<(), std::io::Error> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
