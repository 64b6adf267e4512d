//! Workspace context passed to command handlers
//!
//! Bundles the discovered workspace and global CLI flags into a single
//! struct, eliminating repetitive parameter passing across command handlers.

use crate::core::resolver::{self, ResolveRequest, ResolvedSet};
use crate::core::workspace::Workspace;
use crate::git;

/// Workspace context available to all command handlers.
///
/// Created once in `main()` after workspace discovery, then passed by
/// reference to every command that needs workspace state.
pub struct WorkspaceContext {
    pub workspace: Workspace,
    /// Suppress non-essential output (`--quiet`)
    pub quiet: bool,
    /// Show verbose output (`--verbose`)
    pub verbose: bool,
}

impl WorkspaceContext {
    /// Run the resolver against this workspace.
    ///
    /// `manifest_override` replaces the configured manifest path;
    /// `extra_filters` replaces the stored group filters when non-empty.
    pub fn resolve(
        &self,
        manifest_override: Option<&str>,
        extra_filters: &[String],
    ) -> anyhow::Result<ResolvedSet> {
        let config = &self.workspace.config;

        let main_path = if config.main_path.is_empty() {
            None
        } else {
            Some(config.main_path.as_str())
        };
        let main_url = match self.workspace.main_dir() {
            Some(dir) if git::is_git_repo(&dir) => git::remote_url(&dir)?,
            _ => None,
        };

        let filters = if extra_filters.is_empty() {
            config.group_filters.clone()
        } else {
            extra_filters.to_vec()
        };

        let set = resolver::resolve(&ResolveRequest {
            workspace_root: &self.workspace.root,
            main_path,
            main_url,
            manifest_path: manifest_override.unwrap_or(&config.manifest_path),
            command_line_filters: &filters,
        })?;
        Ok(set)
    }
}
