//! Resolved project records

use std::path::{Path, PathBuf};

use crate::core::manifest::{FileRef, MANIFEST_FILE};

/// A concrete project produced by the resolver.
///
/// Unlike a `ProjectSpec`, every field here is effective: defaults have been
/// merged, the URL is absolute, and the path is normalized and unique within
/// the resolved set.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    /// Project name (from the declaring manifest).
    pub name: String,
    /// Workspace-relative clone directory, normalized with forward slashes.
    pub path: String,
    /// BFS depth; the main project is level 0.
    pub level: usize,
    /// Absolute Git URL. Empty for a main project without a remote.
    pub url: String,
    /// Branch, tag, or commit SHA to materialize. `None` leaves the clone
    /// on whatever branch is checked out.
    pub revision: Option<String>,
    pub groups: Vec<String>,
    pub with_groups: Vec<String>,
    /// Whether to run `submodule update` after syncing.
    pub submodules: bool,
    pub linkfiles: Vec<FileRef>,
    pub copyfiles: Vec<FileRef>,
    /// Manifest location inside the clone, relative to `path`.
    pub manifest_path: String,
    pub is_main: bool,
}

impl Project {
    /// Absolute clone directory.
    pub fn abs_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(&self.path)
    }

    /// Absolute path of this project's manifest file, whether or not it
    /// exists on disk.
    pub fn manifest_file(&self, workspace_root: &Path) -> PathBuf {
        self.abs_path(workspace_root).join(&self.manifest_path)
    }

    /// Role label used in diagnostic banners.
    pub fn role(&self) -> &'static str {
        if self.is_main {
            "MAIN"
        } else {
            "dependency"
        }
    }
}

impl Default for Project {
    fn default() -> Self {
        Project {
            name: String::new(),
            path: String::new(),
            level: 0,
            url: String::new(),
            revision: None,
            groups: Vec::new(),
            with_groups: Vec::new(),
            submodules: true,
            linkfiles: Vec::new(),
            copyfiles: Vec::new(),
            manifest_path: MANIFEST_FILE.to_string(),
            is_main: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let project = Project {
            name: "lib".to_string(),
            path: "libs/lib".to_string(),
            ..Project::default()
        };
        let root = Path::new("/ws");
        assert_eq!(project.abs_path(root), PathBuf::from("/ws/libs/lib"));
        assert_eq!(
            project.manifest_file(root),
            PathBuf::from("/ws/libs/lib/git-ws.toml")
        );
    }

    #[test]
    fn test_role() {
        let main = Project {
            is_main: true,
            ..Project::default()
        };
        assert_eq!(main.role(), "MAIN");
        assert_eq!(Project::default().role(), "dependency");
    }
}
