//! File operations
//!
//! Creates the link and copy files a project declares, after its clone has
//! been synced. Only the main project's and first-level dependencies' file
//! refs are materialized; deeper declarations are ignored by the caller.
//!
//! Copy destinations are guarded against clobbering local edits: the sha256
//! of the content written at the last update is recorded in the workspace
//! state, and a destination whose current hash differs is refused unless
//! forced.

use sha2::{Digest, Sha256};
use std::path::Path;

use crate::core::group_filter::GroupFilters;
use crate::core::manifest::path_escapes_boundary;
use crate::core::project::Project;
use crate::core::workspace::{WorkspaceError, WorkspaceState};

/// Outcome of materializing one project's file refs.
#[derive(Debug, Default)]
pub struct FileOpReport {
    pub linked: usize,
    pub copied: usize,
    pub skipped: usize,
    pub warnings: Vec<String>,
}

/// Create the link and copy files of one project.
///
/// File refs with groups go through the same selection predicate as
/// projects, evaluated at the project's path with its `with-groups` applied.
pub fn apply_file_refs(
    workspace_root: &Path,
    project: &Project,
    filters: &GroupFilters,
    state: &mut WorkspaceState,
    force: bool,
) -> Result<FileOpReport, WorkspaceError> {
    let mut report = FileOpReport::default();
    let filters = filters.with_inherited(&project.with_groups);
    let project_dir = project.abs_path(workspace_root);

    for link in &project.linkfiles {
        if !filters.is_selected(&link.groups, &project.path, false).selected {
            report.skipped += 1;
            continue;
        }
        if let Err(msg) = check_ref_paths(&link.src, &link.dest) {
            report.warnings.push(msg);
            continue;
        }
        let src = project_dir.join(&link.src);
        let dest = workspace_root.join(&link.dest);
        match create_link(&src, &dest) {
            Ok(()) => report.linked += 1,
            Err(e) => report.warnings.push(format!(
                "linkfile {} -> {}: {}",
                link.src, link.dest, e
            )),
        }
    }

    for copy in &project.copyfiles {
        if !filters.is_selected(&copy.groups, &project.path, false).selected {
            report.skipped += 1;
            continue;
        }
        if let Err(msg) = check_ref_paths(&copy.src, &copy.dest) {
            report.warnings.push(msg);
            continue;
        }
        let src = project_dir.join(&copy.src);
        let dest = workspace_root.join(&copy.dest);

        copy_guarded(&src, &dest, &copy.dest, state, force)?;
        report.copied += 1;
    }

    Ok(report)
}

fn check_ref_paths(src: &str, dest: &str) -> Result<(), String> {
    for path in [src, dest] {
        if path_escapes_boundary(path) {
            return Err(format!("path escapes workspace boundary: {}", path));
        }
    }
    Ok(())
}

/// Copy `src` to `dest` unless the destination carries local modifications.
fn copy_guarded(
    src: &Path,
    dest: &Path,
    dest_key: &str,
    state: &mut WorkspaceState,
    force: bool,
) -> Result<(), WorkspaceError> {
    let content = std::fs::read(src)?;

    if dest.exists() && !force {
        let current = hash_bytes(&std::fs::read(dest)?);
        match state.copyfile_hashes.get(dest_key) {
            // Destination changed since we last wrote it.
            Some(recorded) if *recorded != current => {
                return Err(WorkspaceError::CopyFileModified {
                    dest: dest_key.to_string(),
                });
            }
            // Destination exists but was never written by us.
            None if current != hash_bytes(&content) => {
                return Err(WorkspaceError::CopyFileModified {
                    dest: dest_key.to_string(),
                });
            }
            _ => {}
        }
    }

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, &content)?;
    state
        .copyfile_hashes
        .insert(dest_key.to_string(), hash_bytes(&content));
    Ok(())
}

fn create_link(src: &Path, dest: &Path) -> Result<(), std::io::Error> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    // Replace an existing link so repeated updates stay idempotent.
    if dest.symlink_metadata().is_ok() {
        std::fs::remove_file(dest)?;
    }
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(src, dest)
    }
    #[cfg(windows)]
    {
        std::os::windows::fs::symlink_file(src, dest)
    }
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
