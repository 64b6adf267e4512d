//! Manifest transformations
//!
//! `resolve` flattens a recursive manifest graph into a single
//! self-contained manifest; `freeze` additionally pins every revision to the
//! commit SHA currently checked out in the workspace.

use std::path::Path;

use thiserror::Error;

use crate::core::manifest::{Defaults, ManifestSpec, ProjectSpec, CURRENT_VERSION};
use crate::core::resolver::ResolvedSet;
use crate::git::{self, GitError};

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("Project '{project}' is not cloned at {path}; run update first")]
    NotCloned { project: String, path: String },

    #[error(transparent)]
    Git(#[from] GitError),
}

/// Emit a single manifest whose dependencies are all resolved non-main
/// projects in BFS order, each with an absolute URL. Defaults are empty and
/// the effective group-filter list is flattened in.
pub fn resolve_manifest(set: &ResolvedSet) -> ManifestSpec {
    ManifestSpec {
        version: CURRENT_VERSION,
        group_filters: set.filters.flattened(),
        remotes: Vec::new(),
        defaults: Defaults::default(),
        dependencies: set.non_main().map(project_to_spec).collect(),
        linkfiles: set.main().map(|m| m.linkfiles.clone()).unwrap_or_default(),
        copyfiles: set.main().map(|m| m.copyfiles.clone()).unwrap_or_default(),
        extra: toml::Table::new(),
    }
}

/// Like [`resolve_manifest`], but every dependency's revision is overwritten
/// with the commit SHA of its clone. Fails if any project is not yet cloned.
pub fn freeze_manifest(
    set: &ResolvedSet,
    workspace_root: &Path,
) -> Result<ManifestSpec, TransformError> {
    let mut manifest = resolve_manifest(set);
    for (project, dep) in set.non_main().zip(manifest.dependencies.iter_mut()) {
        let clone_dir = project.abs_path(workspace_root);
        if !git::is_git_repo(&clone_dir) {
            return Err(TransformError::NotCloned {
                project: project.name.clone(),
                path: project.path.clone(),
            });
        }
        dep.revision = Some(git::rev_parse_head(&clone_dir)?);
    }
    Ok(manifest)
}

fn project_to_spec(project: &crate::core::project::Project) -> ProjectSpec {
    ProjectSpec {
        name: project.name.clone(),
        remote: None,
        sub_url: None,
        url: Some(project.url.clone()),
        revision: project.revision.clone(),
        path: Some(project.path.clone()),
        manifest_path: if project.manifest_path == crate::core::manifest::MANIFEST_FILE {
            None
        } else {
            Some(project.manifest_path.clone())
        },
        groups: project.groups.clone(),
        with_groups: project.with_groups.clone(),
        submodules: if project.submodules { None } else { Some(false) },
        linkfiles: project.linkfiles.clone(),
        copyfiles: project.copyfiles.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::group_filter::GroupFilters;
    use crate::core::project::Project;

    fn sample_set() -> ResolvedSet {
        let main = Project {
            name: "app".to_string(),
            path: "app".to_string(),
            url: "https://example.com/app".to_string(),
            is_main: true,
            ..Project::default()
        };
        let lib = Project {
            name: "lib".to_string(),
            path: "lib".to_string(),
            level: 1,
            url: "https://example.com/lib".to_string(),
            revision: Some("v1.0".to_string()),
            groups: vec!["dev".to_string()],
            ..Project::default()
        };
        ResolvedSet {
            projects: vec![main, lib],
            diagnostics: Vec::new(),
            edges: Vec::new(),
            filters: GroupFilters::new(),
        }
    }

    #[test]
    fn test_resolve_flattens_to_absolute_urls() {
        let manifest = resolve_manifest(&sample_set());
        assert_eq!(manifest.dependencies.len(), 1);
        let dep = &manifest.dependencies[0];
        assert_eq!(dep.url.as_deref(), Some("https://example.com/lib"));
        assert_eq!(dep.revision.as_deref(), Some("v1.0"));
        assert_eq!(dep.path.as_deref(), Some("lib"));
        assert_eq!(dep.groups, vec!["dev"]);
        assert!(manifest.remotes.is_empty());
        assert!(manifest.defaults.is_empty());
    }

    #[test]
    fn test_resolved_manifest_validates() {
        let manifest = resolve_manifest(&sample_set());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_freeze_requires_clones() {
        let temp = tempfile::TempDir::new().unwrap();
        let result = freeze_manifest(&sample_set(), temp.path());
        assert!(matches!(result, Err(TransformError::NotCloned { .. })));
    }
}
