//! Project resolver
//!
//! Breadth-first traversal over the manifest graph, starting at the main
//! project. Every `ProjectSpec` is materialized into a concrete [`Project`]
//! with an absolute URL, a normalized workspace-relative path, and effective
//! defaults. Conflicts on the same path are settled first-wins: the earliest
//! BFS occurrence is authoritative, which guarantees that the main project's
//! direct dependencies override transitive ones.
//!
//! Duplicates and cycles are not errors; they surface as ordered diagnostics.

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::group_filter::{FilterError, FilterRule, GroupFilters};
use crate::core::manifest::{ManifestError, ManifestSpec, ProjectSpec, MANIFEST_FILE};
use crate::core::project::Project;
use crate::core::urls;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Invalid manifest at {path}: {source}")]
    NestedManifest {
        path: PathBuf,
        source: ManifestError,
    },

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Cannot resolve URL for '{project}': {detail}")]
    UrlResolutionFailed { project: String, detail: String },
}

/// Non-fatal observations made while resolving, in traversal order.
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticKind {
    /// A later `ProjectSpec` resolved to an already-taken path.
    Duplicate,
    /// The group filter deselected this dependency.
    FilteredOut,
    /// A kept dependency has no effective revision.
    MissingRevision,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Name of the dependency the diagnostic is about.
    pub project: String,
    /// Workspace-relative path the dependency resolved to.
    pub path: String,
    pub detail: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            DiagnosticKind::Duplicate => "duplicate",
            DiagnosticKind::FilteredOut => "filtered out",
            DiagnosticKind::MissingRevision => "no revision",
        };
        write!(f, "{} '{}' ({}): {}", label, self.project, self.path, self.detail)
    }
}

/// What happened to a dependency site during resolution.
#[derive(Debug, Clone)]
pub enum EdgeDecision {
    Kept,
    Duplicate,
    FilteredOut(Option<FilterRule>),
}

/// One dependency site in the traversal; the raw material for `dep-tree`.
#[derive(Debug, Clone)]
pub struct Edge {
    /// Path of the declaring project; `None` for the main project itself.
    pub parent: Option<String>,
    pub project: Project,
    pub decision: EdgeDecision,
}

/// Output of one resolver run.
#[derive(Debug, Clone)]
pub struct ResolvedSet {
    /// Kept projects in BFS order; the main project first when present.
    pub projects: Vec<Project>,
    pub diagnostics: Vec<Diagnostic>,
    /// Every dependency site visited, including dropped ones.
    pub edges: Vec<Edge>,
    /// The effective base filter list (manifest + command line).
    pub filters: GroupFilters,
}

impl ResolvedSet {
    pub fn main(&self) -> Option<&Project> {
        self.projects.first().filter(|p| p.is_main)
    }

    pub fn non_main(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter().filter(|p| !p.is_main)
    }

    pub fn by_path(&self, path: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.path == path)
    }
}

/// Inputs for one resolver run.
#[derive(Debug, Clone)]
pub struct ResolveRequest<'a> {
    pub workspace_root: &'a Path,
    /// Workspace-relative main project path; `None` for a main-less
    /// workspace.
    pub main_path: Option<&'a str>,
    /// Remote URL of the main project's clone, when one is known. Relative
    /// dependency URLs resolve against this.
    pub main_url: Option<String>,
    /// Manifest path relative to the main project (or to the workspace when
    /// main-less).
    pub manifest_path: &'a str,
    pub command_line_filters: &'a [String],
}

struct ExpandEntry {
    manifest: ManifestSpec,
    /// Absolute URL of the project whose manifest this is.
    containing_url: Option<String>,
    /// Level assigned to dependencies declared in this manifest.
    level: usize,
    filters: GroupFilters,
}

/// Run the breadth-first resolution described in the module docs.
pub fn resolve(req: &ResolveRequest) -> Result<ResolvedSet, ResolveError> {
    let main_manifest_file = match req.main_path {
        Some(main) => req.workspace_root.join(main).join(req.manifest_path),
        None => req.workspace_root.join(req.manifest_path),
    };
    let main_manifest = ManifestSpec::load(&main_manifest_file)?;

    let mut filters = GroupFilters::new();
    filters.set_manifest(&main_manifest.group_filters)?;
    filters.set_command_line(req.command_line_filters)?;

    let mut set = ResolvedSet {
        projects: Vec::new(),
        diagnostics: Vec::new(),
        edges: Vec::new(),
        filters: filters.clone(),
    };
    let mut taken: HashSet<String> = HashSet::new();

    if let Some(main_path) = req.main_path {
        let path = urls::normalize_rel_path(main_path);
        let name = path
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("main")
            .to_string();
        let main = Project {
            name,
            path: path.clone(),
            level: 0,
            url: req.main_url.clone().unwrap_or_default(),
            revision: None,
            submodules: true,
            linkfiles: main_manifest.linkfiles.clone(),
            copyfiles: main_manifest.copyfiles.clone(),
            manifest_path: req.manifest_path.to_string(),
            is_main: true,
            ..Project::default()
        };
        taken.insert(path);
        set.edges.push(Edge {
            parent: None,
            project: main.clone(),
            decision: EdgeDecision::Kept,
        });
        set.projects.push(main);
    }

    let mut queue: VecDeque<(Option<String>, ExpandEntry)> = VecDeque::new();
    queue.push_back((
        set.main().map(|p| p.path.clone()),
        ExpandEntry {
            manifest: main_manifest,
            containing_url: req.main_url.clone(),
            level: 1,
            filters,
        },
    ));

    while let Some((parent_path, entry)) = queue.pop_front() {
        for spec in &entry.manifest.dependencies {
            let merged = spec.with_defaults(&entry.manifest.defaults);
            let path = urls::normalize_rel_path(merged.path.as_deref().unwrap_or(&merged.name));
            let url = resolve_spec_url(&merged, &entry.manifest, entry.containing_url.as_deref())?;

            let project = Project {
                name: merged.name.clone(),
                path: path.clone(),
                level: entry.level,
                url: url.clone(),
                revision: merged.revision.clone(),
                groups: merged.groups.clone(),
                with_groups: merged.with_groups.clone(),
                submodules: merged.submodules.unwrap_or(true),
                linkfiles: merged.linkfiles.clone(),
                copyfiles: merged.copyfiles.clone(),
                manifest_path: merged
                    .manifest_path
                    .clone()
                    .unwrap_or_else(|| MANIFEST_FILE.to_string()),
                is_main: false,
            };

            if taken.contains(&path) {
                set.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::Duplicate,
                    project: merged.name.clone(),
                    path: path.clone(),
                    detail: format!(
                        "already resolved earlier; skipping revision {}",
                        merged.revision.as_deref().unwrap_or("(none)")
                    ),
                });
                set.edges.push(Edge {
                    parent: parent_path.clone(),
                    project,
                    decision: EdgeDecision::Duplicate,
                });
                continue;
            }

            let selection = entry.filters.is_selected(&project.groups, &path, false);
            if !selection.selected {
                set.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::FilteredOut,
                    project: merged.name.clone(),
                    path: path.clone(),
                    detail: match &selection.winning {
                        Some(rule) => format!("deselected by '{}' ({})", rule.filter, rule.source),
                        None => "no filter selects its groups".to_string(),
                    },
                });
                set.edges.push(Edge {
                    parent: parent_path.clone(),
                    project,
                    decision: EdgeDecision::FilteredOut(selection.winning),
                });
                continue;
            }

            if project.revision.is_none() {
                set.diagnostics.push(Diagnostic {
                    kind: DiagnosticKind::MissingRevision,
                    project: merged.name.clone(),
                    path: path.clone(),
                    detail: "no revision declared; the current branch will be left alone"
                        .to_string(),
                });
            }

            taken.insert(path.clone());
            set.edges.push(Edge {
                parent: parent_path.clone(),
                project: project.clone(),
                decision: EdgeDecision::Kept,
            });

            // Consume the dependency's own manifest if its clone exists.
            let nested_file = project.manifest_file(req.workspace_root);
            if nested_file.exists() {
                let nested = ManifestSpec::load(&nested_file).map_err(|source| {
                    ResolveError::NestedManifest {
                        path: nested_file.clone(),
                        source,
                    }
                })?;
                queue.push_back((
                    Some(path.clone()),
                    ExpandEntry {
                        manifest: nested,
                        containing_url: Some(project.url.clone()),
                        level: entry.level + 1,
                        filters: entry.filters.with_inherited(&project.with_groups),
                    },
                ));
            }

            set.projects.push(project);
        }
    }

    Ok(set)
}

/// Apply the URL precedence: explicit `url`, then `remote`, then the default
/// sibling of the containing project.
fn resolve_spec_url(
    spec: &ProjectSpec,
    manifest: &ManifestSpec,
    containing_url: Option<&str>,
) -> Result<String, ResolveError> {
    if let Some(ref url) = spec.url {
        if urls::is_absolute(url) {
            return Ok(url.clone());
        }
        return match containing_url {
            Some(base) => Ok(urls::join(base, url)),
            None => Err(ResolveError::UrlResolutionFailed {
                project: spec.name.clone(),
                detail: format!(
                    "relative url '{}' but the workspace has no main project URL to resolve \
                     against",
                    url
                ),
            }),
        };
    }

    if let Some(ref remote) = spec.remote {
        let base = manifest
            .remotes
            .iter()
            .find(|r| &r.name == remote)
            .map(|r| r.url_base.as_str())
            .ok_or_else(|| ResolveError::UrlResolutionFailed {
                project: spec.name.clone(),
                detail: format!("unknown remote '{}'", remote),
            })?;
        let sub = spec.sub_url.clone().unwrap_or_else(|| spec.name.clone());
        return Ok(urls::join(base, &sub));
    }

    match containing_url {
        Some(base) => Ok(urls::default_url(&spec.name, base)),
        None => Err(ResolveError::UrlResolutionFailed {
            project: spec.name.clone(),
            detail: "no url, no remote, and no containing project URL to derive a sibling from"
                .to_string(),
        }),
    }
}
