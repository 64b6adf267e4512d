//! Manifest parsing and validation
//!
//! The manifest file (`git-ws.toml`) declares a project's remotes, defaults,
//! dependencies, group filters, and link/copy files.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Schema version this build reads and writes.
pub const CURRENT_VERSION: u32 = 1;

/// Default manifest file name, relative to the project directory.
pub const MANIFEST_FILE: &str = "git-ws.toml";

/// Identifiers: names of remotes, dependencies, and groups.
static IDENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("identifier regex must compile"));

/// Errors that can occur when loading or validating a manifest
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Manifest not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse manifest TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize manifest: {0}")]
    Emit(#[from] toml::ser::Error),

    #[error("Manifest schema version {version} is newer than supported version {supported}")]
    SchemaTooNew { version: u32, supported: u32 },

    #[error("Duplicate remote: {name}")]
    DuplicateRemote { name: String },

    #[error("Dependency '{project}' references unknown remote '{name}'")]
    UnknownRemote { name: String, project: String },

    #[error("Dependency '{project}' sets both 'remote' and 'url'")]
    ConflictingUrlSources { project: String },

    #[error("Dependency '{project}' sets 'sub-url' without 'remote'")]
    InvalidSubUrl { project: String },

    #[error("Invalid identifier: '{name}'")]
    BadIdentifier { name: String },

    #[error("Invalid group filter expression: '{expr}'")]
    BadGroupFilter { expr: String },

    #[error("Path escapes workspace boundary: {path}")]
    PathTraversal { path: String },

    #[error("Remote '{name}' is still referenced by the manifest")]
    RemoteInUse { name: String },

    #[error("Dependency already declared: {name}")]
    DuplicateDependency { name: String },

    #[error("No such dependency: {name}")]
    UnknownDependency { name: String },
}

/// A named remote providing a base URL for dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Remote {
    /// Remote name, referenced by dependencies.
    pub name: String,
    /// Base URL; dependency URLs are joined onto this.
    pub url_base: String,
}

/// Default values applied to dependencies that omit the field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields, default)]
pub struct Defaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub with_groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submodules: Option<bool>,
}

impl Defaults {
    pub fn is_empty(&self) -> bool {
        *self == Defaults::default()
    }
}

/// A file to link or copy from a project into the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FileRef {
    /// Source path relative to the declaring project.
    pub src: String,
    /// Destination path relative to the workspace root.
    pub dest: String,
    /// Created only when these groups pass the active filter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// A declarative dependency entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ProjectSpec {
    /// Dependency name; also the default workspace path.
    pub name: String,
    /// Remote providing the base URL. Mutually exclusive with `url`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    /// URL relative to the remote's base. Requires `remote`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_url: Option<String>,
    /// Absolute or relative Git URL. Mutually exclusive with `remote`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Branch name, tag, or 40-char commit SHA.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    /// Workspace-relative clone directory; defaults to `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Manifest location inside the clone; defaults to `git-ws.toml`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub with_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submodules: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linkfiles: Vec<FileRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copyfiles: Vec<FileRef>,
}

impl ProjectSpec {
    /// Fill in unset fields from a `[defaults]` block.
    pub fn with_defaults(&self, defaults: &Defaults) -> ProjectSpec {
        let mut spec = self.clone();
        // An explicit url wins over a defaulted remote.
        if spec.remote.is_none() && spec.url.is_none() {
            spec.remote = defaults.remote.clone();
        }
        if spec.revision.is_none() {
            spec.revision = defaults.revision.clone();
        }
        if spec.groups.is_empty() {
            spec.groups = defaults.groups.clone();
        }
        if spec.with_groups.is_empty() {
            spec.with_groups = defaults.with_groups.clone();
        }
        if spec.submodules.is_none() {
            spec.submodules = defaults.submodules;
        }
        spec
    }
}

/// The on-disk manifest structure.
///
/// Unknown top-level keys are preserved across load/save for forward
/// compatibility; unknown keys inside known tables are rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ManifestSpec {
    /// Schema version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Ordered filter expressions, later entries override earlier ones.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_filters: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remotes: Vec<Remote>,
    #[serde(default, skip_serializing_if = "Defaults::is_empty")]
    pub defaults: Defaults,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ProjectSpec>,
    /// Link files of the enclosing project itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linkfiles: Vec<FileRef>,
    /// Copy files of the enclosing project itself.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub copyfiles: Vec<FileRef>,
    /// Unknown top-level fields, carried through rewrites.
    #[serde(flatten)]
    pub extra: toml::Table,
}

fn default_version() -> u32 {
    CURRENT_VERSION
}

impl ManifestSpec {
    /// Load a manifest from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ManifestError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a manifest from a TOML string
    pub fn parse(content: &str) -> Result<Self, ManifestError> {
        let manifest: ManifestSpec = toml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Serialize to TOML, preceded by the documentation header for the
    /// current schema version.
    pub fn dumps(&self) -> Result<String, ManifestError> {
        let body = toml::to_string_pretty(self)?;
        Ok(format!("{}\n{}", doc_header(self.version), body))
    }

    /// Write the manifest atomically (temp file + rename in the target dir).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ManifestError> {
        let path = path.as_ref();
        let content = self.dumps()?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.persist(path).map_err(|e| ManifestError::Io(e.error))?;
        Ok(())
    }

    /// Validate structural constraints.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.version > CURRENT_VERSION {
            return Err(ManifestError::SchemaTooNew {
                version: self.version,
                supported: CURRENT_VERSION,
            });
        }

        for expr in &self.group_filters {
            crate::core::group_filter::GroupFilter::parse(expr).map_err(|_| {
                ManifestError::BadGroupFilter { expr: expr.clone() }
            })?;
        }

        let mut remote_names = HashSet::new();
        for remote in &self.remotes {
            check_identifier(&remote.name)?;
            if !remote_names.insert(remote.name.as_str()) {
                return Err(ManifestError::DuplicateRemote {
                    name: remote.name.clone(),
                });
            }
        }

        if let Some(ref remote) = self.defaults.remote {
            if !remote_names.contains(remote.as_str()) {
                return Err(ManifestError::UnknownRemote {
                    name: remote.clone(),
                    project: "defaults".to_string(),
                });
            }
        }
        for group in self.defaults.groups.iter().chain(&self.defaults.with_groups) {
            check_identifier(group)?;
        }

        for dep in &self.dependencies {
            self.validate_dependency(dep)?;
        }

        check_file_refs(self.linkfiles.iter().chain(&self.copyfiles))?;

        Ok(())
    }

    fn validate_dependency(&self, dep: &ProjectSpec) -> Result<(), ManifestError> {
        check_identifier(&dep.name)?;

        if dep.remote.is_some() && dep.url.is_some() {
            return Err(ManifestError::ConflictingUrlSources {
                project: dep.name.clone(),
            });
        }
        if dep.sub_url.is_some() && dep.remote.is_none() {
            return Err(ManifestError::InvalidSubUrl {
                project: dep.name.clone(),
            });
        }
        if let Some(ref remote) = dep.remote {
            if !self.remotes.iter().any(|r| &r.name == remote) {
                return Err(ManifestError::UnknownRemote {
                    name: remote.clone(),
                    project: dep.name.clone(),
                });
            }
        }

        for group in dep.groups.iter().chain(&dep.with_groups) {
            check_identifier(group)?;
        }

        for path in [&dep.path, &dep.manifest_path].into_iter().flatten() {
            if path_escapes_boundary(path) {
                return Err(ManifestError::PathTraversal { path: path.clone() });
            }
        }

        check_file_refs(dep.linkfiles.iter().chain(&dep.copyfiles))?;

        Ok(())
    }

    /// Rewrite at the latest schema version, keeping user data and unknown
    /// top-level fields. Returns true if the version changed.
    pub fn upgrade(&mut self) -> bool {
        let changed = self.version != CURRENT_VERSION;
        self.version = CURRENT_VERSION;
        changed
    }

    /// A starter manifest for `manifest create`.
    pub fn template() -> ManifestSpec {
        ManifestSpec {
            version: CURRENT_VERSION,
            ..ManifestSpec::default()
        }
    }

    pub fn add_remote(&mut self, remote: Remote) -> Result<(), ManifestError> {
        check_identifier(&remote.name)?;
        if self.remotes.iter().any(|r| r.name == remote.name) {
            return Err(ManifestError::DuplicateRemote { name: remote.name });
        }
        self.remotes.push(remote);
        Ok(())
    }

    pub fn remove_remote(&mut self, name: &str) -> Result<(), ManifestError> {
        let referenced = self.dependencies.iter().any(|d| d.remote.as_deref() == Some(name))
            || self.defaults.remote.as_deref() == Some(name);
        if referenced {
            return Err(ManifestError::RemoteInUse {
                name: name.to_string(),
            });
        }
        let before = self.remotes.len();
        self.remotes.retain(|r| r.name != name);
        if self.remotes.len() == before {
            return Err(ManifestError::UnknownRemote {
                name: name.to_string(),
                project: "remotes".to_string(),
            });
        }
        Ok(())
    }

    pub fn add_dependency(&mut self, spec: ProjectSpec) -> Result<(), ManifestError> {
        if self.dependencies.iter().any(|d| d.name == spec.name) {
            return Err(ManifestError::DuplicateDependency { name: spec.name });
        }
        self.validate_dependency(&spec)?;
        self.dependencies.push(spec);
        Ok(())
    }

    pub fn remove_dependency(&mut self, name: &str) -> Result<(), ManifestError> {
        let before = self.dependencies.len();
        self.dependencies.retain(|d| d.name != name);
        if self.dependencies.len() == before {
            return Err(ManifestError::UnknownDependency {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn check_identifier(name: &str) -> Result<(), ManifestError> {
    if IDENT_RE.is_match(name) {
        Ok(())
    } else {
        Err(ManifestError::BadIdentifier {
            name: name.to_string(),
        })
    }
}

fn check_file_refs<'a, I: Iterator<Item = &'a FileRef>>(refs: I) -> Result<(), ManifestError> {
    for fr in refs {
        for path in [&fr.src, &fr.dest] {
            if path.is_empty() || path_escapes_boundary(path) {
                return Err(ManifestError::PathTraversal { path: path.clone() });
            }
        }
        for group in &fr.groups {
            check_identifier(group)?;
        }
    }
    Ok(())
}

/// Check if a path escapes the workspace boundary
pub fn path_escapes_boundary(path: &str) -> bool {
    let normalized = path.replace('\\', "/");
    normalized.starts_with("..") || normalized.starts_with('/') || normalized.contains("/../")
}

/// Documentation comment block emitted at the top of rewritten manifests.
fn doc_header(version: u32) -> String {
    format!(
        "\
# Git Workspace manifest (schema version {version}).
#
# [[remotes]]           named remotes; 'url-base' is joined with a
#                       dependency's 'sub-url' or 'name'.
# [defaults]            values applied to dependencies that omit the field:
#                       'remote', 'revision', 'groups', 'with-groups',
#                       'submodules'.
# group-filters         ordered '+group[@path]' / '-group[@path]'
#                       expressions; later entries override earlier ones.
# [[dependencies]]      one entry per dependency: 'name' (required),
#                       'remote'/'sub-url' or 'url', 'revision', 'path',
#                       'manifest-path', 'groups', 'with-groups',
#                       'submodules', 'linkfiles', 'copyfiles'.
# [[linkfiles]]         files of this project linked into the workspace.
# [[copyfiles]]         files of this project copied into the workspace.
"
    )
}
