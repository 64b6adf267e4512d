//! Manifest editing commands
//!
//! `dep`, `remote`, `default`, and `group-filters` rewrite the live
//! manifest file. Edits are validated before the atomic rewrite; comments
//! in the file are replaced by the regenerated documentation header.

use crate::cli::context::WorkspaceContext;
use crate::cli::output::{Output, Table};
use crate::core::group_filter::GroupFilter;
use crate::core::manifest::{ManifestSpec, ProjectSpec, Remote};

/// Load, mutate, validate, and atomically save the live manifest.
fn edit_manifest<F>(ctx: &WorkspaceContext, mutate: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut ManifestSpec) -> anyhow::Result<()>,
{
    let _lock = ctx.workspace.lock_exclusive()?;
    let path = ctx.workspace.manifest_file();
    let mut manifest = ManifestSpec::load(&path)?;
    mutate(&mut manifest)?;
    manifest.validate()?;
    manifest.save(&path)?;
    Ok(())
}

/// Fields accepted by `dep add`.
#[derive(Debug, Default, Clone)]
pub struct DepAddArgs {
    pub name: String,
    pub remote: Option<String>,
    pub sub_url: Option<String>,
    pub url: Option<String>,
    pub revision: Option<String>,
    pub path: Option<String>,
    pub groups: Vec<String>,
}

pub fn run_dep_add(ctx: &WorkspaceContext, args: DepAddArgs) -> anyhow::Result<()> {
    let name = args.name.clone();
    edit_manifest(ctx, |manifest| {
        manifest.add_dependency(ProjectSpec {
            name: args.name,
            remote: args.remote,
            sub_url: args.sub_url,
            url: args.url,
            revision: args.revision,
            path: args.path,
            groups: args.groups,
            ..ProjectSpec::default()
        })?;
        Ok(())
    })?;
    if !ctx.quiet {
        Output::success(&format!("Added dependency '{}'", name));
    }
    Ok(())
}

pub fn run_dep_delete(ctx: &WorkspaceContext, name: &str) -> anyhow::Result<()> {
    edit_manifest(ctx, |manifest| {
        manifest.remove_dependency(name)?;
        Ok(())
    })?;
    if !ctx.quiet {
        Output::success(&format!("Removed dependency '{}'", name));
    }
    Ok(())
}

pub fn run_dep_list(ctx: &WorkspaceContext) -> anyhow::Result<()> {
    let manifest = ManifestSpec::load(ctx.workspace.manifest_file())?;
    let mut table = Table::new(&["Name", "Revision", "Path", "Groups"]);
    for dep in &manifest.dependencies {
        let merged = dep.with_defaults(&manifest.defaults);
        table.add_row(vec![
            merged.name.clone(),
            merged.revision.clone().unwrap_or_default(),
            merged.path.clone().unwrap_or_else(|| merged.name.clone()),
            merged.groups.join(","),
        ]);
    }
    table.print();
    Ok(())
}

pub fn run_remote_add(ctx: &WorkspaceContext, name: &str, url_base: &str) -> anyhow::Result<()> {
    edit_manifest(ctx, |manifest| {
        manifest.add_remote(Remote {
            name: name.to_string(),
            url_base: url_base.to_string(),
        })?;
        Ok(())
    })?;
    if !ctx.quiet {
        Output::success(&format!("Added remote '{}'", name));
    }
    Ok(())
}

pub fn run_remote_delete(ctx: &WorkspaceContext, name: &str) -> anyhow::Result<()> {
    edit_manifest(ctx, |manifest| {
        manifest.remove_remote(name)?;
        Ok(())
    })?;
    if !ctx.quiet {
        Output::success(&format!("Removed remote '{}'", name));
    }
    Ok(())
}

pub fn run_remote_list(ctx: &WorkspaceContext) -> anyhow::Result<()> {
    let manifest = ManifestSpec::load(ctx.workspace.manifest_file())?;
    let mut table = Table::new(&["Name", "URL base"]);
    for remote in &manifest.remotes {
        table.add_row(vec![remote.name.clone(), remote.url_base.clone()]);
    }
    table.print();
    Ok(())
}

/// `default get [FIELD]` / `default set FIELD VALUE`.
pub fn run_default_get(ctx: &WorkspaceContext, field: Option<&str>) -> anyhow::Result<()> {
    let manifest = ManifestSpec::load(ctx.workspace.manifest_file())?;
    let defaults = &manifest.defaults;
    let print_one = |name: &str| -> anyhow::Result<()> {
        let value = match name {
            "remote" => defaults.remote.clone().unwrap_or_default(),
            "revision" => defaults.revision.clone().unwrap_or_default(),
            "groups" => defaults.groups.join(","),
            "with-groups" => defaults.with_groups.join(","),
            "submodules" => defaults
                .submodules
                .map(|b| b.to_string())
                .unwrap_or_default(),
            other => anyhow::bail!("unknown default field '{}'", other),
        };
        println!("{} = {}", name, value);
        Ok(())
    };
    match field {
        Some(name) => print_one(name)?,
        None => {
            for name in ["remote", "revision", "groups", "with-groups", "submodules"] {
                print_one(name)?;
            }
        }
    }
    Ok(())
}

pub fn run_default_set(ctx: &WorkspaceContext, field: &str, value: &str) -> anyhow::Result<()> {
    edit_manifest(ctx, |manifest| {
        let empty = value.is_empty();
        match field {
            "remote" => manifest.defaults.remote = (!empty).then(|| value.to_string()),
            "revision" => manifest.defaults.revision = (!empty).then(|| value.to_string()),
            "groups" => manifest.defaults.groups = split_list(value),
            "with-groups" => manifest.defaults.with_groups = split_list(value),
            "submodules" => {
                manifest.defaults.submodules = if empty {
                    None
                } else {
                    Some(value.parse().map_err(|_| {
                        anyhow::anyhow!("submodules must be 'true' or 'false', got '{}'", value)
                    })?)
                }
            }
            other => anyhow::bail!("unknown default field '{}'", other),
        }
        Ok(())
    })?;
    if !ctx.quiet {
        Output::success(&format!("Set default {} = {}", field, value));
    }
    Ok(())
}

/// Replace the manifest's group-filter list.
pub fn run_group_filters_set(ctx: &WorkspaceContext, filters: &[String]) -> anyhow::Result<()> {
    for expr in filters {
        GroupFilter::parse(expr)?;
    }
    edit_manifest(ctx, |manifest| {
        manifest.group_filters = filters.to_vec();
        Ok(())
    })?;
    if !ctx.quiet {
        Output::success(&format!("Set {} group filter(s)", filters.len()));
    }
    Ok(())
}

pub fn run_group_filters_list(ctx: &WorkspaceContext) -> anyhow::Result<()> {
    let manifest = ManifestSpec::load(ctx.workspace.manifest_file())?;
    for filter in &manifest.group_filters {
        println!("{}", filter);
    }
    Ok(())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
