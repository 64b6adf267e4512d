//! Manifest transform commands
//!
//! `manifest resolve` flattens the recursive graph into one manifest,
//! `manifest freeze` additionally pins commit SHAs, `validate` and
//! `upgrade` operate on the live manifest file, `path`/`paths` print
//! manifest locations, and `create` writes a starter manifest.

use std::path::{Path, PathBuf};

use crate::cli::context::WorkspaceContext;
use crate::cli::output::Output;
use crate::core::manifest::{ManifestSpec, MANIFEST_FILE};
use crate::core::transform;

/// Print a manifest or write it to `output`.
fn emit(manifest: &ManifestSpec, output: Option<&Path>) -> anyhow::Result<()> {
    let content = manifest.dumps()?;
    match output {
        Some(path) => {
            std::fs::write(path, &content)?;
            Output::success(&format!("Wrote {}", path.display()));
        }
        None => print!("{}", content),
    }
    Ok(())
}

pub fn run_resolve(ctx: &WorkspaceContext, output: Option<PathBuf>) -> anyhow::Result<()> {
    let _lock = ctx.workspace.lock_shared()?;
    let set = ctx.resolve(None, &[])?;
    let manifest = transform::resolve_manifest(&set);
    emit(&manifest, output.as_deref())
}

pub fn run_freeze(ctx: &WorkspaceContext, output: Option<PathBuf>) -> anyhow::Result<()> {
    let _lock = ctx.workspace.lock_shared()?;
    let set = ctx.resolve(None, &[])?;
    let manifest = transform::freeze_manifest(&set, &ctx.workspace.root)?;
    emit(&manifest, output.as_deref())
}

pub fn run_validate(ctx: &WorkspaceContext) -> anyhow::Result<()> {
    let _lock = ctx.workspace.lock_shared()?;
    let path = ctx.workspace.manifest_file();
    ManifestSpec::load(&path)?;
    if !ctx.quiet {
        Output::success(&format!("{} is valid", path.display()));
    }
    Ok(())
}

pub fn run_upgrade(ctx: &WorkspaceContext) -> anyhow::Result<()> {
    let _lock = ctx.workspace.lock_exclusive()?;
    let path = ctx.workspace.manifest_file();
    let mut manifest = ManifestSpec::load(&path)?;
    let changed = manifest.upgrade();
    manifest.save(&path)?;
    if !ctx.quiet {
        if changed {
            Output::success(&format!("Upgraded {}", path.display()));
        } else {
            Output::info(&format!(
                "{} already at the current schema; header regenerated",
                path.display()
            ));
        }
    }
    Ok(())
}

pub fn run_path(ctx: &WorkspaceContext) -> anyhow::Result<()> {
    println!("{}", ctx.workspace.manifest_file().display());
    Ok(())
}

/// Print the manifest path of every resolved project that has one on disk.
pub fn run_paths(ctx: &WorkspaceContext) -> anyhow::Result<()> {
    let _lock = ctx.workspace.lock_shared()?;
    let set = ctx.resolve(None, &[])?;
    for project in &set.projects {
        let file = project.manifest_file(&ctx.workspace.root);
        if file.exists() {
            println!("{}", file.display());
        }
    }
    Ok(())
}

/// Write a template manifest. Does not require a workspace.
pub fn run_create(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(MANIFEST_FILE));
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    ManifestSpec::template().save(&path)?;
    Output::success(&format!("Created {}", path.display()));
    Ok(())
}
