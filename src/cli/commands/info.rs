//! Read-only workspace introspection
//!
//! `info main-path`, `info workspace-path`, and `info project-paths` print
//! locations; `info dep-tree` renders the dependency graph as a tree
//! derived from the resolver's edge list, annotating duplicates and
//! filtered-out entries.

use crate::cli::context::WorkspaceContext;
use crate::core::resolver::{Edge, EdgeDecision, ResolvedSet};

pub fn run_main_path(ctx: &WorkspaceContext) -> anyhow::Result<()> {
    match ctx.workspace.main_dir() {
        Some(dir) => println!("{}", dir.display()),
        None => anyhow::bail!("workspace has no main project"),
    }
    Ok(())
}

pub fn run_workspace_path(ctx: &WorkspaceContext) -> anyhow::Result<()> {
    println!("{}", ctx.workspace.root.display());
    Ok(())
}

pub fn run_project_paths(ctx: &WorkspaceContext) -> anyhow::Result<()> {
    let _lock = ctx.workspace.lock_shared()?;
    let set = ctx.resolve(None, &[])?;
    for project in &set.projects {
        println!("{}", project.abs_path(&ctx.workspace.root).display());
    }
    Ok(())
}

/// Print the dependency tree. With `primary`, dropped entries are hidden
/// and filter traces are shown for pruned groups.
pub fn run_dep_tree(ctx: &WorkspaceContext, primary: bool) -> anyhow::Result<()> {
    let _lock = ctx.workspace.lock_shared()?;
    let set = ctx.resolve(None, &[])?;

    let roots: Vec<&Edge> = set.edges.iter().filter(|e| e.parent.is_none()).collect();
    for (i, root) in roots.iter().enumerate() {
        print_edge(&set, root, "", i + 1 == roots.len(), true, primary);
    }
    Ok(())
}

fn print_edge(
    set: &ResolvedSet,
    edge: &Edge,
    prefix: &str,
    is_last: bool,
    is_root: bool,
    primary: bool,
) {
    let connector = if is_root {
        ""
    } else if is_last {
        "└── "
    } else {
        "├── "
    };

    let mut line = format!("{}{}{}", prefix, connector, edge.project.name);
    if let Some(ref rev) = edge.project.revision {
        line.push_str(&format!(" {}", rev));
    }
    if edge.project.is_main {
        line.push_str(" (MAIN)");
    }
    match &edge.decision {
        EdgeDecision::Kept => {}
        EdgeDecision::Duplicate => {
            if primary {
                return;
            }
            line.push_str(" [duplicate]");
        }
        EdgeDecision::FilteredOut(winning) => {
            if primary {
                match winning {
                    Some(rule) => line.push_str(&format!(
                        " [filtered out by '{}' ({})]",
                        rule.filter, rule.source
                    )),
                    None => line.push_str(" [filtered out: no filter selects its groups]"),
                }
            } else {
                line.push_str(" [filtered out]");
            }
        }
    }
    println!("{}", line);

    if !matches!(edge.decision, EdgeDecision::Kept) {
        return;
    }

    let children: Vec<&Edge> = set
        .edges
        .iter()
        .filter(|e| e.parent.as_deref() == Some(edge.project.path.as_str()))
        .collect();
    let child_prefix = if is_root {
        String::new()
    } else {
        format!("{}{}", prefix, if is_last { "    " } else { "│   " })
    };

    for (i, child) in children.iter().enumerate() {
        print_edge(set, child, &child_prefix, i + 1 == children.len(), false, primary);
    }
}
