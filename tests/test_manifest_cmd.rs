//! Integration tests for the manifest transform operations.

mod common;

use common::fixtures::WorkspaceBuilder;
use common::git_helpers;

use git_ws::cli::commands::update::{run_update, UpdateOptions};
use git_ws::core::manifest::{ManifestSpec, MANIFEST_FILE};
use git_ws::core::resolver::{self, ResolveRequest};
use git_ws::core::transform;

const GRAPH_MANIFEST: &str = r#"
[[dependencies]]
name = "FooLib"
revision = "main"

[[dependencies]]
name = "BazLib"
revision = "main"
"#;

const FOO_MANIFEST: &str = r#"
[[dependencies]]
name = "BarLib"
revision = "main"
"#;

fn graph_workspace() -> common::fixtures::WorkspaceFixture {
    WorkspaceBuilder::new()
        .main_manifest(GRAPH_MANIFEST)
        .add_remote("FooLib", Some(FOO_MANIFEST))
        .add_remote("BazLib", None)
        .add_remote("BarLib", None)
        .build()
}

#[tokio::test]
async fn test_resolve_round_trip() {
    let ws = graph_workspace();
    let ctx = ws.context();
    run_update(&ctx, UpdateOptions::default()).await.expect("update");

    let set = ctx.resolve(None, &[]).expect("resolve");
    let flattened = transform::resolve_manifest(&set);
    flattened.validate().expect("flattened manifest must validate");

    // Resolving the flattened manifest (main-less) reproduces the same
    // non-main project set.
    let resolved_path = ws.root.join("resolved.toml");
    flattened.save(&resolved_path).unwrap();
    let again = resolver::resolve(&ResolveRequest {
        workspace_root: &ws.root,
        main_path: None,
        main_url: None,
        manifest_path: "resolved.toml",
        command_line_filters: &[],
    })
    .expect("re-resolve");

    let original: Vec<_> = set
        .non_main()
        .map(|p| (p.name.clone(), p.path.clone(), p.url.clone(), p.revision.clone()))
        .collect();
    let round_tripped: Vec<_> = again
        .non_main()
        .map(|p| (p.name.clone(), p.path.clone(), p.url.clone(), p.revision.clone()))
        .collect();
    assert_eq!(original, round_tripped);
}

#[tokio::test]
async fn test_freeze_pins_commit_shas() {
    let ws = graph_workspace();
    let ctx = ws.context();
    run_update(&ctx, UpdateOptions::default()).await.expect("update");

    let set = ctx.resolve(None, &[]).expect("resolve");
    let frozen = transform::freeze_manifest(&set, &ws.root).expect("freeze");

    for dep in &frozen.dependencies {
        let revision = dep.revision.as_deref().expect("frozen revision");
        assert_eq!(revision.len(), 40, "{}: expected a full SHA", dep.name);
        assert!(revision.chars().all(|c| c.is_ascii_hexdigit()));

        let clone_dir = ws.root.join(dep.path.as_deref().unwrap());
        assert_eq!(revision, git_helpers::head_sha(&clone_dir));
    }
}

#[tokio::test]
async fn test_freeze_is_idempotent() {
    let ws = graph_workspace();
    let ctx = ws.context();
    run_update(&ctx, UpdateOptions::default()).await.expect("update");

    let set = ctx.resolve(None, &[]).expect("resolve");
    let first = transform::freeze_manifest(&set, &ws.root).expect("first freeze");
    let second = transform::freeze_manifest(&set, &ws.root).expect("second freeze");
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_freeze_fails_before_update() {
    let ws = WorkspaceBuilder::new()
        .main_manifest(
            r#"
[[dependencies]]
name = "lib"
revision = "main"
"#,
        )
        .add_remote("lib", None)
        .build();
    let ctx = ws.context();

    let set = ctx.resolve(None, &[]).expect("resolve");
    let result = transform::freeze_manifest(&set, &ws.root);
    assert!(result.is_err(), "freeze must fail while clones are missing");
}

#[test]
fn test_validate_and_upgrade_live_manifest() {
    let ws = WorkspaceBuilder::new()
        .main_manifest("version = 1\n")
        .build();
    let ctx = ws.context();

    git_ws::cli::commands::manifest_cmd::run_validate(&ctx).expect("validate");
    git_ws::cli::commands::manifest_cmd::run_upgrade(&ctx).expect("upgrade");

    // The rewritten manifest carries the documentation header and still
    // parses.
    let content = std::fs::read_to_string(ws.main_dir().join(MANIFEST_FILE)).unwrap();
    assert!(content.starts_with("# Git Workspace manifest"));
    ManifestSpec::parse(&content).expect("upgraded manifest parses");
}

#[test]
fn test_upgrade_preserves_unknown_top_level_fields() {
    let ws = WorkspaceBuilder::new()
        .main_manifest("version = 1\nfuture-field = \"kept\"\n")
        .build();
    let ctx = ws.context();

    git_ws::cli::commands::manifest_cmd::run_upgrade(&ctx).expect("upgrade");

    let content = std::fs::read_to_string(ws.main_dir().join(MANIFEST_FILE)).unwrap();
    assert!(content.contains("future-field"));
}
