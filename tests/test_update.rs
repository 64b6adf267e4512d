//! Integration tests for the update command (the workspace materializer).

mod common;

use common::fixtures::WorkspaceBuilder;
use common::git_helpers;

use git_ws::cli::commands::update::{run_update, UpdateOptions};

fn opts() -> UpdateOptions {
    UpdateOptions::default()
}

#[tokio::test]
async fn test_update_clones_sibling_at_tag() {
    let ws = WorkspaceBuilder::new()
        .main_manifest(
            r#"
[[dependencies]]
name = "mylib"
revision = "v1.0"
"#,
        )
        .add_remote("mylib", None)
        .build();
    ws.tag_remote("mylib", "v1.0");

    let ctx = ws.context();
    run_update(&ctx, opts()).await.expect("update should succeed");

    let lib = ws.project_path("mylib");
    assert!(lib.join(".git").exists(), "mylib should be cloned");
    let tags = git_helpers::git_stdout(&lib, &["tag", "--points-at", "HEAD"]);
    assert!(tags.lines().any(|t| t == "v1.0"), "HEAD should sit on v1.0");
}

#[tokio::test]
async fn test_update_discovers_transitive_dependencies() {
    let ws = WorkspaceBuilder::new()
        .main_manifest(
            r#"
[[dependencies]]
name = "FooLib"
revision = "main"
"#,
        )
        .add_remote(
            "FooLib",
            Some(
                r#"
[[dependencies]]
name = "BarLib"
revision = "main"
"#,
            ),
        )
        .add_remote("BarLib", None)
        .build();

    let ctx = ws.context();
    run_update(&ctx, opts()).await.expect("update should succeed");

    assert!(ws.project_path("FooLib").join(".git").exists());
    assert!(
        ws.project_path("BarLib").join(".git").exists(),
        "transitive dependency should be cloned in the same update run"
    );
}

#[tokio::test]
async fn test_update_is_idempotent() {
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
    run_update(&ctx, opts()).await.expect("first update");
    run_update(&ctx, opts()).await.expect("second update over a clean tree");
}

#[tokio::test]
async fn test_update_pulls_upstream_changes() {
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
    run_update(&ctx, opts()).await.expect("initial update");

    ws.push_commit("lib", "new-file.txt", "content");
    run_update(&ctx, opts()).await.expect("second update");

    assert!(ws.project_path("lib").join("new-file.txt").exists());
}

#[tokio::test]
async fn test_update_failure_does_not_abort_loop() {
    let ws = WorkspaceBuilder::new()
        .main_manifest(
            r#"
[[dependencies]]
name = "good"
revision = "main"

[[dependencies]]
name = "broken"
url = "file:///does/not/exist"
revision = "main"
"#,
        )
        .add_remote("good", None)
        .build();

    let ctx = ws.context();
    let result = run_update(&ctx, opts()).await;
    assert!(result.is_err(), "a failed clone must surface in the exit status");
    assert!(
        ws.project_path("good").join(".git").exists(),
        "the healthy project should still be cloned"
    );
}

#[tokio::test]
async fn test_update_refuses_non_git_target() {
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

    // Occupy the target with a plain directory.
    let target = ws.project_path("lib");
    std::fs::create_dir_all(&target).unwrap();
    std::fs::write(target.join("junk.txt"), "not a clone").unwrap();

    let ctx = ws.context();
    assert!(run_update(&ctx, opts()).await.is_err());

    // --force skips the target instead of failing.
    let forced = UpdateOptions {
        force: true,
        ..opts()
    };
    run_update(&ctx, forced).await.expect("forced update should skip the target");
    assert!(target.join("junk.txt").exists());
}

#[tokio::test]
async fn test_update_prune_removes_clean_obsolete_clone() {
    let ws = WorkspaceBuilder::new()
        .main_manifest(
            r#"
[[dependencies]]
name = "lib1"
revision = "main"

[[dependencies]]
name = "lib2"
revision = "main"
"#,
        )
        .add_remote("lib1", None)
        .add_remote("lib2", None)
        .build();

    let ctx = ws.context();
    run_update(&ctx, opts()).await.expect("initial update");
    assert!(ws.project_path("lib2").exists());

    ws.write_main_manifest(
        r#"
[[dependencies]]
name = "lib1"
revision = "main"
"#,
    );

    let prune = UpdateOptions {
        prune: true,
        ..opts()
    };
    run_update(&ctx, prune).await.expect("update --prune");
    assert!(!ws.project_path("lib2").exists(), "clean lib2 should be pruned");
    assert!(ws.project_path("lib1").exists());
}

#[tokio::test]
async fn test_update_prune_refuses_untracked_then_forces() {
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
    run_update(&ctx, opts()).await.expect("initial update");

    std::fs::write(ws.project_path("lib").join("wip.txt"), "uncommitted").unwrap();
    ws.write_main_manifest("version = 1\n");

    let prune = UpdateOptions {
        prune: true,
        ..opts()
    };
    run_update(&ctx, prune.clone()).await.expect("prune refusal is not fatal");
    assert!(
        ws.project_path("lib").exists(),
        "untracked work must block pruning"
    );

    let forced = UpdateOptions {
        force: true,
        ..prune
    };
    run_update(&ctx, forced).await.expect("forced prune");
    assert!(!ws.project_path("lib").exists());
}

#[tokio::test]
async fn test_update_applies_linkfiles_and_copyfiles() {
    let ws = WorkspaceBuilder::new()
        .main_manifest(
            r#"
[[dependencies]]
name = "cfglib"
revision = "main"

[[dependencies.linkfiles]]
src = "settings.cfg"
dest = "settings-link.cfg"

[[dependencies.copyfiles]]
src = "settings.cfg"
dest = "settings-copy.cfg"
"#,
        )
        .add_remote_with_file("cfglib", "settings.cfg", "answer = 42\n")
        .build();

    let ctx = ws.context();
    run_update(&ctx, opts()).await.expect("update");

    let link = ws.root.join("settings-link.cfg");
    assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
    assert_eq!(
        std::fs::read_to_string(ws.root.join("settings-copy.cfg")).unwrap(),
        "answer = 42\n"
    );
}

#[tokio::test]
async fn test_update_refuses_modified_copyfile_then_forces() {
    let ws = WorkspaceBuilder::new()
        .main_manifest(
            r#"
[[dependencies]]
name = "cfglib"
revision = "main"

[[dependencies.copyfiles]]
src = "settings.cfg"
dest = "settings-copy.cfg"
"#,
        )
        .add_remote_with_file("cfglib", "settings.cfg", "answer = 42\n")
        .build();

    let ctx = ws.context();
    run_update(&ctx, opts()).await.expect("initial update");

    std::fs::write(ws.root.join("settings-copy.cfg"), "local edit").unwrap();
    assert!(
        run_update(&ctx, opts()).await.is_err(),
        "a locally modified copy destination must be refused"
    );

    let forced = UpdateOptions {
        force: true,
        ..opts()
    };
    run_update(&ctx, forced).await.expect("forced update");
    assert_eq!(
        std::fs::read_to_string(ws.root.join("settings-copy.cfg")).unwrap(),
        "answer = 42\n"
    );
}

#[tokio::test]
async fn test_update_group_filter_gates_clone() {
    let manifest = r#"
[[dependencies]]
name = "core"
revision = "main"

[[dependencies]]
name = "devtools"
revision = "main"
groups = ["dev"]
"#;

    let ws = WorkspaceBuilder::new()
        .main_manifest(manifest)
        .add_remote("core", None)
        .add_remote("devtools", None)
        .build();
    let ctx = ws.context();
    run_update(&ctx, opts()).await.expect("update");
    assert!(ws.project_path("core").exists());
    assert!(!ws.project_path("devtools").exists());

    let ws = WorkspaceBuilder::new()
        .main_manifest(manifest)
        .add_remote("core", None)
        .add_remote("devtools", None)
        .group_filters(&["+dev"])
        .build();
    let ctx = ws.context();
    run_update(&ctx, opts()).await.expect("update with +dev");
    assert!(ws.project_path("devtools").exists());
}

#[tokio::test]
async fn test_update_sequential_matches_parallel() {
    let manifest = r#"
[[dependencies]]
name = "alpha"
revision = "main"

[[dependencies]]
name = "beta"
revision = "main"
"#;
    let ws = WorkspaceBuilder::new()
        .main_manifest(manifest)
        .add_remote("alpha", None)
        .add_remote("beta", None)
        .build();
    let ctx = ws.context();
    let sequential = UpdateOptions {
        sequential: true,
        ..opts()
    };
    run_update(&ctx, sequential).await.expect("sequential update");
    assert!(ws.project_path("alpha").exists());
    assert!(ws.project_path("beta").exists());
}
