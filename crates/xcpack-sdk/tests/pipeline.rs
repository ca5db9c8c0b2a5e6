//! End-to-end pipeline scenarios against a recording fake toolchain.

mod common;

use std::fs;

use common::{FakeRunner, HEADER, tree, workspace};
use xcpack_sdk::builders::CompilerFlags;
use xcpack_sdk::{BuildMode, ExecutionStrategy, PackConfig, PackError, Pipeline, PipelineState};

fn config(root: &std::path::Path, mode: BuildMode) -> PackConfig {
    let mut config = PackConfig::new(root);
    config.mode = mode;
    config
}

#[test]
fn debug_build_produces_two_slices_with_debug_info() {
    let ws = workspace();
    let runner = FakeRunner::new();
    let mut pipeline = Pipeline::new(config(ws.path(), BuildMode::Debug), &runner);

    let report = pipeline.run().unwrap();
    assert_eq!(report.state, PipelineState::Verified);
    assert_eq!(pipeline.state(), PipelineState::Verified);

    assert_eq!(report.artifacts.len(), 2);
    for artifact in &report.artifacts {
        let options = fs::read_to_string(&artifact.path).unwrap();
        assert!(options.contains("debuginfo=2"), "{}", artifact.path.display());
        assert!(options.contains("opt-level=0"));
    }

    assert_eq!(runner.calls_to("cbindgen").len(), 1);
    assert_eq!(fs::read_to_string(&report.header.path).unwrap(), HEADER);
    let include = ws.path().join("target/apple/include");
    assert_eq!(tree(&include), vec!["leaf.h", "module.modulemap"]);

    assert_eq!(report.bundle.slices.len(), 2);
    let bundle = ws.path().join("target/apple/leaf.xcframework");
    assert_eq!(report.bundle.path, bundle);
    assert!(bundle.join("ios-sim-debug/libleaf.a").is_file());
    assert!(bundle.join("ios-debug/libleaf.a").is_file());
    assert_eq!(runner.calls_to("xcodebuild").len(), 1);
}

#[test]
fn release_and_debug_runs_do_not_share_flags() {
    let ws = workspace();
    let runner = FakeRunner::new();
    Pipeline::new(config(ws.path(), BuildMode::Release), &runner)
        .run()
        .unwrap();
    Pipeline::new(config(ws.path(), BuildMode::Debug), &runner)
        .run()
        .unwrap();

    let builds = runner.calls_to("cargo");
    assert_eq!(builds.len(), 4);
    let release = CompilerFlags::decode_options(
        builds[0].env_value("CARGO_ENCODED_RUSTFLAGS").unwrap(),
    );
    let debug = CompilerFlags::decode_options(
        builds[2].env_value("CARGO_ENCODED_RUSTFLAGS").unwrap(),
    );
    assert!(release.iter().all(|opt| !debug.contains(opt)));
    for build in &builds {
        assert!(build.env_removals().contains(&"RUSTFLAGS".to_string()));
        assert_eq!(build.env_value("IPHONEOS_DEPLOYMENT_TARGET"), Some("10.0"));
        assert_eq!(build.env_value("LANG"), Some("C"));
        assert_eq!(build.arg_value("--features").as_deref(), Some("default-ring"));
    }
}

#[test]
fn stale_bundle_contents_are_removed() {
    let ws = workspace();
    let bundle = ws.path().join("target/apple/leaf.xcframework");
    fs::create_dir_all(bundle.join("macos-arm64")).unwrap();
    fs::write(bundle.join("macos-arm64/stale.a"), "old").unwrap();
    fs::write(bundle.join("NOTES.txt"), "unrelated").unwrap();

    let runner = FakeRunner::new();
    let report = Pipeline::new(config(ws.path(), BuildMode::Release), &runner)
        .run()
        .unwrap();

    assert!(!bundle.join("macos-arm64").exists());
    assert!(!bundle.join("NOTES.txt").exists());
    assert_eq!(report.bundle.slices.len(), 2);
}

#[test]
fn repeated_runs_yield_the_same_layout() {
    let ws = workspace();
    let runner = FakeRunner::new();
    let output = ws.path().join("target/apple");

    Pipeline::new(config(ws.path(), BuildMode::Release), &runner)
        .run()
        .unwrap();
    let first = tree(&output);
    Pipeline::new(config(ws.path(), BuildMode::Release), &runner)
        .run()
        .unwrap();
    assert_eq!(tree(&output), first);
}

#[test]
fn parallel_matrix_matches_sequential_layout() {
    let sequential = workspace();
    let parallel = workspace();
    let runner = FakeRunner::new();

    Pipeline::new(config(sequential.path(), BuildMode::Debug), &runner)
        .run()
        .unwrap();
    let mut cfg = config(parallel.path(), BuildMode::Debug);
    cfg.strategy = ExecutionStrategy::Parallel;
    let report = Pipeline::new(cfg, &runner).run().unwrap();

    assert_eq!(report.artifacts[0].target.triple, "aarch64-apple-ios-sim");
    assert_eq!(
        tree(&parallel.path().join("target/apple")),
        tree(&sequential.path().join("target/apple"))
    );
}

#[test]
fn build_failure_halts_before_header_generation() {
    let ws = workspace();
    let runner = FakeRunner::new().failing_build("aarch64-apple-ios", 101);
    let mut pipeline = Pipeline::new(config(ws.path(), BuildMode::Release), &runner);

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PackError::Build { .. }));
    assert_eq!(err.exit_code(), 101);
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert!(runner.calls_to("cbindgen").is_empty());
    assert!(runner.calls_to("xcodebuild").is_empty());
    assert!(!ws.path().join("target/apple/leaf.xcframework").exists());
}

#[test]
fn missing_target_is_provisioned() {
    let ws = workspace();
    let runner = FakeRunner::with_installed(&["aarch64-apple-ios-sim"]);
    let report = Pipeline::new(config(ws.path(), BuildMode::Release), &runner)
        .run()
        .unwrap();

    assert_eq!(report.provisioned, vec!["aarch64-apple-ios".to_string()]);
    let adds: Vec<_> = runner
        .calls_to("rustup")
        .into_iter()
        .filter(|inv| inv.has_arg("add"))
        .collect();
    assert_eq!(adds.len(), 1);
}

#[test]
fn invalid_workspace_runs_no_tools() {
    let ws = workspace();
    fs::remove_dir_all(ws.path().join("leaf-cli")).unwrap();
    let runner = FakeRunner::new();

    let err = Pipeline::new(config(ws.path(), BuildMode::Release), &runner)
        .run()
        .unwrap_err();
    match err {
        PackError::Validation { report, .. } => assert_eq!(report.missing(), vec!["leaf-cli"]),
        other => panic!("unexpected error: {}", other),
    }
    assert!(runner.calls.lock().unwrap().is_empty());
}

#[test]
fn stale_include_files_do_not_reach_the_bundle() {
    let ws = workspace();
    let include = ws.path().join("target/apple/include");
    fs::create_dir_all(&include).unwrap();
    fs::write(include.join("old_name.h"), "int old(void);\n").unwrap();

    let runner = FakeRunner::new();
    Pipeline::new(config(ws.path(), BuildMode::Release), &runner)
        .run()
        .unwrap();

    assert_eq!(tree(&include), vec!["leaf.h", "module.modulemap"]);
    let merge = &runner.calls_to("xcodebuild")[0];
    for headers in merge.arg_values("-headers") {
        assert_eq!(tree(std::path::Path::new(&headers)), vec!["leaf.h", "module.modulemap"]);
    }
}

#[test]
fn merge_failure_propagates_tool_status() {
    let ws = workspace();
    let runner = FakeRunner::new().failing_merge(70);
    let mut pipeline = Pipeline::new(config(ws.path(), BuildMode::Release), &runner);

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PackError::Assemble { .. }), "{}", err);
    assert_eq!(err.exit_code(), 70);
    assert_eq!(pipeline.state(), PipelineState::Failed);
    assert!(!ws.path().join("target/apple/leaf.xcframework").exists());
}

#[test]
fn merge_without_bundle_fails_verification() {
    let ws = workspace();
    let bundle = ws.path().join("target/apple/leaf.xcframework");
    fs::create_dir_all(bundle.join("ios-arm64")).unwrap();
    fs::write(bundle.join("ios-arm64/libleaf.a"), "previous run").unwrap();
    fs::write(bundle.join("Info.plist"), "<plist/>").unwrap();

    let runner = FakeRunner::new().silent_merge();
    let mut pipeline = Pipeline::new(config(ws.path(), BuildMode::Release), &runner);

    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, PackError::Verify(_)), "{}", err);
    assert!(err.to_string().contains("bundle not found"));
    assert_eq!(err.exit_code(), 1);
    assert_eq!(pipeline.state(), PipelineState::Failed);
    // The previous run's bundle must not satisfy verification.
    assert!(!bundle.exists());
}

#[test]
fn unexpected_slice_count_fails_verification() {
    let ws = workspace();
    let runner = FakeRunner::new().extra_merge_slice();
    let mut pipeline = Pipeline::new(config(ws.path(), BuildMode::Debug), &runner);

    let err = pipeline.run().unwrap_err();
    match &err {
        PackError::Verify(message) => {
            assert!(message.contains("expected 2 slice(s)"), "{}", message);
            assert!(message.contains("found 3"), "{}", message);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(pipeline.state(), PipelineState::Failed);
}
