use predicates::prelude::PredicateBooleanExt;

#[test]
fn check_dehash_help() {
    let mut cmd = assert_cmd::Command::cargo_bin("dehash").unwrap();
    cmd.arg("--help").assert().success();
}

fn get_file_content(path: &std::path::Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

/// dist
/// |- main.abcd1234.js
/// |- main.abcd1234.js.LICENSE.txt
/// |- vendor.chunk.xyz.js
/// |- readme.txt
/// |- chunks
/// |  |- lazy.123.js
/// |- assets
///    |- app.deadbeef.js
fn setup_dist(root: &std::path::Path) {
    std::fs::create_dir_all(root.join("chunks")).unwrap();
    std::fs::create_dir_all(root.join("assets")).unwrap();
    std::fs::write(root.join("main.abcd1234.js"), "bundle").unwrap();
    std::fs::write(root.join("main.abcd1234.js.LICENSE.txt"), "license").unwrap();
    std::fs::write(root.join("vendor.chunk.xyz.js"), "vendor").unwrap();
    std::fs::write(root.join("readme.txt"), "readme").unwrap();
    std::fs::write(root.join("chunks").join("lazy.123.js"), "lazy").unwrap();
    std::fs::write(root.join("assets").join("app.deadbeef.js"), "app").unwrap();
}

#[test]
fn test_rename_pass_only() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let root = tmp_dir.path().join("dist");
    setup_dist(&root);
    let mut cmd = assert_cmd::Command::cargo_bin("dehash").unwrap();
    cmd.args(["--no-fixups", root.to_str().unwrap()])
        .assert()
        .success();
    assert_eq!(get_file_content(&root.join("main.js")), "bundle");
    assert_eq!(
        get_file_content(&root.join("main.js.LICENSE.txt")),
        "license"
    );
    assert_eq!(get_file_content(&root.join("vendor.chunk.js")), "vendor");
    assert_eq!(get_file_content(&root.join("assets").join("app.js")), "app");
    // non-matching file untouched, skip dir never visited
    assert_eq!(get_file_content(&root.join("readme.txt")), "readme");
    assert!(root.join("chunks").join("lazy.123.js").exists());
    assert!(!root.join("chunks").join("lazy.js").exists());
}

#[test]
fn test_skip_dir_applies_at_any_depth() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let root = tmp_dir.path().join("dist");
    setup_dist(&root);
    let nested = root.join("assets").join("chunks");
    std::fs::create_dir_all(&nested).unwrap();
    std::fs::write(nested.join("deep.456.js"), "deep").unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("dehash").unwrap();
    cmd.args(["--no-fixups", root.to_str().unwrap()])
        .assert()
        .success();
    assert!(nested.join("deep.456.js").exists());
    assert!(!nested.join("deep.js").exists());
}

#[test]
fn test_custom_skip_dir() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let root = tmp_dir.path().join("dist");
    setup_dist(&root);
    let mut cmd = assert_cmd::Command::cargo_bin("dehash").unwrap();
    cmd.args(["--no-fixups", "--skip-dir", "assets", root.to_str().unwrap()])
        .assert()
        .success();
    // assets is pruned instead, chunks is now fair game
    assert!(root.join("assets").join("app.deadbeef.js").exists());
    assert!(root.join("chunks").join("lazy.js").exists());
}

#[test]
fn test_default_fixups() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let root = tmp_dir.path().join("dist");
    setup_dist(&root);
    std::fs::write(root.join("extension worker.js"), "worker").unwrap();
    // the worker map sits next to the invocation directory, not under dist
    std::fs::write(tmp_dir.path().join("extension-worker.js.map"), "map").unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("dehash").unwrap();
    cmd.current_dir(tmp_dir.path()).assert().success();
    assert_eq!(get_file_content(&root.join("extension-worker.js")), "worker");
    assert!(!root.join("extension worker.js").exists());
    assert_eq!(
        get_file_content(&root.join("extension-worker.js.map")),
        "map"
    );
    // the pattern pass ran too
    assert!(root.join("main.js").exists());
}

#[test]
fn test_missing_fixup_source_is_fatal() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let root = tmp_dir.path().join("dist");
    setup_dist(&root);
    // no "extension worker.js" anywhere, the default rename fixup must fail
    let mut cmd = assert_cmd::Command::cargo_bin("dehash").unwrap();
    cmd.current_dir(tmp_dir.path()).assert().failure();
    // renames from the pattern pass are not rolled back
    assert!(root.join("main.js").exists());
}

#[test]
fn test_explicit_fixups_override_defaults() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let root = tmp_dir.path().join("dist");
    setup_dist(&root);
    let mut cmd = assert_cmd::Command::cargo_bin("dehash").unwrap();
    cmd.args([
        "--rename-fixup",
        "readme.txt=README.txt",
        root.to_str().unwrap(),
    ])
    .assert()
    .success();
    assert!(root.join("README.txt").exists());
    assert!(!root.join("readme.txt").exists());
}

#[test]
fn test_second_run_is_a_no_op() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let root = tmp_dir.path().join("dist");
    setup_dist(&root);
    for _ in 0..2 {
        let mut cmd = assert_cmd::Command::cargo_bin("dehash").unwrap();
        cmd.args(["--no-fixups", "--summary", root.to_str().unwrap()])
            .assert()
            .success();
    }
    let mut cmd = assert_cmd::Command::cargo_bin("dehash").unwrap();
    cmd.args(["--no-fixups", "--summary", root.to_str().unwrap()])
        .assert()
        .success()
        .stdout(
            predicates::str::contains("files renamed: 0")
                .and(predicates::str::contains("directories skipped: 1")),
        );
}

#[test]
fn test_missing_root_fails() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let mut cmd = assert_cmd::Command::cargo_bin("dehash").unwrap();
    cmd.arg(tmp_dir.path().join("no-such-dir").to_str().unwrap())
        .assert()
        .failure();
}
