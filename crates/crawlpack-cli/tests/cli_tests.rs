//! Runs the `crawlpack` binary against temporary projects.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn crawlpack(cwd: &Path) -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("crawlpack").unwrap();
    cmd.current_dir(cwd)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .arg("--no-color");
    cmd
}

fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let input = tmp.path().join("input");
    fs::create_dir_all(input.join("nested")).unwrap();
    fs::write(
        input.join("main.js"),
        "var x = require('./x.js');\nmodule.exports = x + 1;\n",
    )
    .unwrap();
    fs::write(input.join("x.js"), "module.exports = 123321;\n").unwrap();
    fs::write(input.join("nested/main.js"), "module.exports = 420420;\n").unwrap();
    tmp
}

#[test]
fn test_build_requires_file_name() {
    let tmp = project();
    crawlpack(tmp.path())
        .args(["build", "--no-env", "-s", "input", "-d", "output"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("file_name"));
}

#[test]
fn test_build_from_flags() {
    let tmp = project();
    crawlpack(tmp.path())
        .args(["build", "--no-env", "-f", "main.js", "-s", "input", "-d", "output", "-c"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Built 2 entries"));

    let out = tmp.path().join("output");
    assert!(out.join("main.js").is_file());
    assert!(out.join("main.js.map").is_file());
    assert!(out.join("main.js.gz").is_file());
    assert!(out.join("nested/main.js.gz").is_file());
}

#[test]
fn test_build_from_config_file() {
    let tmp = project();
    fs::write(
        tmp.path().join("crawlpack.toml"),
        "file_name = \"main.js\"\nsource = \"input\"\ndest = \"build\"\ngzip = true\n",
    )
    .unwrap();

    crawlpack(tmp.path())
        .args(["build", "--no-env"])
        .assert()
        .success();

    let out = tmp.path().join("build");
    assert!(out.join("main.js.gz").is_file());
    // gzip alone does not minify
    let code = fs::read_to_string(out.join("main.js")).unwrap();
    assert!(code.contains("123321;\n"));
}

#[test]
fn test_failed_entry_fails_the_build() {
    let tmp = project();
    fs::write(
        tmp.path().join("input/nested/main.js"),
        "module.exports = require('./missing');\n",
    )
    .unwrap();

    crawlpack(tmp.path())
        .args(["build", "--no-env", "-f", "main.js", "-s", "input", "-d", "output"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 of 2 entries failed to build"));

    assert!(tmp.path().join("output/main.js").is_file());
}

#[test]
fn test_missing_source_is_reported() {
    let tmp = TempDir::new().unwrap();
    crawlpack(tmp.path())
        .args(["build", "--no-env", "-f", "main.js", "-s", "nowhere", "-d", "output"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_check_lists_entries() {
    let tmp = project();
    crawlpack(tmp.path())
        .args(["check", "--no-env", "-f", "main.js", "-s", "input", "-d", "output"])
        .assert()
        .success()
        .stdout(predicate::str::contains("file_name = \"main.js\""))
        .stdout(predicate::str::contains("nested/main.js"));

    assert!(!tmp.path().join("output").exists());
}

#[test]
fn test_unknown_config_key_is_rejected() {
    let tmp = project();
    fs::write(tmp.path().join("crawlpack.json"), r#"{ "fileName": "main.js" }"#).unwrap();

    crawlpack(tmp.path())
        .args(["check", "--no-env"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("fileName"));
}
