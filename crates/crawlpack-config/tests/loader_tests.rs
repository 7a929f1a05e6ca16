use std::fs;
use std::path::Path;

use crawlpack_config::{ConfigError, ConfigLoader, MinifyLevel, PipelineConfig};
use serial_test::serial;
use tempfile::TempDir;

#[test]
fn test_toml_file_is_found_in_cwd() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("crawlpack.toml"),
        r#"
file_name = "main.js"
source = "src"
dest = "dist"
compress = true
minify_level = "syntax"
concurrency = 4

[bundler]
ignoreMissing = true
"#,
    )
    .unwrap();

    let config = ConfigLoader::new(tmp.path())
        .without_env()
        .resolve()
        .unwrap();

    assert_eq!(config.file_name(), "main.js");
    assert_eq!(config.source(), tmp.path().join("src"));
    assert!(config.minify() && config.gzip());
    assert_eq!(config.minify_level(), MinifyLevel::Syntax);
    assert_eq!(config.concurrency(), 4);
    assert_eq!(
        config.bundler_options().get("ignoreMissing"),
        Some(&serde_json::Value::Bool(true))
    );
}

#[test]
fn test_explicit_json_file_and_overrides() {
    let tmp = TempDir::new().unwrap();
    let file = tmp.path().join("custom.json");
    fs::write(
        &file,
        r#"{ "file_name": "index.js", "source": "lib", "dest": "out", "watch": true }"#,
    )
    .unwrap();

    let overrides = PipelineConfig {
        dest: Some("elsewhere".into()),
        watch: Some(false),
        ..Default::default()
    };
    let config = ConfigLoader::new(tmp.path())
        .file("custom.json")
        .overrides(overrides)
        .without_env()
        .resolve()
        .unwrap();

    assert_eq!(config.file_name(), "index.js");
    assert_eq!(config.dest(), tmp.path().join("elsewhere"));
    assert!(!config.watch());
}

#[test]
fn test_missing_explicit_file() {
    let tmp = TempDir::new().unwrap();
    let err = ConfigLoader::new(tmp.path())
        .file("nope.toml")
        .without_env()
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::NotFound(path) if path.ends_with("nope.toml")));
}

#[test]
fn test_unsupported_extension() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("crawlpack.yaml"), "file_name: main.js").unwrap();
    let err = ConfigLoader::new(tmp.path())
        .file("crawlpack.yaml")
        .without_env()
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigError::UnsupportedFormat(ext) if ext == "yaml"));
}

#[test]
fn test_unknown_keys_are_rejected() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("crawlpack.toml"), "fileName = \"main.js\"\n").unwrap();
    let err = ConfigLoader::new(tmp.path()).without_env().load().unwrap_err();
    assert!(matches!(err, ConfigError::Load(_)));
}

#[test]
fn test_no_sources_reports_missing_field() {
    let tmp = TempDir::new().unwrap();
    let err = ConfigLoader::new(tmp.path())
        .without_env()
        .resolve()
        .unwrap_err();
    assert!(matches!(err, ConfigError::MissingField("file_name")));
}

#[test]
#[serial]
fn test_env_sits_between_file_and_overrides() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("crawlpack.toml"),
        "file_name = \"main.js\"\nsource = \"src\"\ndest = \"dist\"\nconcurrency = 2\n",
    )
    .unwrap();

    unsafe {
        std::env::set_var("CRAWLPACK_CONCURRENCY", "8");
        std::env::set_var("CRAWLPACK_DEST", "from-env");
    }
    let overrides = PipelineConfig {
        dest: Some("from-cli".into()),
        ..Default::default()
    };
    let result = ConfigLoader::new(tmp.path()).overrides(overrides).resolve();
    unsafe {
        std::env::remove_var("CRAWLPACK_CONCURRENCY");
        std::env::remove_var("CRAWLPACK_DEST");
    }

    let config = result.unwrap();
    assert_eq!(config.concurrency(), 8);
    assert_eq!(config.dest(), Path::new(&tmp.path().join("from-cli")));
}
