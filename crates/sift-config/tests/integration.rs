//! Integration tests for sift-config.
//!
//! Tests the full configuration loading pipeline: discovery -> parse -> merge.

// Integration tests live outside cfg(test) by design
#![allow(clippy::tests_outside_test_module)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use sift_config::{Config, ConfigError, FilterKind, TokenizerKind};

/// Test helper to create a temporary directory structure for tests.
struct TestEnv {
    root: tempfile::TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            root: tempfile::tempdir().unwrap(),
        }
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    /// Creates a directory and returns its path.
    fn create_dir(&self, rel_path: &str) -> PathBuf {
        let path = self.root.path().join(rel_path);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// Creates a file with content and returns its path.
    fn create_file(&self, rel_path: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }
}

#[test]
fn test_load_root_config_only() {
    let env = TestEnv::new();
    env.create_file(
        ".sift.toml",
        r#"
root = true

[search]
default_size = 20
default_analyzer = "english"
"#,
    );

    let config = Config::load(env.path()).unwrap();

    assert_eq!(config.search.default_size, 20);
    assert_eq!(config.search.default_analyzer, "english");
    // Unset values keep their defaults
    assert_eq!(config.search.max_results, 10_000);
    assert_eq!(config.search.max_nesting_depth, 20);
    assert_eq!(config.config_root.as_deref(), Some(env.path()));
}

#[test]
fn test_load_nested_configs_closest_wins() {
    let env = TestEnv::new();
    env.create_file(
        ".sift.toml",
        r#"
root = true

[search]
max_results = 1000
default_size = 50

[analyzer.body]
tokenizer = "simple"
filters = ["lowercase"]
"#,
    );
    env.create_file(
        "service/.sift.toml",
        r#"
[search]
max_results = 100

[analyzer.body]
tokenizer = "whitespace"
filters = ["lowercase", "ascii_folding"]

[analyzer.tags]
tokenizer = "keyword"
"#,
    );
    let cwd = env.create_dir("service/handlers");

    let config = Config::load(&cwd).unwrap();

    assert_eq!(config.search.max_results, 100);
    assert_eq!(config.search.default_size, 50);
    assert_eq!(config.analyzers.len(), 2);
    let body = &config.analyzers["body"];
    assert_eq!(body.tokenizer, TokenizerKind::Whitespace);
    assert_eq!(
        body.filters,
        vec![FilterKind::Lowercase, FilterKind::AsciiFolding]
    );
    assert_eq!(config.config_root, Some(env.path().join("service")));
}

#[test]
fn test_root_marker_hides_parent_configs() {
    let env = TestEnv::new();
    env.create_file(".sift.toml", "[search]\nmax_results = 5\n");
    env.create_file("project/.sift.toml", "root = true\n");
    let cwd = env.create_dir("project/src");

    let config = Config::load(&cwd).unwrap();
    assert_eq!(config.search.max_results, 10_000);
}

#[test]
fn test_load_from_files_reports_parse_errors() {
    let env = TestEnv::new();
    let path = env.create_file("bad/.sift.toml", "[search\nmax_results = 1\n");

    let err = Config::load_from_files(&[path.clone()]).unwrap_err();
    match err {
        ConfigError::ParseToml { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("expected ParseToml, got {other:?}"),
    }
}

#[test]
fn test_load_from_missing_file() {
    let env = TestEnv::new();
    let path = env.path().join("missing.toml");

    let err = Config::load_from_files(&[path]).unwrap_err();
    assert!(matches!(err, ConfigError::ReadFile { .. }));
}

#[test]
fn test_invalid_nesting_depth_rejected() {
    let env = TestEnv::new();
    let path = env.create_file(".sift.toml", "[search]\nmax_nesting_depth = 0\n");

    let err = Config::load_from_files(&[path]).unwrap_err();
    match err {
        ConfigError::InvalidSetting { name, .. } => assert_eq!(name, "search.max_nesting_depth"),
        other => panic!("expected InvalidSetting, got {other:?}"),
    }
}

#[test]
fn test_settings_round_trip_through_toml() {
    let env = TestEnv::new();
    let path = env.create_file(
        ".sift.toml",
        r#"
[search]
default_size = 15

[analyzer.french_text]
tokenizer = "simple"
filters = ["lowercase", "stop", "stemmer"]
language = "french"
"#,
    );
    let config = Config::load_from_files(&[path]).unwrap();

    let printed = config.settings_to_toml().unwrap();
    let reparsed_path = env.create_file("copy/.sift.toml", &printed);
    let reparsed = Config::load_from_files(&[reparsed_path]).unwrap();

    assert_eq!(reparsed.search, config.search);
    assert_eq!(reparsed.analyzers, config.analyzers);
}
