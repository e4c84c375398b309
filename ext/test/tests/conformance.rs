//! Conformance tests that run the YAML fixtures under `fixtures/`
//!
//! Run with: cargo test -p sift-test --test conformance

#![cfg(feature = "fixtures")]

use sift_test::config_fixture::ConfigFixture;
use sift_test::fixture::Fixture;
use std::fs;
use std::path::{Path, PathBuf};

fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// YAML files in a directory, sorted for a stable run order.
fn yaml_files(dir: &Path) -> Vec<PathBuf> {
    assert!(dir.exists(), "Fixtures directory does not exist: {}", dir.display());
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| path.extension().is_some_and(|e| e == "yaml" || e == "yml"))
        .collect();
    files.sort();
    assert!(!files.is_empty(), "no fixtures in {}", dir.display());
    files
}

#[test]
fn rule_fixtures() {
    for path in yaml_files(&fixtures_dir().join("rules")) {
        println!("Running fixture: {}", path.display());
        let yaml = fs::read_to_string(&path).expect("read yaml");
        let fixtures = Fixture::from_yaml_multi(&yaml).unwrap_or_else(|e| {
            panic!("Failed to parse {}: {}", path.display(), e);
        });
        for fixture in fixtures {
            println!("  Running: {}", fixture.name);
            fixture.run_and_assert();
        }
    }
}

#[test]
fn config_fixtures() {
    for path in yaml_files(&fixtures_dir().join("configs")) {
        println!("Running fixture: {}", path.display());
        let yaml = fs::read_to_string(&path).expect("read yaml");
        let fixtures = ConfigFixture::from_yaml_multi(&yaml).unwrap_or_else(|e| {
            panic!("Failed to parse {}: {}", path.display(), e);
        });
        for fixture in fixtures {
            println!("  Running: {}", fixture.name);
            fixture.run_and_assert();
        }
    }
}
