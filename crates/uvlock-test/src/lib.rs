#![deny(clippy::all)]
//! End-to-end tests for the uv lockfile model
//!
//! Runs the parser, validator and renderer over the lockfiles in `fixtures/`,
//! and exercises artifact verification against real files on disk.

use std::path::{Path, PathBuf};

/// The workspace `fixtures/` directory
pub fn fixtures_dir() -> PathBuf {
  Path::new(env!("CARGO_MANIFEST_DIR"))
    .join("../..")
    .join("fixtures")
}

/// Load a fixture file from the fixtures directory
pub fn load_fixture(filename: &str) -> String {
  load_fixture_from_path(&fixtures_dir().join(filename))
}

/// Load a fixture file from a path
pub fn load_fixture_from_path(fixture_path: &Path) -> String {
  std::fs::read_to_string(fixture_path).unwrap_or_else(|e| {
    panic!(
      "Failed to read fixture file {}: {}",
      fixture_path.display(),
      e
    )
  })
}
