//! Runs the `uvlock` binary against the fixture lockfiles and checks exit codes
//! and output.

use pretty_assertions::assert_eq;
use rstest::rstest;
use std::path::{Path, PathBuf};
use std::process::Command;
use uvlock_core::Hash;
use uvlock_test::{fixtures_dir, load_fixture};

const SUCCESS: i32 = 0;
const FAILURE: i32 = 1;
const ERROR: i32 = 2;

struct CommandOutput {
  status: i32,
  stdout: String,
  stderr: String,
}

fn uvlock(args: &[&str]) -> CommandOutput {
  let output = Command::new(env!("CARGO_BIN_EXE_uvlock"))
    .args(args)
    .env_remove("RUST_LOG")
    .output()
    .unwrap_or_else(|e| panic!("Failed to run uvlock: {e}"));
  CommandOutput {
    status: output.status.code().unwrap_or(-1),
    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
  }
}

fn path_str(path: &Path) -> &str {
  path.to_str().expect("fixture paths are UTF-8")
}

fn write_lockfile(dir: &Path, contents: &str) -> PathBuf {
  let path = dir.join("uv.lock");
  std::fs::write(&path, contents).unwrap();
  path
}

#[rstest]
fn test_check_valid_fixtures(#[files("../../fixtures/*.lock")] fixture_path: PathBuf) {
  let output = uvlock(&["check", "--deny-warnings", path_str(&fixture_path)]);
  assert_eq!(output.status, SUCCESS, "{}{}", output.stdout, output.stderr);
  assert!(output.stdout.contains("0 errors, 0 warnings"), "{}", output.stdout);
}

#[rstest]
fn test_check_invalid_fixtures(#[files("../../fixtures/invalid/*.lock")] fixture_path: PathBuf) {
  let output = uvlock(&["check", path_str(&fixture_path)]);
  assert_eq!(output.status, FAILURE, "{}{}", output.stdout, output.stderr);
  assert!(output.stdout.starts_with("error: "), "{}", output.stdout);
}

#[test]
fn test_check_json_report() {
  let path = fixtures_dir().join("invalid/unsatisfied-requirement.lock");
  let output = uvlock(&["check", "--json", path_str(&path)]);
  assert_eq!(output.status, FAILURE);

  let report: serde_json::Value = serde_json::from_str(&output.stdout).unwrap();
  let issues = report["issues"].as_array().unwrap();
  assert_eq!(issues.len(), 1);
  assert_eq!(issues[0]["kind"], "unsatisfied-requirement");
  assert_eq!(issues[0]["satisfying"], 0);
}

#[rstest]
#[case("version = = 1\n")]
#[case("version = 2\n")]
#[case("version = 1\n[options]\n[options]\n")]
fn test_unreadable_lockfile_is_an_error(#[case] contents: &str) {
  let dir = tempfile::tempdir().unwrap();
  let path = write_lockfile(dir.path(), contents);
  let output = uvlock(&["check", path_str(&path)]);
  assert_eq!(output.status, ERROR);
  assert!(output.stderr.starts_with("Error: "), "{}", output.stderr);
}

#[test]
fn test_missing_file_is_an_error() {
  let dir = tempfile::tempdir().unwrap();
  let path = dir.path().join("missing.lock");
  for command in ["check", "fmt", "tree", "dump"] {
    let output = uvlock(&[command, path_str(&path)]);
    assert_eq!(output.status, ERROR, "{command}");
  }
}

#[test]
fn test_usage_error() {
  assert_eq!(uvlock(&["check"]).status, ERROR);
  assert_eq!(uvlock(&["verify", "uv.lock"]).status, ERROR);
  assert_eq!(uvlock(&["fmt", "--check", "--write", "uv.lock"]).status, ERROR);
}

#[rstest]
fn test_fmt_check_canonical(#[files("../../fixtures/*.lock")] fixture_path: PathBuf) {
  let output = uvlock(&["fmt", "--check", path_str(&fixture_path)]);
  assert_eq!(output.status, SUCCESS, "{}", output.stderr);
  assert!(output.stdout.is_empty());
}

#[test]
fn test_fmt_prints_canonical_text() {
  let path = fixtures_dir().join("expense-tracker.lock");
  let output = uvlock(&["fmt", path_str(&path)]);
  assert_eq!(output.status, SUCCESS);
  assert_eq!(output.stdout, load_fixture("expense-tracker.lock"));
}

#[test]
fn test_fmt_check_and_write_non_canonical() {
  let canonical = load_fixture("workspace.lock");
  let dir = tempfile::tempdir().unwrap();
  let path = write_lockfile(dir.path(), &format!("# edited by hand\n{canonical}"));

  let output = uvlock(&["fmt", "--check", path_str(&path)]);
  assert_eq!(output.status, FAILURE);
  assert!(output.stderr.contains("is not in canonical form"), "{}", output.stderr);

  let output = uvlock(&["fmt", "--write", path_str(&path)]);
  assert_eq!(output.status, SUCCESS, "{}", output.stderr);
  assert_eq!(std::fs::read_to_string(&path).unwrap(), canonical);

  assert_eq!(uvlock(&["fmt", "--check", path_str(&path)]).status, SUCCESS);
}

#[test]
fn test_fmt_write_keeps_resolver_keys() {
  let dir = tempfile::tempdir().unwrap();
  let path = write_lockfile(
    dir.path(),
    r#"version = 1
supported-markers = ["sys_platform == 'linux'"]
conflicts = [[{ package = "app", extra = "cpu" }, { package = "app", extra = "gpu" }]]

[manifest]
constraints = [{ name = "idna", specifier = "<3.7" }]

[[package]]
name = "app"
version = "0.1.0"
source = { virtual = "." }
"#,
  );

  let output = uvlock(&["fmt", "--write", path_str(&path)]);
  assert_eq!(output.status, SUCCESS, "{}", output.stderr);

  let rewritten = std::fs::read_to_string(&path).unwrap();
  for expected in [
    "supported-markers = [\n    \"sys_platform == 'linux'\",\n]",
    "conflicts = [[",
    "constraints = [\n    { name = \"idna\", specifier = \"<3.7\" },\n]",
  ] {
    assert!(rewritten.contains(expected), "missing `{expected}` in:\n{rewritten}");
  }
}

#[test]
fn test_verify() {
  let dir = tempfile::tempdir().unwrap();
  let wheel = "hello-1.0-py3-none-any.whl";
  let lockfile = write_lockfile(
    dir.path(),
    &format!(
      r#"version = 1

[[package]]
name = "hello"
version = "1.0"
source = {{ registry = "https://pypi.org/simple" }}
wheels = [
    {{ url = "https://files.example/{wheel}", hash = "{hash}", size = 11 }},
]
"#,
      hash = Hash::sha256(b"hello world"),
    ),
  );
  let artifact = dir.path().join(wheel);

  std::fs::write(&artifact, b"hello world").unwrap();
  let output = uvlock(&["verify", path_str(&lockfile), path_str(&artifact)]);
  assert_eq!(output.status, SUCCESS, "{}", output.stdout);
  assert_eq!(output.stdout, format!("ok: {wheel} (hello==1.0)\n"));

  std::fs::write(&artifact, b"hello world!").unwrap();
  let output = uvlock(&["verify", path_str(&lockfile), path_str(&artifact)]);
  assert_eq!(output.status, FAILURE);
  assert!(output.stdout.starts_with(&format!("failed: {wheel}")), "{}", output.stdout);

  let stranger = dir.path().join("other-2.0-py3-none-any.whl");
  std::fs::write(&stranger, b"hello world").unwrap();
  let output = uvlock(&["verify", path_str(&lockfile), path_str(&stranger)]);
  assert_eq!(output.status, FAILURE);
  assert!(output.stdout.starts_with("unknown: "), "{}", output.stdout);
}

#[test]
fn test_tree() {
  let path = fixtures_dir().join("expense-tracker.lock");
  let output = uvlock(&["tree", path_str(&path)]);
  assert_eq!(output.status, SUCCESS);

  let lines: Vec<&str> = output.stdout.lines().collect();
  assert_eq!(lines[0], "expense-tracker==0.1.0");
  assert!(lines.iter().any(|line| line.ends_with("── django==5.1.4")));
  assert!(lines.iter().any(|line| line.ends_with(" (*)")));
}

#[test]
fn test_dump_json() {
  let path = fixtures_dir().join("forked.lock");
  let output = uvlock(&["dump", "--format", "json", path_str(&path)]);
  assert_eq!(output.status, SUCCESS);

  let dump: serde_json::Value = serde_json::from_str(&output.stdout).unwrap();
  assert_eq!(dump["version"], 1);
  assert_eq!(dump["package"].as_array().map(Vec::len), Some(3));
}
