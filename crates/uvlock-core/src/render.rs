//! Writes a [`Lockfile`] back out in the layout the package manager uses, so a
//! decoded file renders byte-for-byte identical when it was canonical to begin with.
//! Keys the model doesn't know are written back after the known ones.
use std::collections::BTreeMap;

use toml::{Table, Value};

use crate::lockfile::Lockfile;
use crate::metadata::Requirement;
use crate::package::{Artifact, Dependency, Package};
use crate::source::Source;

const INDENT: &str = "    ";

pub fn render(lockfile: &Lockfile) -> String {
  let mut out = Writer::default();

  out.key_value("version", &lockfile.version.to_string());
  if let Some(revision) = lockfile.revision {
    out.key_value("revision", &revision.to_string());
  }
  if let Some(requires_python) = &lockfile.requires_python {
    out.key_value("requires-python", &quote(&requires_python.to_string()));
  }
  out.multiline_array(
    "resolution-markers",
    lockfile.resolution_markers.iter().map(|m| quote(m)),
    false,
  );
  out.multiline_array(
    "supported-markers",
    lockfile.supported_markers.iter().map(|m| quote(m)),
    false,
  );
  out.unknown_keys(&lockfile.unknown);

  let options = &lockfile.options;
  if !options.is_empty() {
    out.header("[options]");
    let settings = [
      ("resolution-mode", &options.resolution_mode),
      ("prerelease-mode", &options.prerelease_mode),
      ("exclude-newer", &options.exclude_newer),
    ];
    for (name, setting) in settings {
      if let Some(setting) = setting {
        out.key_value(name, &quote(setting));
      }
    }
    out.unknown_keys(&options.unknown);
    out.unknown_tables("options", &options.unknown);
  }

  let manifest = &lockfile.manifest;
  if !manifest.is_empty() {
    out.header("[manifest]");
    out.multiline_array(
      "members",
      manifest.members.iter().map(|m| quote(m.as_str())),
      false,
    );
    let lists = [
      ("requirements", &manifest.requirements),
      ("constraints", &manifest.constraints),
      ("overrides", &manifest.overrides),
    ];
    for (name, requirements) in lists {
      out.multiline_array(name, requirements.iter().map(requirement_inline), false);
    }
    out.unknown_keys(&manifest.unknown);

    if !manifest.dependency_groups.is_empty() {
      out.header("[manifest.dependency-groups]");
      for (group, requirements) in &manifest.dependency_groups {
        out.multiline_array(
          &key(group.as_str()),
          requirements.iter().map(requirement_inline),
          true,
        );
      }
    }
    out.unknown_tables("manifest", &manifest.unknown);
  }

  out.unknown_tables("", &lockfile.unknown);

  for package in &lockfile.packages {
    render_package(&mut out, package);
  }

  out.finish()
}

fn render_package(out: &mut Writer, package: &Package) {
  out.header("[[package]]");
  out.key_value("name", &quote(package.name.as_str()));
  if let Some(version) = &package.version {
    out.key_value("version", &quote(&version.to_string()));
  }
  out.key_value("source", &source_inline(&package.source));
  out.multiline_array(
    "resolution-markers",
    package.resolution_markers.iter().map(|m| quote(m)),
    false,
  );
  out.multiline_array(
    "dependencies",
    package.dependencies.iter().map(dependency_inline),
    false,
  );
  if let Some(sdist) = &package.sdist {
    out.key_value("sdist", &artifact_inline(sdist));
  }
  out.multiline_array("wheels", package.wheels.iter().map(artifact_inline), false);
  out.unknown_keys(&package.unknown);

  render_dependency_groups(out, "[package.optional-dependencies]", &package.optional_dependencies);
  render_dependency_groups(out, "[package.dev-dependencies]", &package.dev_dependencies);

  if let Some(metadata) = &package.metadata {
    out.header("[package.metadata]");
    out.multiline_array(
      "requires-dist",
      metadata.requires_dist.iter().map(requirement_inline),
      false,
    );
    if !metadata.provides_extras.is_empty() {
      out.key_value(
        "provides-extras",
        &inline_array(metadata.provides_extras.iter().map(|e| quote(e.as_str()))),
      );
    }
    out.unknown_keys(&metadata.unknown);

    if !metadata.requires_dev.is_empty() {
      out.header("[package.metadata.requires-dev]");
      for (group, requirements) in &metadata.requires_dev {
        out.multiline_array(
          &key(group.as_str()),
          requirements.iter().map(requirement_inline),
          true,
        );
      }
    }
    out.unknown_tables("package.metadata", &metadata.unknown);
  }

  out.unknown_tables("package", &package.unknown);
}

fn render_dependency_groups<K: AsRef<str>>(
  out: &mut Writer,
  header: &str,
  groups: &BTreeMap<K, Vec<Dependency>>,
) {
  if groups.is_empty() {
    return;
  }
  out.header(header);
  for (group, dependencies) in groups {
    out.multiline_array(
      &key(group.as_ref()),
      dependencies.iter().map(dependency_inline),
      true,
    );
  }
}

fn source_inline(source: &Source) -> String {
  inline_table(&[(source.kind(), quote(source.location()))])
}

fn push_unknown<'a>(pairs: &mut Vec<(&'a str, String)>, unknown: &'a Table) {
  pairs.extend(unknown.iter().map(|(k, v)| (k.as_str(), v.to_string())));
}

fn dependency_inline(dependency: &Dependency) -> String {
  let mut pairs = vec![("name", quote(dependency.name.as_str()))];
  if let Some(version) = &dependency.version {
    pairs.push(("version", quote(&version.to_string())));
  }
  if let Some(source) = &dependency.source {
    pairs.push(("source", source_inline(source)));
  }
  if !dependency.extra.is_empty() {
    pairs.push((
      "extra",
      inline_array(dependency.extra.iter().map(|e| quote(e.as_str()))),
    ));
  }
  if let Some(marker) = &dependency.marker {
    pairs.push(("marker", quote(marker)));
  }
  push_unknown(&mut pairs, &dependency.unknown);
  inline_table(&pairs)
}

fn artifact_inline(artifact: &Artifact) -> String {
  let mut pairs = vec![(artifact.location.key(), quote(artifact.location.as_str()))];
  if let Some(hash) = &artifact.hash {
    pairs.push(("hash", quote(&hash.to_string())));
  }
  if let Some(size) = artifact.size {
    pairs.push(("size", size.to_string()));
  }
  if let Some(upload_time) = &artifact.upload_time {
    pairs.push(("upload-time", quote(upload_time)));
  }
  push_unknown(&mut pairs, &artifact.unknown);
  inline_table(&pairs)
}

fn requirement_inline(requirement: &Requirement) -> String {
  let mut pairs = vec![("name", quote(requirement.name.as_str()))];
  if !requirement.extras.is_empty() {
    pairs.push((
      "extras",
      inline_array(requirement.extras.iter().map(|e| quote(e.as_str()))),
    ));
  }
  if let Some(marker) = &requirement.marker {
    pairs.push(("marker", quote(marker)));
  }
  if let Some(index) = &requirement.index {
    pairs.push(("index", quote(index)));
  }
  if let Some(source) = &requirement.source {
    pairs.push((source.kind(), quote(source.location())));
  }
  if let Some(specifier) = &requirement.specifier {
    pairs.push(("specifier", quote(&specifier.to_string())));
  }
  push_unknown(&mut pairs, &requirement.unknown);
  inline_table(&pairs)
}

fn inline_table(pairs: &[(&str, String)]) -> String {
  if pairs.is_empty() {
    return "{}".to_string();
  }
  let body: Vec<String> = pairs
    .iter()
    .map(|(k, v)| format!("{} = {v}", key(k)))
    .collect();
  format!("{{ {} }}", body.join(", "))
}

fn inline_array(items: impl Iterator<Item = String>) -> String {
  format!("[{}]", items.collect::<Vec<_>>().join(", "))
}

/// Bare keys stay bare, anything else is quoted
fn key(raw: &str) -> String {
  let bare = !raw.is_empty()
    && raw
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
  if bare { raw.to_string() } else { quote(raw) }
}

/// A TOML basic string
fn quote(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len() + 2);
  out.push('"');
  for c in raw.chars() {
    match c {
      '"' => out.push_str("\\\""),
      '\\' => out.push_str("\\\\"),
      '\n' => out.push_str("\\n"),
      '\t' => out.push_str("\\t"),
      '\r' => out.push_str("\\r"),
      c if c.is_control() => out.push_str(&format!("\\u{:04X}", u32::from(c))),
      c => out.push(c),
    }
  }
  out.push('"');
  out
}

#[derive(Default)]
struct Writer {
  out: String,
}

impl Writer {
  fn line(&mut self, line: &str) {
    self.out.push_str(line);
    self.out.push('\n');
  }

  /// A table header, separated from what came before by a blank line
  fn header(&mut self, header: &str) {
    if !self.out.is_empty() {
      self.out.push('\n');
    }
    self.line(header);
  }

  fn key_value(&mut self, key: &str, value: &str) {
    self.line(&format!("{key} = {value}"));
  }

  /// One item per line with a trailing comma. Empty arrays are skipped unless
  /// `keep_empty`, for keys whose presence matters (dependency groups).
  fn multiline_array(&mut self, key: &str, items: impl Iterator<Item = String>, keep_empty: bool) {
    let items: Vec<String> = items.collect();
    if items.is_empty() {
      if keep_empty {
        self.key_value(key, "[]");
      }
      return;
    }
    self.line(&format!("{key} = ["));
    for item in items {
      self.line(&format!("{INDENT}{item},"));
    }
    self.line("]");
  }

  /// Unknown keys other than tables, inline
  fn unknown_keys(&mut self, unknown: &Table) {
    for (name, value) in unknown.iter().filter(|(_, value)| !value.is_table()) {
      self.key_value(&key(name), &value.to_string());
    }
  }

  /// Unknown tables, each under its own `[prefix.name]` header
  fn unknown_tables(&mut self, prefix: &str, unknown: &Table) {
    for (name, value) in unknown {
      let Value::Table(table) = value else {
        continue;
      };
      let name = key(name);
      if prefix.is_empty() {
        self.header(&format!("[{name}]"));
      } else {
        self.header(&format!("[{prefix}.{name}]"));
      }
      for (name, value) in table {
        self.key_value(&key(name), &value.to_string());
      }
    }
  }

  fn finish(self) -> String {
    self.out
  }
}
