use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::decode::unique_keys;
use crate::name::{ExtraName, GroupName, PackageName};
use crate::source::Source;
use crate::specifier::VersionSpecifiers;

/// A requirement as the project declared it (`django>=5.1.4`), kept apart from
/// the resolved dependency edges so the lockfile can be checked against it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRequirement")]
pub struct Requirement {
  pub name: PackageName,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub extras: Vec<ExtraName>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub marker: Option<String>,
  /// Pinned index name or URL
  #[serde(skip_serializing_if = "Option::is_none")]
  pub index: Option<String>,
  /// Direct source (git, path, ...) instead of an index
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<Source>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub specifier: Option<VersionSpecifiers>,
  /// Keys this crate doesn't model, written back unchanged
  #[serde(skip_serializing_if = "toml::Table::is_empty")]
  pub unknown: toml::Table,
}

/// A requirement table as written. The source, if any, is spread over one
/// key per kind (`{ name = "lib", editable = "packages/lib" }`).
#[derive(Deserialize)]
struct RawRequirement {
  name: PackageName,
  #[serde(default)]
  extras: Vec<ExtraName>,
  marker: Option<String>,
  index: Option<String>,
  specifier: Option<VersionSpecifiers>,
  registry: Option<String>,
  git: Option<String>,
  url: Option<String>,
  path: Option<String>,
  directory: Option<String>,
  editable: Option<String>,
  #[serde(rename = "virtual")]
  virtual_: Option<String>,
}

impl TryFrom<RawRequirement> for Requirement {
  type Error = String;

  fn try_from(raw: RawRequirement) -> Result<Self, Self::Error> {
    let mut sources = [
      raw.registry.map(Source::Registry),
      raw.git.map(Source::Git),
      raw.url.map(Source::Url),
      raw.path.map(Source::Path),
      raw.directory.map(Source::Directory),
      raw.editable.map(Source::Editable),
      raw.virtual_.map(Source::Virtual),
    ]
    .into_iter()
    .flatten();

    let source = sources.next();
    if let (Some(first), Some(second)) = (&source, sources.next()) {
      return Err(format!(
        "conflicting source kinds `{}` and `{}` for {}",
        first.kind(),
        second.kind(),
        raw.name
      ));
    }

    Ok(Self {
      name: raw.name,
      extras: raw.extras,
      marker: raw.marker,
      index: raw.index,
      source,
      specifier: raw.specifier,
      unknown: toml::Table::new(),
    })
  }
}

impl Requirement {
  pub fn new(name: PackageName) -> Self {
    Self {
      name,
      extras: Vec::new(),
      marker: None,
      index: None,
      source: None,
      specifier: None,
      unknown: toml::Table::new(),
    }
  }

  #[must_use]
  pub fn with_specifier(mut self, specifier: VersionSpecifiers) -> Self {
    self.specifier = Some(specifier);
    self
  }
}

impl fmt::Display for Requirement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name)?;
    if !self.extras.is_empty() {
      let extras: Vec<&str> = self.extras.iter().map(ExtraName::as_str).collect();
      write!(f, "[{}]", extras.join(","))?;
    }
    if let Some(specifier) = &self.specifier {
      write!(f, "{specifier}")?;
    }
    if let Some(source) = &self.source {
      write!(f, " @ {source}")?;
    }
    if let Some(marker) = &self.marker {
      write!(f, " ; {marker}")?;
    }
    Ok(())
  }
}

/// The `[package.metadata]` table of a local project
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageMetadata {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub requires_dist: Vec<Requirement>,

  /// `[package.metadata.requires-dev]`, keyed by dependency group
  #[serde(
    default,
    deserialize_with = "unique_keys",
    skip_serializing_if = "BTreeMap::is_empty"
  )]
  pub requires_dev: BTreeMap<GroupName, Vec<Requirement>>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub provides_extras: Vec<ExtraName>,

  #[serde(skip_deserializing, skip_serializing_if = "toml::Table::is_empty")]
  pub unknown: toml::Table,
}

impl PackageMetadata {
  /// Every declared requirement, runtime first, then each dev group
  pub fn requirements(&self) -> impl Iterator<Item = &Requirement> {
    self
      .requires_dist
      .iter()
      .chain(self.requires_dev.values().flatten())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_requirement_display() {
    let mut requirement = Requirement::new(PackageName::new("Django").unwrap())
      .with_specifier(">=5.1.4".parse().unwrap());
    assert_eq!(requirement.to_string(), "django>=5.1.4");

    requirement.extras = vec![ExtraName::new("argon2").unwrap()];
    requirement.marker = Some("sys_platform == 'linux'".to_string());
    assert_eq!(
      requirement.to_string(),
      "django[argon2]>=5.1.4 ; sys_platform == 'linux'"
    );
  }

  #[test]
  fn test_requirement_display_with_source() {
    let mut requirement = Requirement::new(PackageName::new("lib").unwrap());
    requirement.source = Some(Source::Editable("packages/lib".into()));
    assert_eq!(requirement.to_string(), "lib @ editable+packages/lib");
  }

  #[test]
  fn test_requirements_iterates_dev_groups() {
    let mut metadata = PackageMetadata {
      requires_dist: vec![Requirement::new(PackageName::new("a").unwrap())],
      ..PackageMetadata::default()
    };
    metadata.requires_dev.insert(
      GroupName::new("dev").unwrap(),
      vec![Requirement::new(PackageName::new("pytest").unwrap())],
    );
    let names: Vec<_> = metadata.requirements().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["a", "pytest"]);
  }
}
