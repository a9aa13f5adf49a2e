use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::decode::unique_keys;
use crate::error::{LockError, Result};
use crate::metadata::Requirement;
use crate::name::{GroupName, PackageName};
use crate::package::Package;
use crate::specifier::VersionSpecifiers;
use crate::{decode, render};

/// The only lockfile schema version this crate reads and writes
pub const SUPPORTED_VERSION: u32 = 1;

/// A parsed `uv.lock`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Lockfile {
  /// Schema version, always [`SUPPORTED_VERSION`]
  #[serde(deserialize_with = "decode::lock_version")]
  pub version: u32,

  /// Minor schema revision, bumped for backwards-compatible changes
  #[serde(skip_serializing_if = "Option::is_none")]
  pub revision: Option<u32>,

  /// The interpreter range the resolution is valid for
  #[serde(skip_serializing_if = "Option::is_none")]
  pub requires_python: Option<VersionSpecifiers>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub resolution_markers: Vec<String>,

  /// Environments the resolution must cover
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub supported_markers: Vec<String>,

  #[serde(default)]
  pub options: Options,

  #[serde(default)]
  pub manifest: Manifest,

  /// The entries in the lockfile
  #[serde(default, rename = "package")]
  pub packages: Vec<Package>,

  /// Top-level keys this crate doesn't model (such as `conflicts`), written back unchanged
  #[serde(skip_deserializing, skip_serializing_if = "toml::Table::is_empty")]
  pub unknown: toml::Table,
}

/// Resolver settings recorded in `[options]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Options {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub resolution_mode: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub prerelease_mode: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub exclude_newer: Option<String>,
  #[serde(skip_deserializing, skip_serializing_if = "toml::Table::is_empty")]
  pub unknown: toml::Table,
}

impl Options {
  pub fn is_empty(&self) -> bool {
    self.resolution_mode.is_none()
      && self.prerelease_mode.is_none()
      && self.exclude_newer.is_none()
      && self.unknown.is_empty()
  }
}

/// Workspace information recorded in `[manifest]`: members, plus the
/// requirements, constraints, overrides and groups given to the resolver
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub members: Vec<PackageName>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub requirements: Vec<Requirement>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub constraints: Vec<Requirement>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub overrides: Vec<Requirement>,

  /// `[manifest.dependency-groups]` of a project without a `[project]` table
  #[serde(
    default,
    deserialize_with = "unique_keys",
    skip_serializing_if = "BTreeMap::is_empty"
  )]
  pub dependency_groups: BTreeMap<GroupName, Vec<Requirement>>,

  #[serde(skip_deserializing, skip_serializing_if = "toml::Table::is_empty")]
  pub unknown: toml::Table,
}

impl Manifest {
  pub fn is_empty(&self) -> bool {
    self.members.is_empty()
      && self.requirements.is_empty()
      && self.constraints.is_empty()
      && self.overrides.is_empty()
      && self.dependency_groups.is_empty()
      && self.unknown.is_empty()
  }
}

impl Lockfile {
  pub fn new() -> Self {
    Self {
      version: SUPPORTED_VERSION,
      revision: None,
      requires_python: None,
      resolution_markers: Vec::new(),
      supported_markers: Vec::new(),
      options: Options::default(),
      manifest: Manifest::default(),
      packages: Vec::new(),
      unknown: toml::Table::new(),
    }
  }

  #[must_use]
  pub fn with_requires_python(mut self, requires_python: VersionSpecifiers) -> Self {
    self.requires_python = Some(requires_python);
    self
  }

  #[must_use]
  pub fn with_package(mut self, package: Package) -> Self {
    self.packages.push(package);
    self
  }

  /// Read and parse a lockfile from disk
  pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "reading lockfile");
    let contents = std::fs::read_to_string(path)?;
    contents.parse()
  }

  /// Serialize in the canonical layout
  pub fn to_toml(&self) -> String {
    render::render(self)
  }

  /// Every record with the given name (more than one when the resolution forked)
  pub fn packages_named<'a>(&'a self, name: &'a PackageName) -> impl Iterator<Item = &'a Package> {
    self.packages.iter().filter(move |package| &package.name == name)
  }

  /// Records describing the local project(s) rather than fetched dependencies
  pub fn local_projects(&self) -> impl Iterator<Item = &Package> {
    self
      .packages
      .iter()
      .filter(|package| package.source.is_local_project())
  }
}

impl Default for Lockfile {
  fn default() -> Self {
    Self::new()
  }
}

impl FromStr for Lockfile {
  type Err = LockError;

  fn from_str(s: &str) -> Result<Self> {
    Ok(decode::decode(s)?)
  }
}

impl fmt::Display for Lockfile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_toml())
  }
}
