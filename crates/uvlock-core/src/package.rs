use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::decode::unique_keys;
use crate::error::IntegrityError;
use crate::hash::Hash;
use crate::metadata::PackageMetadata;
use crate::name::{ExtraName, GroupName, PackageName};
use crate::source::Source;
use crate::version::Version;

/// Where a distributable file can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactLocation {
  Url(String),
  Path(String),
  /// Only the file name is known; the index supplies the rest
  Filename(String),
}

impl ArtifactLocation {
  pub fn key(&self) -> &'static str {
    match self {
      Self::Url(_) => "url",
      Self::Path(_) => "path",
      Self::Filename(_) => "filename",
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::Url(s) | Self::Path(s) | Self::Filename(s) => s,
    }
  }
}

/// A source distribution or a wheel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "RawArtifact")]
pub struct Artifact {
  pub location: ArtifactLocation,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub hash: Option<Hash>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub size: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub upload_time: Option<String>,
  /// Keys this crate doesn't model, written back unchanged
  #[serde(skip_serializing_if = "toml::Table::is_empty")]
  pub unknown: toml::Table,
}

/// An artifact table as written, before checking it names exactly one location
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawArtifact {
  url: Option<String>,
  path: Option<String>,
  filename: Option<String>,
  hash: Option<Hash>,
  size: Option<u64>,
  upload_time: Option<String>,
}

impl TryFrom<RawArtifact> for Artifact {
  type Error = String;

  fn try_from(raw: RawArtifact) -> Result<Self, Self::Error> {
    let mut locations = [
      raw.url.map(ArtifactLocation::Url),
      raw.path.map(ArtifactLocation::Path),
      raw.filename.map(ArtifactLocation::Filename),
    ]
    .into_iter()
    .flatten();

    let location = locations
      .next()
      .ok_or("expected one of url, path, filename")?;
    if let Some(conflict) = locations.next() {
      return Err(format!(
        "conflicting artifact locations `{}` and `{}`",
        location.key(),
        conflict.key()
      ));
    }

    Ok(Self {
      location,
      hash: raw.hash,
      size: raw.size,
      upload_time: raw.upload_time,
      unknown: toml::Table::new(),
    })
  }
}

impl Artifact {
  pub fn new(location: ArtifactLocation) -> Self {
    Self {
      location,
      hash: None,
      size: None,
      upload_time: None,
      unknown: toml::Table::new(),
    }
  }

  #[must_use]
  pub fn with_hash(mut self, hash: Hash) -> Self {
    self.hash = Some(hash);
    self
  }

  #[must_use]
  pub fn with_size(mut self, size: u64) -> Self {
    self.size = Some(size);
    self
  }

  /// The file name: the last path segment, without any query or fragment
  pub fn filename(&self) -> &str {
    let location = self.location.as_str();
    let location = location.split(['?', '#']).next().unwrap_or(location);
    location.rsplit(['/', '\\']).next().unwrap_or(location)
  }

  /// Check fetched bytes against the recorded size and hash.
  /// The bytes must not be used if this fails.
  pub fn verify(&self, bytes: &[u8]) -> Result<(), IntegrityError> {
    if let Some(expected) = self.size {
      let actual = bytes.len() as u64;
      if actual != expected {
        return Err(IntegrityError::SizeMismatch { expected, actual });
      }
    }
    self.required_hash()?.verify(bytes)
  }

  /// Streaming variant of [`Artifact::verify`]; the size is checked after hashing
  pub fn verify_reader(&self, reader: impl Read) -> Result<(), IntegrityError> {
    let actual = self.required_hash()?.verify_reader(reader)?;
    match self.size {
      Some(expected) if expected != actual => Err(IntegrityError::SizeMismatch { expected, actual }),
      _ => Ok(()),
    }
  }

  fn required_hash(&self) -> Result<&Hash, IntegrityError> {
    self
      .hash
      .as_ref()
      .ok_or_else(|| IntegrityError::MissingHash(self.filename().to_string()))
  }
}

/// A resolved edge from one locked package to another
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Dependency {
  pub name: PackageName,
  /// Only written when the name alone is ambiguous
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<Version>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub source: Option<Source>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub extra: Vec<ExtraName>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub marker: Option<String>,
  #[serde(skip_deserializing, skip_serializing_if = "toml::Table::is_empty")]
  pub unknown: toml::Table,
}

impl Dependency {
  pub fn new(name: PackageName) -> Self {
    Self {
      name,
      version: None,
      source: None,
      extra: Vec::new(),
      marker: None,
      unknown: toml::Table::new(),
    }
  }

  #[must_use]
  pub fn with_version(mut self, version: Version) -> Self {
    self.version = Some(version);
    self
  }

  #[must_use]
  pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
    self.marker = Some(marker.into());
    self
  }
}

/// Name and version of a locked package, for messages and reports
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackageId {
  pub name: PackageName,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<Version>,
}

impl fmt::Display for PackageId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.version {
      Some(version) => write!(f, "{}=={version}", self.name),
      None => write!(f, "{}", self.name),
    }
  }
}

/// One `[[package]]` record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Package {
  pub name: PackageName,

  /// Missing for packages with dynamic versions
  #[serde(skip_serializing_if = "Option::is_none")]
  pub version: Option<Version>,

  pub source: Source,

  /// Environments this record was resolved for, when the resolution forked
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub resolution_markers: Vec<String>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub dependencies: Vec<Dependency>,

  #[serde(
    default,
    deserialize_with = "unique_keys",
    skip_serializing_if = "BTreeMap::is_empty"
  )]
  pub optional_dependencies: BTreeMap<ExtraName, Vec<Dependency>>,

  #[serde(
    default,
    deserialize_with = "unique_keys",
    skip_serializing_if = "BTreeMap::is_empty"
  )]
  pub dev_dependencies: BTreeMap<GroupName, Vec<Dependency>>,

  #[serde(skip_serializing_if = "Option::is_none")]
  pub sdist: Option<Artifact>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub wheels: Vec<Artifact>,

  /// What the project declared, as opposed to what was resolved
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata: Option<PackageMetadata>,

  #[serde(skip_deserializing, skip_serializing_if = "toml::Table::is_empty")]
  pub unknown: toml::Table,
}

impl Package {
  pub fn new(name: PackageName, source: Source) -> Self {
    Self {
      name,
      version: None,
      source,
      resolution_markers: Vec::new(),
      dependencies: Vec::new(),
      optional_dependencies: BTreeMap::new(),
      dev_dependencies: BTreeMap::new(),
      sdist: None,
      wheels: Vec::new(),
      metadata: None,
      unknown: toml::Table::new(),
    }
  }

  #[must_use]
  pub fn with_version(mut self, version: Version) -> Self {
    self.version = Some(version);
    self
  }

  #[must_use]
  pub fn with_dependency(mut self, dependency: Dependency) -> Self {
    self.dependencies.push(dependency);
    self
  }

  #[must_use]
  pub fn with_sdist(mut self, sdist: Artifact) -> Self {
    self.sdist = Some(sdist);
    self
  }

  #[must_use]
  pub fn with_wheel(mut self, wheel: Artifact) -> Self {
    self.wheels.push(wheel);
    self
  }

  #[must_use]
  pub fn with_metadata(mut self, metadata: PackageMetadata) -> Self {
    self.metadata = Some(metadata);
    self
  }

  pub fn id(&self) -> PackageId {
    PackageId {
      name: self.name.clone(),
      version: self.version.clone(),
    }
  }

  /// The sdist followed by every wheel
  pub fn artifacts(&self) -> impl Iterator<Item = &Artifact> {
    self.sdist.iter().chain(&self.wheels)
  }

  /// Normal, optional and dev dependency edges
  pub fn all_dependencies(&self) -> impl Iterator<Item = &Dependency> {
    self
      .dependencies
      .iter()
      .chain(self.optional_dependencies.values().flatten())
      .chain(self.dev_dependencies.values().flatten())
  }

  /// Look up an artifact by its file name
  pub fn find_artifact(&self, filename: &str) -> Option<&Artifact> {
    self.artifacts().find(|artifact| artifact.filename() == filename)
  }
}
