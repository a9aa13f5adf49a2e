//! Reads lockfile text into a typed [`Lockfile`].
//!
//! The `toml` crate parses and deserializes the document. Keys the model has no
//! field for are then collected from a second, untyped pass and stored on the
//! value they came from, so rendering writes them back out.
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use toml::{Table, Value};

use crate::error::ParseError;
use crate::lockfile::{Lockfile, Manifest, Options, SUPPORTED_VERSION};
use crate::metadata::{PackageMetadata, Requirement};
use crate::package::{Artifact, Dependency, Package};

/// Parse and decode a whole document
pub fn decode(text: &str) -> Result<Lockfile, ParseError> {
  let mut lockfile: Lockfile =
    toml::from_str(text).map_err(|e| ParseError::from_toml(text, &e))?;
  let document: Table = toml::from_str(text).map_err(|e| ParseError::from_toml(text, &e))?;
  retain_lockfile(&document, &mut lockfile);

  tracing::debug!(packages = lockfile.packages.len(), "decoded lockfile");
  Ok(lockfile)
}

/// The lock `version` key; anything but [`SUPPORTED_VERSION`] is refused
pub(crate) fn lock_version<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
  let version = i64::deserialize(deserializer)?;
  if version != i64::from(SUPPORTED_VERSION) {
    return Err(de::Error::custom(format!(
      "unsupported lockfile version {version}"
    )));
  }
  Ok(SUPPORTED_VERSION)
}

/// A table of named groups. Two keys that normalize to the same name
/// (`Dev` and `dev`) are an error instead of one replacing the other.
pub(crate) fn unique_keys<'de, D, K, V>(deserializer: D) -> Result<BTreeMap<K, V>, D::Error>
where
  D: Deserializer<'de>,
  K: Deserialize<'de> + Ord + fmt::Display,
  V: Deserialize<'de>,
{
  struct UniqueKeys<K, V>(PhantomData<(K, V)>);

  impl<'de, K, V> Visitor<'de> for UniqueKeys<K, V>
  where
    K: Deserialize<'de> + Ord + fmt::Display,
    V: Deserialize<'de>,
  {
    type Value = BTreeMap<K, V>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str("a table of groups")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
      let mut groups = BTreeMap::new();
      while let Some(key) = map.next_key::<K>()? {
        if groups.contains_key(&key) {
          return Err(de::Error::custom(format!("duplicate group `{key}`")));
        }
        let value = map.next_value()?;
        groups.insert(key, value);
      }
      Ok(groups)
    }
  }

  deserializer.deserialize_map(UniqueKeys(PhantomData))
}

/// A model type with a table of keys it doesn't recognize
trait Unknown {
  const KEYS: &'static [&'static str];

  fn unknown_mut(&mut self) -> &mut Table;
}

impl Unknown for Lockfile {
  const KEYS: &'static [&'static str] = &[
    "version",
    "revision",
    "requires-python",
    "resolution-markers",
    "supported-markers",
    "options",
    "manifest",
    "package",
  ];

  fn unknown_mut(&mut self) -> &mut Table {
    &mut self.unknown
  }
}

impl Unknown for Options {
  const KEYS: &'static [&'static str] = &["resolution-mode", "prerelease-mode", "exclude-newer"];

  fn unknown_mut(&mut self) -> &mut Table {
    &mut self.unknown
  }
}

impl Unknown for Manifest {
  const KEYS: &'static [&'static str] = &[
    "members",
    "requirements",
    "constraints",
    "overrides",
    "dependency-groups",
  ];

  fn unknown_mut(&mut self) -> &mut Table {
    &mut self.unknown
  }
}

impl Unknown for Package {
  const KEYS: &'static [&'static str] = &[
    "name",
    "version",
    "source",
    "resolution-markers",
    "dependencies",
    "optional-dependencies",
    "dev-dependencies",
    "sdist",
    "wheels",
    "metadata",
  ];

  fn unknown_mut(&mut self) -> &mut Table {
    &mut self.unknown
  }
}

impl Unknown for Dependency {
  const KEYS: &'static [&'static str] = &["name", "version", "source", "extra", "marker"];

  fn unknown_mut(&mut self) -> &mut Table {
    &mut self.unknown
  }
}

impl Unknown for Artifact {
  const KEYS: &'static [&'static str] = &["url", "path", "filename", "hash", "size", "upload-time"];

  fn unknown_mut(&mut self) -> &mut Table {
    &mut self.unknown
  }
}

impl Unknown for PackageMetadata {
  const KEYS: &'static [&'static str] = &["requires-dist", "requires-dev", "provides-extras"];

  fn unknown_mut(&mut self) -> &mut Table {
    &mut self.unknown
  }
}

impl Unknown for Requirement {
  const KEYS: &'static [&'static str] = &[
    "name",
    "extras",
    "marker",
    "index",
    "specifier",
    "registry",
    "git",
    "url",
    "path",
    "directory",
    "editable",
    "virtual",
  ];

  fn unknown_mut(&mut self) -> &mut Table {
    &mut self.unknown
  }
}

fn retain_lockfile(document: &Table, lockfile: &mut Lockfile) {
  retain(document, lockfile, "");

  if let Some(raw) = table(document, "options") {
    retain(raw, &mut lockfile.options, "options");
  }

  if let Some(raw) = table(document, "manifest") {
    let manifest = &mut lockfile.manifest;
    retain(raw, manifest, "manifest");
    retain_array(raw, "requirements", &mut manifest.requirements, "manifest");
    retain_array(raw, "constraints", &mut manifest.constraints, "manifest");
    retain_array(raw, "overrides", &mut manifest.overrides, "manifest");
    retain_groups(raw, "dependency-groups", &mut manifest.dependency_groups, "manifest");
  }

  for (i, (raw, package)) in tables(document, "package")
    .zip(&mut lockfile.packages)
    .enumerate()
  {
    let path = format!("package[{i}]");
    retain(raw, package, &path);
    retain_array(raw, "dependencies", &mut package.dependencies, &path);
    retain_groups(raw, "optional-dependencies", &mut package.optional_dependencies, &path);
    retain_groups(raw, "dev-dependencies", &mut package.dev_dependencies, &path);
    if let (Some(raw), Some(sdist)) = (table(raw, "sdist"), package.sdist.as_mut()) {
      retain(raw, sdist, &join(&path, "sdist"));
    }
    retain_array(raw, "wheels", &mut package.wheels, &path);

    if let (Some(raw), Some(metadata)) = (table(raw, "metadata"), package.metadata.as_mut()) {
      let path = join(&path, "metadata");
      retain(raw, metadata, &path);
      retain_array(raw, "requires-dist", &mut metadata.requires_dist, &path);
      retain_groups(raw, "requires-dev", &mut metadata.requires_dev, &path);
    }
  }
}

fn retain<T: Unknown>(raw: &Table, item: &mut T, path: &str) {
  *item.unknown_mut() = raw
    .iter()
    .filter(|(key, _)| !T::KEYS.contains(&key.as_str()))
    .map(|(key, value)| {
      tracing::debug!(key = %join(path, key), "keeping unrecognized lockfile key");
      (key.clone(), value.clone())
    })
    .collect();
}

fn retain_array<T: Unknown>(raw: &Table, key: &str, items: &mut [T], path: &str) {
  let path = join(path, key);
  for (i, (raw, item)) in tables(raw, key).zip(items).enumerate() {
    retain(raw, item, &format!("{path}[{i}]"));
  }
}

fn retain_groups<K, T>(raw: &Table, key: &str, groups: &mut BTreeMap<K, Vec<T>>, path: &str)
where
  K: FromStr + Ord,
  T: Unknown,
{
  let Some(raw) = table(raw, key) else {
    return;
  };
  let path = join(path, key);
  for group in raw.keys() {
    let Ok(name) = group.parse::<K>() else {
      continue;
    };
    if let Some(items) = groups.get_mut(&name) {
      retain_array(raw, group, items, &path);
    }
  }
}

fn table<'a>(raw: &'a Table, key: &str) -> Option<&'a Table> {
  raw.get(key).and_then(Value::as_table)
}

fn tables<'a>(raw: &'a Table, key: &str) -> impl Iterator<Item = &'a Table> {
  raw
    .get(key)
    .and_then(Value::as_array)
    .into_iter()
    .flatten()
    .filter_map(Value::as_table)
}

fn join(path: &str, key: &str) -> String {
  if path.is_empty() {
    key.to_string()
  } else {
    format!("{path}.{key}")
  }
}
