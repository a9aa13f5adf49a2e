// Types from
// https://packaging.python.org/en/latest/specifications/name-normalization/
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, de};

/// The name is not a valid distribution, extra or group name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidName(pub String);

impl fmt::Display for InvalidName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "invalid name `{}`", self.0)
  }
}

impl std::error::Error for InvalidName {}

/// Lower-cases and collapses runs of `-`, `_` and `.` into a single `-`.
///
/// Names must start and end with an ASCII letter or digit, and contain only
/// letters, digits and the three separators in between.
pub fn normalize(name: &str) -> Result<String, InvalidName> {
  let bytes = name.as_bytes();
  let valid_edge = |b: Option<&u8>| b.is_some_and(u8::is_ascii_alphanumeric);
  if !valid_edge(bytes.first()) || !valid_edge(bytes.last()) {
    return Err(InvalidName(name.to_string()));
  }

  let mut normalized = String::with_capacity(name.len());
  let mut in_separator = false;
  for c in name.chars() {
    match c {
      '-' | '_' | '.' => in_separator = true,
      c if c.is_ascii_alphanumeric() => {
        if in_separator {
          normalized.push('-');
          in_separator = false;
        }
        normalized.push(c.to_ascii_lowercase());
      }
      _ => return Err(InvalidName(name.to_string())),
    }
  }

  Ok(normalized)
}

macro_rules! normalized_name {
  ($(#[$doc:meta])* $name:ident) => {
    $(#[$doc])*
    #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
    #[serde(transparent)]
    pub struct $name(String);

    impl $name {
      pub fn new(name: &str) -> Result<Self, InvalidName> {
        normalize(name).map(Self)
      }

      pub fn as_str(&self) -> &str {
        &self.0
      }
    }

    impl FromStr for $name {
      type Err = InvalidName;

      fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
      }
    }

    impl<'de> Deserialize<'de> for $name {
      fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::new(&raw).map_err(de::Error::custom)
      }
    }

    impl AsRef<str> for $name {
      fn as_ref(&self) -> &str {
        &self.0
      }
    }

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
      }
    }
  };
}

normalized_name!(
  /// A normalized distribution name, e.g. `djangorestframework-simplejwt`
  PackageName
);

normalized_name!(
  /// A normalized optional-dependency ("extra") name, e.g. `crypto`
  ExtraName
);

normalized_name!(
  /// A normalized dependency group name, e.g. `dev`
  GroupName
);
