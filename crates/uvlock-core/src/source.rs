use std::fmt;

use serde::{Deserialize, Serialize};

/// Where a locked package comes from.
///
/// Serialized as a one-key table, e.g. `{ registry = "https://pypi.org/simple" }`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
  /// A package index, by URL or local path
  Registry(String),
  /// A git URL, including `?rev=` style query and a `#commit` fragment
  Git(String),
  /// A direct URL to an archive
  Url(String),
  /// A local archive file
  Path(String),
  /// A local source tree installed normally
  Directory(String),
  /// A local source tree installed in editable mode
  Editable(String),
  /// A local project that is not itself installed (the workspace root)
  Virtual(String),
}

impl Source {
  /// The keys a source can be written under, in the order they are checked
  pub const KINDS: [&'static str; 7] = [
    "registry",
    "git",
    "url",
    "path",
    "directory",
    "editable",
    "virtual",
  ];

  pub fn from_kind(kind: &str, location: impl Into<String>) -> Option<Self> {
    let location = location.into();
    Some(match kind {
      "registry" => Self::Registry(location),
      "git" => Self::Git(location),
      "url" => Self::Url(location),
      "path" => Self::Path(location),
      "directory" => Self::Directory(location),
      "editable" => Self::Editable(location),
      "virtual" => Self::Virtual(location),
      _ => return None,
    })
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::Registry(_) => "registry",
      Self::Git(_) => "git",
      Self::Url(_) => "url",
      Self::Path(_) => "path",
      Self::Directory(_) => "directory",
      Self::Editable(_) => "editable",
      Self::Virtual(_) => "virtual",
    }
  }

  pub fn location(&self) -> &str {
    match self {
      Self::Registry(s)
      | Self::Git(s)
      | Self::Url(s)
      | Self::Path(s)
      | Self::Directory(s)
      | Self::Editable(s)
      | Self::Virtual(s) => s,
    }
  }

  /// The record describes the project being locked rather than something fetched
  pub fn is_local_project(&self) -> bool {
    matches!(self, Self::Virtual(_) | Self::Editable(_))
  }

  pub fn is_registry(&self) -> bool {
    matches!(self, Self::Registry(_))
  }

  /// Whether a locked source is the one `requested` names. A git source is
  /// locked with `#<commit>` appended, so fragments are ignored.
  pub fn matches(&self, requested: &Self) -> bool {
    fn trimmed(location: &str) -> &str {
      let location = location.split('#').next().unwrap_or(location);
      let location = location.strip_prefix("./").unwrap_or(location);
      location.strip_suffix('/').unwrap_or(location)
    }
    self.kind() == requested.kind() && trimmed(self.location()) == trimmed(requested.location())
  }
}

impl fmt::Display for Source {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}+{}", self.kind(), self.location())
  }
}
