// Version scheme from
// https://packaging.python.org/en/latest/specifications/version-specifiers/
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use nom::IResult;
use nom::{
  Parser,
  branch::alt,
  bytes::complete::tag,
  character::complete::{alphanumeric1, char, digit1, one_of},
  combinator::{all_consuming, map, map_res, opt, value},
  multi::separated_list1,
  sequence::{preceded, terminated},
};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

type Res<'a, T> = IResult<&'a str, T>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrereleaseKind {
  Alpha,
  Beta,
  Rc,
}

impl PrereleaseKind {
  fn as_str(self) -> &'static str {
    match self {
      Self::Alpha => "a",
      Self::Beta => "b",
      Self::Rc => "rc",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Prerelease {
  pub kind: PrereleaseKind,
  pub number: u64,
}

/// One dot-separated piece of a local version label (`+ubuntu.1`).
/// Strings sort before numbers, as the version scheme requires.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocalSegment {
  String(String),
  Number(u64),
}

impl fmt::Display for LocalSegment {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::String(s) => f.write_str(s),
      Self::Number(n) => write!(f, "{n}"),
    }
  }
}

/// A parsed Python package version, e.g. `5.1.4`, `2.0.0rc1`, `1!3.0.post2.dev1+local`.
///
/// Equality and ordering follow the version scheme, so `1.0 == 1.0.0`.
#[derive(Debug, Clone)]
pub struct Version {
  epoch: u64,
  release: Vec<u64>,
  pre: Option<Prerelease>,
  post: Option<u64>,
  dev: Option<u64>,
  local: Vec<LocalSegment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum PreKey {
  /// A dev release with no pre or post part sorts before every pre-release
  DevOnly,
  Pre(PrereleaseKind, u64),
  Final,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum DevKey {
  Dev(u64),
  Release,
}

/// The version string could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidVersion(pub String);

impl fmt::Display for InvalidVersion {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "invalid version `{}`", self.0)
  }
}

impl std::error::Error for InvalidVersion {}

impl Version {
  /// A plain release version such as `3.12`
  pub fn new(release: impl Into<Vec<u64>>) -> Self {
    Self {
      epoch: 0,
      release: release.into(),
      pre: None,
      post: None,
      dev: None,
      local: Vec::new(),
    }
  }

  #[must_use]
  pub fn with_epoch(mut self, epoch: u64) -> Self {
    self.epoch = epoch;
    self
  }

  #[must_use]
  pub fn with_pre(mut self, kind: PrereleaseKind, number: u64) -> Self {
    self.pre = Some(Prerelease { kind, number });
    self
  }

  #[must_use]
  pub fn with_post(mut self, post: u64) -> Self {
    self.post = Some(post);
    self
  }

  #[must_use]
  pub fn with_dev(mut self, dev: u64) -> Self {
    self.dev = Some(dev);
    self
  }

  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  pub fn release(&self) -> &[u64] {
    &self.release
  }

  pub fn pre(&self) -> Option<Prerelease> {
    self.pre
  }

  pub fn post(&self) -> Option<u64> {
    self.post
  }

  pub fn dev(&self) -> Option<u64> {
    self.dev
  }

  pub fn local(&self) -> &[LocalSegment] {
    &self.local
  }

  /// Pre-releases and dev releases
  pub fn is_prerelease(&self) -> bool {
    self.pre.is_some() || self.dev.is_some()
  }

  pub fn is_postrelease(&self) -> bool {
    self.post.is_some()
  }

  pub fn is_local(&self) -> bool {
    !self.local.is_empty()
  }

  /// The version without its local label
  #[must_use]
  pub fn public(&self) -> Self {
    Self {
      local: Vec::new(),
      ..self.clone()
    }
  }

  /// Epoch and release only, e.g. `1.0` for `1.0rc1.post2+x`
  #[must_use]
  pub fn base(&self) -> Self {
    Self {
      epoch: self.epoch,
      ..Self::new(self.release.clone())
    }
  }

  /// The `i`th release component, padding with zeros
  pub(crate) fn release_at(&self, i: usize) -> u64 {
    self.release.get(i).copied().unwrap_or(0)
  }

  fn trimmed_release(&self) -> &[u64] {
    let end = self
      .release
      .iter()
      .rposition(|&n| n != 0)
      .map_or(0, |i| i + 1);
    &self.release[..end]
  }

  fn pre_key(&self) -> PreKey {
    match (self.pre, self.post, self.dev) {
      (None, None, Some(_)) => PreKey::DevOnly,
      (Some(pre), _, _) => PreKey::Pre(pre.kind, pre.number),
      (None, _, _) => PreKey::Final,
    }
  }

  fn dev_key(&self) -> DevKey {
    self.dev.map_or(DevKey::Release, DevKey::Dev)
  }
}

impl Ord for Version {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .epoch
      .cmp(&other.epoch)
      .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
      .then_with(|| self.pre_key().cmp(&other.pre_key()))
      .then_with(|| self.post.cmp(&other.post))
      .then_with(|| self.dev_key().cmp(&other.dev_key()))
      .then_with(|| self.local.cmp(&other.local))
  }
}

impl PartialOrd for Version {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl PartialEq for Version {
  fn eq(&self, other: &Self) -> bool {
    self.cmp(other) == Ordering::Equal
  }
}

impl Eq for Version {}

impl Hash for Version {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.epoch.hash(state);
    self.trimmed_release().hash(state);
    self.pre_key().hash_into(state);
    self.post.hash(state);
    self.dev.hash(state);
    self.local.hash(state);
  }
}

impl PreKey {
  fn hash_into<H: Hasher>(self, state: &mut H) {
    match self {
      Self::DevOnly => 0u8.hash(state),
      Self::Pre(kind, n) => {
        1u8.hash(state);
        kind.hash(state);
        n.hash(state);
      }
      Self::Final => 2u8.hash(state),
    }
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.epoch != 0 {
      write!(f, "{}!", self.epoch)?;
    }
    for (i, part) in self.release.iter().enumerate() {
      if i > 0 {
        f.write_str(".")?;
      }
      write!(f, "{part}")?;
    }
    if let Some(pre) = self.pre {
      write!(f, "{}{}", pre.kind.as_str(), pre.number)?;
    }
    if let Some(post) = self.post {
      write!(f, ".post{post}")?;
    }
    if let Some(dev) = self.dev {
      write!(f, ".dev{dev}")?;
    }
    for (i, segment) in self.local.iter().enumerate() {
      f.write_str(if i == 0 { "+" } else { "." })?;
      write!(f, "{segment}")?;
    }
    Ok(())
  }
}

impl FromStr for Version {
  type Err = InvalidVersion;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lowered = s.trim().to_ascii_lowercase();
    parse_version(&lowered)
      .map(|(_, version)| version)
      .map_err(|_| InvalidVersion(s.to_string()))
  }
}

impl Serialize for Version {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Version {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
  }
}

fn parse_version(input: &str) -> Res<'_, Version> {
  map(
    all_consuming((
      opt(char('v')),
      opt(terminated(number, char('!'))),
      release,
      opt(pre),
      opt(post),
      opt(dev),
      opt(local),
    )),
    |(_, epoch, release, pre, post, dev, local)| Version {
      epoch: epoch.unwrap_or(0),
      release,
      pre,
      post,
      dev,
      local: local.unwrap_or_default(),
    },
  )
  .parse(input)
}

fn number(input: &str) -> Res<'_, u64> {
  map_res(digit1, str::parse::<u64>).parse(input)
}

fn separator(input: &str) -> Res<'_, char> {
  one_of("-_.").parse(input)
}

/// An optional number, optionally preceded by a separator (`rc.1`, `rc1`, `rc`)
fn implicit_number(input: &str) -> Res<'_, u64> {
  map(opt(preceded(opt(separator), number)), |n| n.unwrap_or(0)).parse(input)
}

fn release(input: &str) -> Res<'_, Vec<u64>> {
  separated_list1(char('.'), number).parse(input)
}

fn pre(input: &str) -> Res<'_, Prerelease> {
  map(
    (opt(separator), prerelease_kind, implicit_number),
    |(_, kind, number)| Prerelease { kind, number },
  )
  .parse(input)
}

fn prerelease_kind(input: &str) -> Res<'_, PrereleaseKind> {
  alt((
    value(PrereleaseKind::Alpha, alt((tag("alpha"), tag("a")))),
    value(PrereleaseKind::Beta, alt((tag("beta"), tag("b")))),
    value(
      PrereleaseKind::Rc,
      alt((tag("rc"), tag("preview"), tag("pre"), tag("c"))),
    ),
  ))
  .parse(input)
}

fn post(input: &str) -> Res<'_, u64> {
  alt((
    preceded(
      (opt(separator), alt((tag("post"), tag("rev"), tag("r")))),
      implicit_number,
    ),
    // `1.0-1` is an implicit post release
    preceded(char('-'), number),
  ))
  .parse(input)
}

fn dev(input: &str) -> Res<'_, u64> {
  preceded((opt(separator), tag("dev")), implicit_number).parse(input)
}

fn local(input: &str) -> Res<'_, Vec<LocalSegment>> {
  preceded(
    char('+'),
    separated_list1(
      separator,
      map(alphanumeric1, |segment: &str| {
        segment.parse::<u64>().map_or_else(
          |_| LocalSegment::String(segment.to_string()),
          LocalSegment::Number,
        )
      }),
    ),
  )
  .parse(input)
}
