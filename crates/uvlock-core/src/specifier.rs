use std::fmt;
use std::str::FromStr;

use nom::IResult;
use nom::{
  Parser,
  branch::alt,
  bytes::complete::{tag, take_while1},
  character::complete::space0,
  combinator::{all_consuming, value},
  sequence::separated_pair,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
  /// `==1.0`
  Equal,
  /// `==1.0.*`
  EqualStar,
  /// `===1.0`
  ExactEqual,
  /// `!=1.0`
  NotEqual,
  /// `!=1.0.*`
  NotEqualStar,
  /// `~=1.0`
  TildeEqual,
  LessThan,
  LessThanEqual,
  GreaterThan,
  GreaterThanEqual,
}

impl Operator {
  fn as_str(self) -> &'static str {
    match self {
      Self::Equal | Self::EqualStar => "==",
      Self::ExactEqual => "===",
      Self::NotEqual | Self::NotEqualStar => "!=",
      Self::TildeEqual => "~=",
      Self::LessThan => "<",
      Self::LessThanEqual => "<=",
      Self::GreaterThan => ">",
      Self::GreaterThanEqual => ">=",
    }
  }

  fn star(self) -> Option<Self> {
    match self {
      Self::Equal => Some(Self::EqualStar),
      Self::NotEqual => Some(Self::NotEqualStar),
      _ => None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSpecifier {
  pub specifier: String,
  pub reason: &'static str,
}

impl fmt::Display for InvalidSpecifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "invalid specifier `{}`: {}", self.specifier, self.reason)
  }
}

impl std::error::Error for InvalidSpecifier {}

/// A single constraint such as `>=5.1.4` or `==3.*`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionSpecifier {
  operator: Operator,
  version: Version,
}

impl VersionSpecifier {
  pub fn new(operator: Operator, version: Version) -> Result<Self, InvalidSpecifier> {
    let invalid = |reason| {
      Err(InvalidSpecifier {
        specifier: format!("{}{version}", operator.as_str()),
        reason,
      })
    };

    if version.is_local()
      && !matches!(
        operator,
        Operator::Equal | Operator::NotEqual | Operator::ExactEqual
      )
    {
      return invalid("local versions only work with `==`, `!=` and `===`");
    }
    if operator == Operator::TildeEqual && version.release().len() < 2 {
      return invalid("`~=` needs at least two release segments");
    }
    if matches!(operator, Operator::EqualStar | Operator::NotEqualStar)
      && (version.is_prerelease() || version.is_postrelease())
    {
      return invalid("wildcards only apply to release segments");
    }

    Ok(Self { operator, version })
  }

  pub fn operator(&self) -> Operator {
    self.operator
  }

  pub fn version(&self) -> &Version {
    &self.version
  }

  /// Whether `candidate` satisfies this constraint
  pub fn contains(&self, candidate: &Version) -> bool {
    let spec = &self.version;
    match self.operator {
      Operator::Equal => Self::equal(spec, candidate),
      Operator::NotEqual => !Self::equal(spec, candidate),
      Operator::EqualStar => Self::prefix_match(spec.release(), spec, candidate),
      Operator::NotEqualStar => !Self::prefix_match(spec.release(), spec, candidate),
      Operator::ExactEqual => candidate.to_string() == spec.to_string(),
      Operator::TildeEqual => {
        let prefix = &spec.release()[..spec.release().len() - 1];
        candidate.public() >= *spec && Self::prefix_match(prefix, spec, candidate)
      }
      Operator::LessThanEqual => candidate.public() <= *spec,
      Operator::GreaterThanEqual => candidate.public() >= *spec,
      Operator::LessThan => {
        // `<1.0` does not admit `1.0rc1` unless the bound is itself a pre-release
        candidate < spec
          && !(candidate.is_prerelease() && !spec.is_prerelease() && candidate.base() == spec.base())
      }
      Operator::GreaterThan => {
        candidate > spec
          && !(candidate.is_postrelease()
            && !spec.is_postrelease()
            && candidate.base() == spec.base())
          && !(candidate.is_local() && candidate.base() == spec.base())
      }
    }
  }

  fn equal(spec: &Version, candidate: &Version) -> bool {
    if spec.is_local() {
      candidate == spec
    } else {
      &candidate.public() == spec
    }
  }

  /// `==1.2.*` style matching: same epoch and the release starts with `prefix`
  fn prefix_match(prefix: &[u64], spec: &Version, candidate: &Version) -> bool {
    candidate.epoch() == spec.epoch()
      && prefix
        .iter()
        .enumerate()
        .all(|(i, &part)| candidate.release_at(i) == part)
  }
}

impl fmt::Display for VersionSpecifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}{}", self.operator.as_str(), self.version)?;
    if matches!(self.operator, Operator::EqualStar | Operator::NotEqualStar) {
      f.write_str(".*")?;
    }
    Ok(())
  }
}

impl FromStr for VersionSpecifier {
  type Err = InvalidSpecifier;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let invalid = |reason| InvalidSpecifier {
      specifier: s.to_string(),
      reason,
    };

    let (_, (operator, raw_version)) =
      parse_specifier(s.trim()).map_err(|_| invalid("expected an operator and a version"))?;

    let (operator, raw_version) = match raw_version.strip_suffix(".*") {
      Some(stripped) => (
        operator
          .star()
          .ok_or_else(|| invalid("wildcards only work with `==` and `!=`"))?,
        stripped,
      ),
      None => (operator, raw_version),
    };

    let version = raw_version
      .parse::<Version>()
      .map_err(|_| invalid("invalid version"))?;
    Self::new(operator, version)
  }
}

fn parse_specifier(input: &str) -> IResult<&str, (Operator, &str)> {
  all_consuming(separated_pair(
    operator,
    space0,
    take_while1(|c: char| !c.is_whitespace() && c != ','),
  ))
  .parse(input)
}

fn operator(input: &str) -> IResult<&str, Operator> {
  alt((
    value(Operator::ExactEqual, tag("===")),
    value(Operator::Equal, tag("==")),
    value(Operator::NotEqual, tag("!=")),
    value(Operator::TildeEqual, tag("~=")),
    value(Operator::LessThanEqual, tag("<=")),
    value(Operator::GreaterThanEqual, tag(">=")),
    value(Operator::LessThan, tag("<")),
    value(Operator::GreaterThan, tag(">")),
  ))
  .parse(input)
}

/// A comma-separated conjunction of specifiers, e.g. `>=3.12, <4`.
/// The empty set admits every version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VersionSpecifiers(Vec<VersionSpecifier>);

impl VersionSpecifiers {
  pub fn iter(&self) -> impl Iterator<Item = &VersionSpecifier> {
    self.0.iter()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn contains(&self, candidate: &Version) -> bool {
    self.0.iter().all(|specifier| specifier.contains(candidate))
  }
}

impl From<Vec<VersionSpecifier>> for VersionSpecifiers {
  fn from(specifiers: Vec<VersionSpecifier>) -> Self {
    Self(specifiers)
  }
}

impl FromStr for VersionSpecifiers {
  type Err = InvalidSpecifier;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if s.trim().is_empty() {
      return Ok(Self::default());
    }
    s.split(',')
      .map(str::parse)
      .collect::<Result<Vec<_>, _>>()
      .map(Self)
  }
}

impl fmt::Display for VersionSpecifiers {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, specifier) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      write!(f, "{specifier}")?;
    }
    Ok(())
  }
}

impl Serialize for VersionSpecifiers {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for VersionSpecifiers {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
  }
}
