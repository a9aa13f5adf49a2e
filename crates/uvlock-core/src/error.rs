use thiserror::Error;

use crate::hash::HashAlgorithm;

pub type Result<T> = std::result::Result<T, LockError>;

/// Anything that can go wrong between reading lockfile text and using it.
#[derive(Error, Debug)]
pub enum LockError {
  #[error(transparent)]
  Parse(#[from] ParseError),

  #[error(transparent)]
  Integrity(#[from] IntegrityError),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

/// The text is not a lockfile: bad TOML, or a value of the wrong shape.
/// The position is 1-based.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{line}:{column}: {message}")]
pub struct ParseError {
  pub line: usize,
  pub column: usize,
  pub message: String,
}

impl ParseError {
  /// Build an error pointing at `offset` bytes into `source`
  pub fn at(source: &str, offset: usize, message: impl Into<String>) -> Self {
    let offset = offset.min(source.len());
    let consumed = &source[..offset];
    let line = consumed.matches('\n').count() + 1;
    let line_start = consumed.rfind('\n').map_or(0, |i| i + 1);
    let column = consumed[line_start..].chars().count() + 1;

    Self {
      line,
      column,
      message: message.into(),
    }
  }

  /// Position a `toml` error using its span, or the start of the text when it has none
  pub fn from_toml(source: &str, error: &toml::de::Error) -> Self {
    let offset = error.span().map_or(0, |span| span.start);
    Self::at(source, offset, error.message().trim_end())
  }
}

/// Fetched bytes did not match what the lockfile recorded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
  #[error("expected {expected} bytes, got {actual}")]
  SizeMismatch { expected: u64, actual: u64 },

  #[error("{algorithm} mismatch: expected {expected}, got {actual}")]
  HashMismatch {
    algorithm: HashAlgorithm,
    expected: String,
    actual: String,
  },

  #[error("no hash recorded for {0}")]
  MissingHash(String),

  #[error("cannot verify {0} hashes")]
  UnsupportedAlgorithm(HashAlgorithm),

  #[error("failed to read artifact: {0}")]
  Read(String),
}
