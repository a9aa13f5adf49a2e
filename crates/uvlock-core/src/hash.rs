use std::fmt;
use std::io::Read;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::IntegrityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
  Md5,
  Sha256,
  Sha384,
  Sha512,
}

impl HashAlgorithm {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Md5 => "md5",
      Self::Sha256 => "sha256",
      Self::Sha384 => "sha384",
      Self::Sha512 => "sha512",
    }
  }

  /// Length of a hex digest for this algorithm
  pub fn hex_len(self) -> usize {
    match self {
      Self::Md5 => 32,
      Self::Sha256 => 64,
      Self::Sha384 => 96,
      Self::Sha512 => 128,
    }
  }
}

impl fmt::Display for HashAlgorithm {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for HashAlgorithm {
  type Err = InvalidHash;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "md5" => Ok(Self::Md5),
      "sha256" => Ok(Self::Sha256),
      "sha384" => Ok(Self::Sha384),
      "sha512" => Ok(Self::Sha512),
      _ => Err(InvalidHash(format!("unknown hash algorithm `{s}`"))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidHash(pub String);

impl fmt::Display for InvalidHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl std::error::Error for InvalidHash {}

/// A content hash as written in the lockfile, e.g. `sha256:9e6f...`.
///
/// Parsing only requires a known algorithm and a non-empty digest, so a lockfile
/// with a truncated digest still loads; [`Hash::is_well_formed`] is the strict check.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hash {
  pub algorithm: HashAlgorithm,
  pub digest: String,
}

impl Hash {
  pub fn new(algorithm: HashAlgorithm, digest: impl Into<String>) -> Self {
    Self {
      algorithm,
      digest: digest.into(),
    }
  }

  /// Hash `bytes` with sha256, the algorithm the package manager records
  pub fn sha256(bytes: &[u8]) -> Self {
    Self::new(HashAlgorithm::Sha256, hex::encode(Sha256::digest(bytes)))
  }

  /// The digest is hex of the exact length for its algorithm
  pub fn is_well_formed(&self) -> bool {
    self.digest.len() == self.algorithm.hex_len()
      && self.digest.bytes().all(|b| b.is_ascii_hexdigit())
  }

  /// Check `bytes` against this hash
  pub fn verify(&self, bytes: &[u8]) -> Result<(), IntegrityError> {
    self.verify_reader(bytes).map(|_| ())
  }

  /// Stream `reader` through the hasher and compare. Returns the number of
  /// bytes read so callers can check the size without a second pass.
  pub fn verify_reader(&self, reader: impl Read) -> Result<u64, IntegrityError> {
    let (actual, read) = match self.algorithm {
      HashAlgorithm::Sha256 => digest_reader::<Sha256>(reader)?,
      HashAlgorithm::Sha384 => digest_reader::<Sha384>(reader)?,
      HashAlgorithm::Sha512 => digest_reader::<Sha512>(reader)?,
      HashAlgorithm::Md5 => return Err(IntegrityError::UnsupportedAlgorithm(self.algorithm)),
    };

    if actual.eq_ignore_ascii_case(&self.digest) {
      tracing::debug!(algorithm = %self.algorithm, bytes = read, "hash verified");
      Ok(read)
    } else {
      Err(IntegrityError::HashMismatch {
        algorithm: self.algorithm,
        expected: self.digest.clone(),
        actual,
      })
    }
  }
}

fn digest_reader<D: Digest>(mut reader: impl Read) -> Result<(String, u64), IntegrityError> {
  let mut hasher = D::new();
  let mut buffer = [0u8; 64 * 1024];
  let mut total = 0u64;
  loop {
    let n = reader
      .read(&mut buffer)
      .map_err(|e| IntegrityError::Read(e.to_string()))?;
    if n == 0 {
      break;
    }
    hasher.update(&buffer[..n]);
    total += n as u64;
  }
  Ok((hex::encode(hasher.finalize()), total))
}

impl fmt::Display for Hash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.algorithm, self.digest)
  }
}

impl FromStr for Hash {
  type Err = InvalidHash;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (algorithm, digest) = s
      .split_once(':')
      .ok_or_else(|| InvalidHash(format!("expected `algorithm:digest`, got `{s}`")))?;
    if digest.is_empty() {
      return Err(InvalidHash(format!("empty digest in `{s}`")));
    }
    Ok(Self::new(algorithm.parse()?, digest))
  }
}

impl Serialize for Hash {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Hash {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse().map_err(de::Error::custom)
  }
}
