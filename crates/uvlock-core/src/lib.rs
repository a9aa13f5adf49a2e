//! # uvlock
//!
//! A library for reading, checking and rewriting `uv.lock` files.
//!
//! [`decode::decode`] reads text into a typed [`Lockfile`] with the `toml`
//! crate, and [`render::render`] writes it back in the canonical layout. [`validate()`]
//! checks the dependency closure, hashes and declared requirements.
#![deny(clippy::all)]
pub mod decode;
pub mod error;
pub mod graph;
pub mod hash;
pub mod lockfile;
pub mod metadata;
pub mod name;
pub mod package;
pub mod render;
pub mod source;
pub mod specifier;
pub mod validate;
pub mod version;

pub use error::{LockError, Result};
pub use graph::DependencyGraph;
pub use hash::{Hash, HashAlgorithm};
pub use lockfile::Lockfile;
pub use name::PackageName;
pub use package::{Artifact, Dependency, Package};
pub use source::Source;
pub use specifier::VersionSpecifiers;
pub use validate::{Issue, Report, Severity, ValidateOptions, validate};
pub use version::Version;
