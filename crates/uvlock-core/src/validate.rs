use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::graph::{DependencyGraph, Resolution};
use crate::hash::Hash;
use crate::lockfile::Lockfile;
use crate::metadata::Requirement;
use crate::name::PackageName;
use crate::package::{Package, PackageId};
use crate::source::Source;
use crate::version::Version;

/// Knobs for [`validate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidateOptions {
  /// Warn about records no root can reach
  pub report_unreachable: bool,
  /// Treat warnings as errors in [`Report::is_ok`]
  pub deny_warnings: bool,
}

impl Default for ValidateOptions {
  fn default() -> Self {
    Self {
      report_unreachable: true,
      deny_warnings: false,
    }
  }
}

impl ValidateOptions {
  #[must_use]
  pub fn with_report_unreachable(mut self, report_unreachable: bool) -> Self {
    self.report_unreachable = report_unreachable;
    self
  }

  #[must_use]
  pub fn with_deny_warnings(mut self, deny_warnings: bool) -> Self {
    self.deny_warnings = deny_warnings;
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  Error,
  Warning,
}

/// A structural problem found in a lockfile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Issue {
  DuplicatePackage {
    package: PackageId,
    source: Source,
  },
  MissingDependency {
    package: PackageId,
    dependency: PackageName,
  },
  AmbiguousDependency {
    package: PackageId,
    dependency: PackageName,
    candidates: Vec<PackageId>,
  },
  MalformedHash {
    package: PackageId,
    artifact: String,
    hash: Hash,
  },
  MissingArtifacts {
    package: PackageId,
  },
  MissingRoot,
  UnresolvedRequirement {
    package: PackageId,
    requirement: String,
  },
  UnsatisfiedRequirement {
    package: PackageId,
    requirement: String,
    /// Every locked version of the required package
    locked: Vec<Version>,
    /// How many of `locked` satisfy the specifier
    satisfying: usize,
  },
  UnreachablePackage {
    package: PackageId,
  },
}

impl Issue {
  pub fn severity(&self) -> Severity {
    match self {
      Self::UnreachablePackage { .. } => Severity::Warning,
      _ => Severity::Error,
    }
  }
}

impl fmt::Display for Issue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::DuplicatePackage { package, source } => {
        write!(f, "{package} from {source} is locked more than once")
      }
      Self::MissingDependency {
        package,
        dependency,
      } => write!(f, "{package} depends on {dependency}, which is not locked"),
      Self::AmbiguousDependency {
        package,
        dependency,
        candidates,
      } => {
        let candidates: Vec<String> = candidates.iter().map(ToString::to_string).collect();
        write!(
          f,
          "{package} depends on {dependency}, which matches {}",
          candidates.join(", ")
        )
      }
      Self::MalformedHash {
        package,
        artifact,
        hash,
      } => write!(f, "{package}: malformed hash `{hash}` for {artifact}"),
      Self::MissingArtifacts { package } => {
        write!(f, "{package} comes from a registry but has no sdist or wheels")
      }
      Self::MissingRoot => f.write_str("no local project record"),
      Self::UnresolvedRequirement {
        package,
        requirement,
      } => write!(f, "{package} requires `{requirement}`, which is not locked"),
      Self::UnsatisfiedRequirement {
        package,
        requirement,
        locked,
        satisfying,
      } => {
        let locked: Vec<String> = locked.iter().map(ToString::to_string).collect();
        let locked = if locked.is_empty() {
          "no version".to_string()
        } else {
          locked.join(", ")
        };
        if *satisfying == 0 {
          write!(
            f,
            "{package} requires `{requirement}`, but the lockfile has {locked}"
          )
        } else {
          write!(
            f,
            "{package} requires `{requirement}`, which {satisfying} locked versions satisfy ({locked})"
          )
        }
      }
      Self::UnreachablePackage { package } => {
        write!(f, "{package} is not reachable from any root")
      }
    }
  }
}

/// Everything [`validate`] found
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Report {
  pub issues: Vec<Issue>,
  #[serde(skip)]
  pub deny_warnings: bool,
}

impl Report {
  pub fn errors(&self) -> impl Iterator<Item = &Issue> {
    self
      .issues
      .iter()
      .filter(|issue| issue.severity() == Severity::Error)
  }

  pub fn warnings(&self) -> impl Iterator<Item = &Issue> {
    self
      .issues
      .iter()
      .filter(|issue| issue.severity() == Severity::Warning)
  }

  pub fn is_ok(&self) -> bool {
    if self.deny_warnings {
      self.issues.is_empty()
    } else {
      self.errors().next().is_none()
    }
  }
}

/// Check the lockfile's structural invariants
pub fn validate(lockfile: &Lockfile, options: &ValidateOptions) -> Report {
  let graph = DependencyGraph::new(lockfile);
  let mut issues = Vec::new();

  check_duplicates(lockfile, &mut issues);
  for package in &lockfile.packages {
    check_edges(&graph, package, &mut issues);
    check_artifacts(package, &mut issues);
  }
  check_roots(lockfile, &graph, &mut issues);

  if options.report_unreachable {
    let reachable = graph.reachable();
    // Without a root everything is unreachable; MissingRoot already says so
    if !reachable.is_empty() {
      for (i, package) in lockfile.packages.iter().enumerate() {
        if !reachable.contains(&i) {
          issues.push(Issue::UnreachablePackage {
            package: package.id(),
          });
        }
      }
    }
  }

  tracing::debug!(
    packages = lockfile.packages.len(),
    issues = issues.len(),
    "validated lockfile"
  );

  Report {
    issues,
    deny_warnings: options.deny_warnings,
  }
}

fn check_duplicates(lockfile: &Lockfile, issues: &mut Vec<Issue>) {
  let mut seen = HashSet::new();
  for package in &lockfile.packages {
    if !seen.insert((&package.name, package.version.as_ref(), &package.source)) {
      issues.push(Issue::DuplicatePackage {
        package: package.id(),
        source: package.source.clone(),
      });
    }
  }
}

fn check_edges(graph: &DependencyGraph<'_>, package: &Package, issues: &mut Vec<Issue>) {
  for dependency in package.all_dependencies() {
    match graph.resolve(dependency) {
      Resolution::Found(_) => {}
      Resolution::Missing => issues.push(Issue::MissingDependency {
        package: package.id(),
        dependency: dependency.name.clone(),
      }),
      Resolution::Ambiguous(candidates) => issues.push(Issue::AmbiguousDependency {
        package: package.id(),
        dependency: dependency.name.clone(),
        candidates: candidates.into_iter().map(|i| graph.package(i).id()).collect(),
      }),
    }
  }
}

fn check_artifacts(package: &Package, issues: &mut Vec<Issue>) {
  if package.source.is_registry() && package.sdist.is_none() && package.wheels.is_empty() {
    issues.push(Issue::MissingArtifacts {
      package: package.id(),
    });
  }

  for artifact in package.artifacts() {
    if let Some(hash) = &artifact.hash
      && !hash.is_well_formed()
    {
      issues.push(Issue::MalformedHash {
        package: package.id(),
        artifact: artifact.filename().to_string(),
        hash: hash.clone(),
      });
    }
  }
}

fn check_roots(lockfile: &Lockfile, graph: &DependencyGraph<'_>, issues: &mut Vec<Issue>) {
  let roots = graph.roots();
  if roots.is_empty() {
    issues.push(Issue::MissingRoot);
    return;
  }

  for root in roots {
    let package = graph.package(root);
    let Some(metadata) = &package.metadata else {
      continue;
    };
    for requirement in metadata.requirements() {
      check_requirement(lockfile, package, requirement, issues);
    }
  }
}

fn check_requirement(
  lockfile: &Lockfile,
  package: &Package,
  requirement: &Requirement,
  issues: &mut Vec<Issue>,
) {
  let candidates: Vec<&Package> = lockfile.packages_named(&requirement.name).collect();
  if candidates.is_empty() {
    issues.push(Issue::UnresolvedRequirement {
      package: package.id(),
      requirement: requirement.to_string(),
    });
    return;
  }

  // No specifier matches any version; a direct source must be the locked one
  let satisfying: Vec<&Package> = candidates
    .iter()
    .copied()
    .filter(|candidate| {
      requirement
        .source
        .as_ref()
        .is_none_or(|source| candidate.source.matches(source))
    })
    .filter(|candidate| {
      requirement.specifier.as_ref().is_none_or(|specifier| {
        candidate
          .version
          .as_ref()
          .is_some_and(|version| specifier.contains(version))
      })
    })
    .collect();

  // A forked resolution legitimately locks one version per environment
  let forked = satisfying
    .iter()
    .all(|candidate| !candidate.resolution_markers.is_empty());

  if satisfying.is_empty() || (satisfying.len() > 1 && !forked) {
    issues.push(Issue::UnsatisfiedRequirement {
      package: package.id(),
      requirement: requirement.to_string(),
      locked: candidates
        .iter()
        .filter_map(|candidate| candidate.version.clone())
        .collect(),
      satisfying: satisfying.len(),
    });
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::hash::HashAlgorithm;
  use crate::metadata::PackageMetadata;
  use crate::package::{Artifact, ArtifactLocation, Dependency};
  use pretty_assertions::assert_eq;

  const DIGEST: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

  fn name(s: &str) -> PackageName {
    PackageName::new(s).unwrap()
  }

  fn version(s: &str) -> Version {
    s.parse().unwrap()
  }

  fn wheel(file: &str) -> Artifact {
    Artifact::new(ArtifactLocation::Url(format!("https://files.example/{file}")))
      .with_hash(Hash::new(HashAlgorithm::Sha256, DIGEST))
      .with_size(11)
  }

  fn registry(n: &str, v: &str) -> Package {
    Package::new(name(n), Source::Registry("https://pypi.org/simple".into()))
      .with_version(version(v))
      .with_wheel(wheel(&format!("{n}-{v}-py3-none-any.whl")))
  }

  fn root(requirements: &[(&str, &str)]) -> Package {
    let metadata = PackageMetadata {
      requires_dist: requirements
        .iter()
        .map(|(n, spec)| Requirement::new(name(n)).with_specifier(spec.parse().unwrap()))
        .collect(),
      ..PackageMetadata::default()
    };
    requirements
      .iter()
      .fold(
        Package::new(name("expense-tracker"), Source::Virtual(".".into()))
          .with_version(version("0.1.0")),
        |package, (n, _)| package.with_dependency(Dependency::new(name(n))),
      )
      .with_metadata(metadata)
  }

  fn valid() -> Lockfile {
    Lockfile::new()
      .with_package(root(&[("django", ">=5.1.4")]))
      .with_package(registry("django", "5.1.4").with_dependency(Dependency::new(name("asgiref"))))
      .with_package(registry("asgiref", "3.8.1"))
  }

  fn check(lockfile: &Lockfile) -> Report {
    validate(lockfile, &ValidateOptions::default())
  }

  #[test]
  fn test_valid_lockfile() {
    let report = check(&valid());
    assert!(report.issues.is_empty());
    assert!(report.is_ok());
  }

  #[test]
  fn test_missing_dependency() {
    let mut lockfile = valid();
    lockfile.packages.pop();
    let report = check(&lockfile);
    assert_eq!(
      report.issues,
      vec![Issue::MissingDependency {
        package: lockfile.packages[1].id(),
        dependency: name("asgiref"),
      }]
    );
    assert!(!report.is_ok());
  }

  #[test]
  fn test_duplicate_and_ambiguous() {
    let lockfile = valid().with_package(registry("asgiref", "3.8.1"));
    let report = check(&lockfile);
    let kinds: Vec<_> = report
      .issues
      .iter()
      .map(|issue| match issue {
        Issue::DuplicatePackage { .. } => "duplicate",
        Issue::AmbiguousDependency { .. } => "ambiguous",
        _ => "other",
      })
      .collect();
    assert_eq!(kinds, vec!["duplicate", "ambiguous"]);
  }

  #[test]
  fn test_malformed_hash() {
    let mut lockfile = valid();
    lockfile.packages[2].wheels[0].hash = Some(Hash::new(HashAlgorithm::Sha256, "abc123"));
    let report = check(&lockfile);
    assert_eq!(
      report.issues,
      vec![Issue::MalformedHash {
        package: lockfile.packages[2].id(),
        artifact: "asgiref-3.8.1-py3-none-any.whl".to_string(),
        hash: Hash::new(HashAlgorithm::Sha256, "abc123"),
      }]
    );
  }

  #[test]
  fn test_missing_artifacts() {
    let mut lockfile = valid();
    lockfile.packages[2].wheels.clear();
    let report = check(&lockfile);
    assert_eq!(
      report.issues,
      vec![Issue::MissingArtifacts {
        package: lockfile.packages[2].id(),
      }]
    );
  }

  #[test]
  fn test_missing_root() {
    let lockfile = Lockfile::new().with_package(registry("asgiref", "3.8.1"));
    let report = check(&lockfile);
    assert_eq!(report.issues, vec![Issue::MissingRoot]);
  }

  #[test]
  fn test_unresolved_requirement() {
    let mut lockfile = valid();
    lockfile.packages[0]
      .metadata
      .as_mut()
      .unwrap()
      .requires_dist
      .push(Requirement::new(name("pyjwt")));
    let report = check(&lockfile);
    assert_eq!(
      report.issues,
      vec![Issue::UnresolvedRequirement {
        package: lockfile.packages[0].id(),
        requirement: "pyjwt".to_string(),
      }]
    );
  }

  #[test]
  fn test_unsatisfied_requirement() {
    let lockfile = Lockfile::new()
      .with_package(root(&[("django", ">=5.2")]))
      .with_package(registry("django", "5.1.4"));
    let report = check(&lockfile);
    assert_eq!(
      report.issues,
      vec![Issue::UnsatisfiedRequirement {
        package: lockfile.packages[0].id(),
        requirement: "django>=5.2".to_string(),
        locked: vec![version("5.1.4")],
        satisfying: 0,
      }]
    );
    assert_eq!(
      report.issues[0].to_string(),
      "expense-tracker==0.1.0 requires `django>=5.2`, but the lockfile has 5.1.4"
    );
  }

  #[test]
  fn test_requirement_satisfied_twice() {
    let mut lockfile = Lockfile::new()
      .with_package(root(&[("numpy", ">=1.26")]))
      .with_package(registry("numpy", "1.26.4"))
      .with_package(registry("numpy", "2.1.0"));
    lockfile.packages[0].dependencies[0].marker = Some("python_version < '3.10'".into());
    let report = check(&lockfile);
    assert!(
      report
        .errors()
        .any(|issue| matches!(issue, Issue::UnsatisfiedRequirement { satisfying: 2, .. }))
    );

    // Records scoped to distinct environments are a fork, not a conflict
    lockfile.packages[1].resolution_markers = vec!["python_full_version < '3.10'".into()];
    lockfile.packages[2].resolution_markers = vec!["python_full_version >= '3.10'".into()];
    let report = check(&lockfile);
    assert!(
      !report
        .errors()
        .any(|issue| matches!(issue, Issue::UnsatisfiedRequirement { .. }))
    );
  }

  #[test]
  fn test_requirement_without_specifier_satisfied_twice() {
    let mut app = root(&[]);
    app.metadata = Some(PackageMetadata {
      requires_dist: vec![Requirement::new(name("numpy"))],
      ..PackageMetadata::default()
    });
    let app = app
      .with_dependency(Dependency::new(name("numpy")).with_version(version("1.26.4")))
      .with_dependency(Dependency::new(name("numpy")).with_version(version("2.1.3")));
    let lockfile = Lockfile::new()
      .with_package(app)
      .with_package(registry("numpy", "1.26.4"))
      .with_package(registry("numpy", "2.1.3"));

    let report = check(&lockfile);
    assert_eq!(
      report.issues,
      vec![Issue::UnsatisfiedRequirement {
        package: lockfile.packages[0].id(),
        requirement: "numpy".to_string(),
        locked: vec![version("1.26.4"), version("2.1.3")],
        satisfying: 2,
      }]
    );
  }

  #[test]
  fn test_requirement_with_direct_source() {
    let lib = Package::new(name("lib"), Source::Editable("packages/lib".into()))
      .with_version(version("0.2.0"));
    let mut requirement = Requirement::new(name("lib"));
    requirement.source = Some(Source::Editable("packages/lib".into()));
    let mut app = root(&[]).with_dependency(Dependency::new(name("lib")));
    app.metadata = Some(PackageMetadata {
      requires_dist: vec![requirement],
      ..PackageMetadata::default()
    });
    let mut lockfile = Lockfile::new().with_package(app).with_package(lib);
    assert!(check(&lockfile).issues.is_empty());

    // The same name from another source does not satisfy it
    lockfile.packages[1].source = Source::Directory("vendor/lib".into());
    let report = check(&lockfile);
    assert_eq!(
      report.issues,
      vec![Issue::UnsatisfiedRequirement {
        package: lockfile.packages[0].id(),
        requirement: "lib @ editable+packages/lib".to_string(),
        locked: vec![version("0.2.0")],
        satisfying: 0,
      }]
    );

    // A second copy from the requested source is ambiguous
    let mut copy = lockfile.packages[1].clone();
    copy.version = Some(version("0.3.0"));
    lockfile.packages[1].source = Source::Editable("packages/lib".into());
    copy.source = Source::Editable("packages/lib".into());
    lockfile.packages[0]
      .dependencies
      .push(Dependency::new(name("lib")).with_version(version("0.3.0")));
    lockfile.packages[0].dependencies[0].version = Some(version("0.2.0"));
    let lockfile = lockfile.with_package(copy);
    let report = check(&lockfile);
    assert!(
      report
        .errors()
        .any(|issue| matches!(issue, Issue::UnsatisfiedRequirement { satisfying: 2, .. })),
      "{:#?}",
      report.issues
    );
  }

  #[test]
  fn test_unreachable_is_a_warning() {
    let lockfile = valid().with_package(registry("orphan", "1.0"));
    let report = check(&lockfile);
    assert_eq!(report.warnings().count(), 1);
    assert_eq!(report.errors().count(), 0);
    assert!(report.is_ok());

    let strict = validate(&lockfile, &ValidateOptions::default().with_deny_warnings(true));
    assert!(!strict.is_ok());

    let quiet = validate(
      &lockfile,
      &ValidateOptions::default().with_report_unreachable(false),
    );
    assert!(quiet.issues.is_empty());
  }

  #[test]
  fn test_issue_display() {
    let issue = Issue::MissingDependency {
      package: PackageId {
        name: name("django"),
        version: Some(version("5.1.4")),
      },
      dependency: name("asgiref"),
    };
    assert_eq!(issue.severity(), Severity::Error);
    assert_eq!(
      issue.to_string(),
      "django==5.1.4 depends on asgiref, which is not locked"
    );
  }
}
