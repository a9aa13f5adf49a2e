use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::lockfile::Lockfile;
use crate::name::PackageName;
use crate::package::{Dependency, Package};

/// What a dependency edge points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
  Found(usize),
  Missing,
  /// Several records match and the edge doesn't say which
  Ambiguous(Vec<usize>),
}

/// An index over a lockfile's records. Packages are referred to by their
/// position in [`Lockfile::packages`].
#[derive(Debug)]
pub struct DependencyGraph<'a> {
  lockfile: &'a Lockfile,
  by_name: HashMap<&'a PackageName, Vec<usize>>,
}

impl<'a> DependencyGraph<'a> {
  pub fn new(lockfile: &'a Lockfile) -> Self {
    let mut by_name: HashMap<&PackageName, Vec<usize>> = HashMap::new();
    for (i, package) in lockfile.packages.iter().enumerate() {
      by_name.entry(&package.name).or_default().push(i);
    }
    Self { lockfile, by_name }
  }

  pub fn package(&self, index: usize) -> &'a Package {
    &self.lockfile.packages[index]
  }

  /// Indices of every record with this name
  pub fn find(&self, name: &PackageName) -> &[usize] {
    self.by_name.get(name).map_or(&[], Vec::as_slice)
  }

  pub fn resolve(&self, dependency: &Dependency) -> Resolution {
    let candidates: Vec<usize> = self
      .find(&dependency.name)
      .iter()
      .copied()
      .filter(|&i| {
        let package = self.package(i);
        dependency
          .version
          .as_ref()
          .is_none_or(|version| package.version.as_ref() == Some(version))
          && dependency
            .source
            .as_ref()
            .is_none_or(|source| &package.source == source)
      })
      .collect();

    match candidates.as_slice() {
      [] => Resolution::Missing,
      [only] => Resolution::Found(*only),
      _ => Resolution::Ambiguous(candidates),
    }
  }

  /// Local project records plus workspace members, in lockfile order
  pub fn roots(&self) -> Vec<usize> {
    let members = &self.lockfile.manifest.members;
    self
      .lockfile
      .packages
      .iter()
      .enumerate()
      .filter(|(_, package)| package.source.is_local_project() || members.contains(&package.name))
      .map(|(i, _)| i)
      .collect()
  }

  /// Records the edge can lead to. Ambiguous edges count every candidate.
  fn targets(&self, dependency: &Dependency) -> Vec<usize> {
    match self.resolve(dependency) {
      Resolution::Found(i) => vec![i],
      Resolution::Missing => Vec::new(),
      Resolution::Ambiguous(candidates) => candidates,
    }
  }

  /// Direct dependencies of `index` that resolve, deduplicated
  pub fn children(&self, index: usize) -> BTreeSet<usize> {
    self
      .package(index)
      .all_dependencies()
      .flat_map(|dependency| self.targets(dependency))
      .collect()
  }

  /// Everything reachable from the roots, roots included
  pub fn reachable(&self) -> BTreeSet<usize> {
    let mut seen: BTreeSet<usize> = BTreeSet::new();
    let mut queue: VecDeque<usize> = self.roots().into_iter().collect();
    while let Some(i) = queue.pop_front() {
      if !seen.insert(i) {
        continue;
      }
      queue.extend(self.children(i).into_iter().filter(|c| !seen.contains(c)));
    }
    seen
  }

  /// Records with an edge to any record named `name`
  pub fn dependents(&self, name: &PackageName) -> Vec<usize> {
    self
      .lockfile
      .packages
      .iter()
      .enumerate()
      .filter(|(_, package)| package.all_dependencies().any(|d| &d.name == name))
      .map(|(i, _)| i)
      .collect()
  }
}
