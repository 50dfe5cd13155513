use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::label::RepositoryName;
use crate::precomputed::REPOSITORIES;
use crate::skyframe::SkyKey;
use crate::vfs::FileValue;

/// Declaration of one external repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRule {
  /// Absolute directory holding the repository's sources.
  pub path: PathBuf,
  /// Build file applied to the repository's root package instead of its own.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub build_file: Option<PathBuf>,
}

/// Every declared external repository, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RepositoryDirectory {
  rules: BTreeMap<RepositoryName, RepositoryRule>,
}

impl RepositoryDirectory {
  pub fn new(rules: BTreeMap<RepositoryName, RepositoryRule>) -> Self {
    Self { rules }
  }

  pub fn get(&self, name: &RepositoryName) -> Option<&RepositoryRule> {
    self.rules.get(name)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&RepositoryName, &RepositoryRule)> {
    self.rules.iter()
  }

  pub fn len(&self) -> usize {
    self.rules.len()
  }

  pub fn is_empty(&self) -> bool {
    self.rules.is_empty()
  }

  pub fn key() -> SkyKey {
    SkyKey::precomputed(REPOSITORIES)
  }
}

/// A resolved external repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryValue {
  /// Directory the repository's packages are looked up in.
  pub path: PathBuf,
  /// The overlay build file, when the declaration has one.
  pub overlay: Option<FileValue>,
}

impl RepositoryValue {
  pub fn has_overlay(&self) -> bool {
    self.overlay.is_some()
  }
}
