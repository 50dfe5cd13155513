//! Values injected into the graph from outside instead of being computed.
//!
//! Settings such as the package path live under `PRECOMPUTED` keys. Functions read
//! them like any other dependency, so changing a setting between builds re-runs
//! exactly the functions that read it.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::repository::RepositoryDirectory;
use crate::skyframe::{Environment, FunctionError, FunctionFailure, Lookup, SkyKey, SkyValue};

/// Name of the key holding the [`PathPackageLocator`].
pub const PACKAGE_LOCATOR: &str = "package_locator";

/// Name of the key holding the [`RepositoryDirectory`].
pub const REPOSITORIES: &str = "repositories";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PrecomputedValue {
  PackageLocator(PathPackageLocator),
  Repositories(RepositoryDirectory),
  Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("the package path must contain at least one root")]
pub struct EmptyPackagePath;

/// Ordered list of roots searched for packages. Earlier roots win.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PathPackageLocator {
  roots: Vec<PathBuf>,
}

impl PathPackageLocator {
  pub fn new(roots: Vec<PathBuf>) -> Result<Self, EmptyPackagePath> {
    if roots.is_empty() {
      return Err(EmptyPackagePath);
    }
    Ok(Self { roots })
  }

  pub fn roots(&self) -> &[PathBuf] {
    &self.roots
  }

  /// The lowest-priority root.
  pub fn last(&self) -> &Path {
    // never empty, checked in `new`
    self.roots.last().map(PathBuf::as_path).unwrap_or(Path::new(""))
  }

  pub fn key() -> SkyKey {
    SkyKey::precomputed(PACKAGE_LOCATOR)
  }
}

impl fmt::Display for PathPackageLocator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let roots: Vec<String> = self.roots.iter().map(|root| root.display().to_string()).collect();
    f.write_str(&roots.join(":"))
  }
}

impl From<PathPackageLocator> for SkyValue {
  fn from(locator: PathPackageLocator) -> Self {
    SkyValue::Precomputed(PrecomputedValue::PackageLocator(locator))
  }
}

impl From<RepositoryDirectory> for SkyValue {
  fn from(directory: RepositoryDirectory) -> Self {
    SkyValue::Precomputed(PrecomputedValue::Repositories(directory))
  }
}

/// Read the package locator from the graph.
pub fn package_locator(env: &mut Environment) -> Result<Lookup<PathPackageLocator>, FunctionFailure> {
  let key = PathPackageLocator::key();
  let Lookup::Ready(value) = env.get_value(&key) else {
    return Ok(Lookup::Missing);
  };
  match value.as_precomputed() {
    Some(PrecomputedValue::PackageLocator(locator)) => Ok(Lookup::Ready(locator.clone())),
    _ => Err(unexpected(&key, &value)),
  }
}

/// Read the repository declarations from the graph.
pub fn repository_directory(env: &mut Environment) -> Result<Lookup<RepositoryDirectory>, FunctionFailure> {
  let key = RepositoryDirectory::key();
  let Lookup::Ready(value) = env.get_value(&key) else {
    return Ok(Lookup::Missing);
  };
  match value.as_precomputed() {
    Some(PrecomputedValue::Repositories(directory)) => Ok(Lookup::Ready(directory.clone())),
    _ => Err(unexpected(&key, &value)),
  }
}

fn unexpected(key: &SkyKey, value: &SkyValue) -> FunctionFailure {
  FunctionFailure::persistent(FunctionError::ConfigEval {
    message: format!("unexpected value for {}: {:?}", key, value),
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_locator_is_rejected() {
    assert_eq!(PathPackageLocator::new(Vec::new()), Err(EmptyPackagePath));
  }

  #[test]
  fn locator_keeps_root_order() {
    let locator = PathPackageLocator::new(vec!["/a".into(), "/b".into(), "/c".into()]).unwrap();
    assert_eq!(locator.roots()[0], PathBuf::from("/a"));
    assert_eq!(locator.last(), Path::new("/c"));
    assert_eq!(locator.to_string(), "/a:/b:/c");
  }

  #[test]
  fn text_serializes_with_kind() {
    let value = SkyValue::Precomputed(PrecomputedValue::Text("x".to_string()));
    let json = serde_json::to_value(&value).unwrap();
    assert_eq!(json, serde_json::json!({"type": "precomputed", "kind": "text", "value": "x"}));
  }
}
