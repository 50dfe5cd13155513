//! Keys and values stored in the evaluation graph.

use std::fmt;

use serde::Serialize;

use crate::label::{PackageIdentifier, RepositoryName};
use crate::package::PackageLookupValue;
use crate::precomputed::PrecomputedValue;
use crate::repository::RepositoryValue;
use crate::vfs::{FileValue, RootedPath};

/// Names the computation responsible for a key.
///
/// The evaluator dispatches on this name to the function registered for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FunctionName(&'static str);

impl FunctionName {
  pub const FILE: Self = Self("FILE");
  pub const REPOSITORY: Self = Self("REPOSITORY");
  pub const PACKAGE_LOOKUP: Self = Self("PACKAGE_LOOKUP");
  pub const PRECOMPUTED: Self = Self("PRECOMPUTED");

  pub const fn new(name: &'static str) -> Self {
    Self(name)
  }

  pub fn as_str(&self) -> &'static str {
    self.0
  }
}

impl fmt::Display for FunctionName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.0)
  }
}

/// The argument half of a key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyArgument {
  Path(RootedPath),
  Repository(RepositoryName),
  Package(PackageIdentifier),
  Name(String),
}

impl fmt::Display for KeyArgument {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      KeyArgument::Path(path) => write!(f, "{}", path),
      KeyArgument::Repository(repo) => write!(f, "{}", repo),
      KeyArgument::Package(id) => write!(f, "{}", id),
      KeyArgument::Name(name) => f.write_str(name),
    }
  }
}

/// Identifies one computation instance: a function name plus its argument.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkyKey {
  function: FunctionName,
  argument: KeyArgument,
}

impl SkyKey {
  pub fn new(function: FunctionName, argument: KeyArgument) -> Self {
    Self { function, argument }
  }

  pub fn file(path: RootedPath) -> Self {
    Self::new(FunctionName::FILE, KeyArgument::Path(path))
  }

  pub fn repository(name: RepositoryName) -> Self {
    Self::new(FunctionName::REPOSITORY, KeyArgument::Repository(name))
  }

  pub fn package_lookup(id: PackageIdentifier) -> Self {
    Self::new(FunctionName::PACKAGE_LOOKUP, KeyArgument::Package(id))
  }

  pub fn precomputed(name: &str) -> Self {
    Self::new(FunctionName::PRECOMPUTED, KeyArgument::Name(name.to_string()))
  }

  pub fn function(&self) -> FunctionName {
    self.function
  }

  pub fn argument(&self) -> &KeyArgument {
    &self.argument
  }

  pub fn rooted_path(&self) -> Option<&RootedPath> {
    match &self.argument {
      KeyArgument::Path(path) => Some(path),
      _ => None,
    }
  }

  pub fn repository_name(&self) -> Option<&RepositoryName> {
    match &self.argument {
      KeyArgument::Repository(name) => Some(name),
      _ => None,
    }
  }

  pub fn package_identifier(&self) -> Option<&PackageIdentifier> {
    match &self.argument {
      KeyArgument::Package(id) => Some(id),
      _ => None,
    }
  }

  pub fn name(&self) -> Option<&str> {
    match &self.argument {
      KeyArgument::Name(name) => Some(name),
      _ => None,
    }
  }
}

impl fmt::Display for SkyKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.function, self.argument)
  }
}

/// Immutable result of a completed computation.
///
/// Values are compared after recomputation: an equal value keeps its old change
/// version so dependents are not re-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SkyValue {
  File(FileValue),
  Repository(RepositoryValue),
  PackageLookup(PackageLookupValue),
  Precomputed(PrecomputedValue),
}

impl SkyValue {
  pub fn as_file(&self) -> Option<&FileValue> {
    match self {
      SkyValue::File(value) => Some(value),
      _ => None,
    }
  }

  pub fn as_repository(&self) -> Option<&RepositoryValue> {
    match self {
      SkyValue::Repository(value) => Some(value),
      _ => None,
    }
  }

  pub fn as_package_lookup(&self) -> Option<&PackageLookupValue> {
    match self {
      SkyValue::PackageLookup(value) => Some(value),
      _ => None,
    }
  }

  pub fn as_precomputed(&self) -> Option<&PrecomputedValue> {
    match self {
      SkyValue::Precomputed(value) => Some(value),
      _ => None,
    }
  }
}

/// Answer to a dependency request within one restart.
///
/// `Missing` means the dependency is not available yet; the requesting function
/// must not use any partial result and should return `Ok(Lookup::Missing)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
  Ready(T),
  Missing,
}

impl<T> Lookup<T> {
  pub fn is_ready(&self) -> bool {
    matches!(self, Lookup::Ready(_))
  }

  pub fn is_missing(&self) -> bool {
    matches!(self, Lookup::Missing)
  }

  pub fn ready(self) -> Option<T> {
    match self {
      Lookup::Ready(value) => Some(value),
      Lookup::Missing => None,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
    match self {
      Lookup::Ready(value) => Lookup::Ready(f(value)),
      Lookup::Missing => Lookup::Missing,
    }
  }
}
