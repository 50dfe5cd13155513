use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use super::{LabelError, RepositoryName};

/// Identifies a package: a repository plus a `/`-separated path fragment.
///
/// The fragment is stored as written and is not validated here; package lookup
/// validates it so that a bad name becomes a value rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageIdentifier {
  repository: RepositoryName,
  package: String,
}

impl PackageIdentifier {
  pub fn new(repository: RepositoryName, package: impl Into<String>) -> Self {
    Self {
      repository,
      package: package.into(),
    }
  }

  /// A package in the main repository.
  pub fn main(package: impl Into<String>) -> Self {
    Self::new(RepositoryName::main(), package)
  }

  pub fn repository(&self) -> &RepositoryName {
    &self.repository
  }

  /// The package path fragment, e.g. `foo/bar`. Empty for the root package.
  pub fn package(&self) -> &str {
    &self.package
  }

  /// Path of a file named `name` inside this package, relative to a root.
  pub fn child(&self, name: &str) -> PathBuf {
    if self.package.is_empty() {
      PathBuf::from(name)
    } else {
      PathBuf::from(&self.package).join(name)
    }
  }
}

impl fmt::Display for PackageIdentifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.repository.is_main() {
      write!(f, "//{}", self.package)
    } else {
      write!(f, "{}//{}", self.repository, self.package)
    }
  }
}

impl FromStr for PackageIdentifier {
  type Err = LabelError;

  /// Accepts `@repo//pkg`, `//pkg` and a bare `pkg`.
  fn from_str(s: &str) -> Result<Self, Self::Err> {
    if let Some(rest) = s.strip_prefix('@') {
      let Some((repo, package)) = rest.split_once("//") else {
        return Err(LabelError::MissingSeparator { input: s.to_string() });
      };
      return Ok(Self::new(RepositoryName::new(repo)?, package));
    }

    let package = s.strip_prefix("//").unwrap_or(s);
    Ok(Self::main(package))
  }
}

impl Serialize for PackageIdentifier {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_main_repository_forms() {
    let absolute: PackageIdentifier = "//foo/bar".parse().unwrap();
    let bare: PackageIdentifier = "foo/bar".parse().unwrap();
    assert_eq!(absolute, bare);
    assert!(absolute.repository().is_main());
    assert_eq!(absolute.package(), "foo/bar");
    assert_eq!(absolute.to_string(), "//foo/bar");
  }

  #[test]
  fn parse_external_repository() {
    let id: PackageIdentifier = "@rules_x//lib/util".parse().unwrap();
    assert_eq!(id.repository().name(), "rules_x");
    assert_eq!(id.package(), "lib/util");
    assert_eq!(id.to_string(), "@rules_x//lib/util");
  }

  #[test]
  fn parse_external_root_package() {
    let id: PackageIdentifier = "@foo//".parse().unwrap();
    assert_eq!(id.package(), "");
    assert_eq!(id.child("BUILD"), PathBuf::from("BUILD"));
  }

  #[test]
  fn parse_rejects_repository_without_separator() {
    let err = "@foo".parse::<PackageIdentifier>().unwrap_err();
    assert_eq!(err, LabelError::MissingSeparator { input: "@foo".to_string() });
  }

  #[test]
  fn parse_does_not_validate_package_fragment() {
    let id: PackageIdentifier = "//foo//bar".parse().unwrap();
    assert_eq!(id.package(), "foo//bar");
  }

  #[test]
  fn child_joins_fragment() {
    let id = PackageIdentifier::main("a/b");
    assert_eq!(id.child("BUILD"), PathBuf::from("a/b/BUILD"));
  }
}
