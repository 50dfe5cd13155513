//! Identifier types for repositories and packages.
//!
//! - `RepositoryName`: the main repository or an external `@name` repository
//! - `PackageIdentifier`: a repository plus a package path fragment
//! - `validate_package_name()`: syntactic package-name validation

mod package;
mod repository;
mod validate;

use thiserror::Error;

pub use package::PackageIdentifier;
pub use repository::RepositoryName;
pub use validate::validate_package_name;

/// Errors produced while parsing identifiers from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LabelError {
  /// A repository name contained characters outside `[A-Za-z0-9_.-]`.
  #[error("invalid repository name '{name}': {reason}")]
  InvalidRepositoryName { name: String, reason: String },

  /// `@repo` was not followed by `//`.
  #[error("invalid package identifier '{input}': expected '//' after repository name")]
  MissingSeparator { input: String },
}
