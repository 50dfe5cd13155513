use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::vfs::FileValue;

/// Outcome of looking up a package.
///
/// Only filesystem and repository failures are errors; a missing or malformed
/// package is a value so it can be cached like any other result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PackageLookupValue {
  /// The package's build file lives under `root`.
  Found { root: PathBuf },
  /// No root has a build file for the package.
  NotFound,
  /// The package name failed validation.
  InvalidName { reason: String },
  /// The package is listed in the deleted-packages set.
  Deleted,
  /// An external package whose repository supplies its own build file.
  OverlaidBuildFile { root: PathBuf, overlay: FileValue },
  /// The root holding the workspace file.
  Workspace { root: PathBuf },
}

impl PackageLookupValue {
  pub fn package_exists(&self) -> bool {
    matches!(
      self,
      PackageLookupValue::Found { .. } | PackageLookupValue::OverlaidBuildFile { .. } | PackageLookupValue::Workspace { .. }
    )
  }

  pub fn root(&self) -> Option<&Path> {
    match self {
      PackageLookupValue::Found { root }
      | PackageLookupValue::OverlaidBuildFile { root, .. }
      | PackageLookupValue::Workspace { root } => Some(root),
      _ => None,
    }
  }

  /// Why the package does not exist, or `None` if it does.
  pub fn error_reason(&self) -> Option<String> {
    match self {
      PackageLookupValue::NotFound => Some("BUILD file not found on package path".to_string()),
      PackageLookupValue::InvalidName { reason } => Some(reason.clone()),
      PackageLookupValue::Deleted => Some("package is considered deleted due to the deleted packages setting".to_string()),
      _ => None,
    }
  }
}
