use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// A path split into a root and a path relative to that root.
///
/// Two rooted paths naming the same file through different roots are distinct
/// keys; package lookup relies on this to know which root a file came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RootedPath {
  root: PathBuf,
  relative: PathBuf,
}

impl RootedPath {
  pub fn new(root: impl Into<PathBuf>, relative: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      relative: relative.into(),
    }
  }

  /// A rooted path that is the root itself.
  pub fn root_only(root: impl Into<PathBuf>) -> Self {
    Self::new(root, PathBuf::new())
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn relative(&self) -> &Path {
    &self.relative
  }

  /// The absolute path this rooted path denotes.
  pub fn as_path(&self) -> PathBuf {
    if self.relative.as_os_str().is_empty() {
      self.root.clone()
    } else {
      self.root.join(&self.relative)
    }
  }

  /// Whether the denoted path equals `path` or lies beneath it.
  pub fn is_under(&self, path: &Path) -> bool {
    self.as_path().starts_with(path)
  }
}

impl fmt::Display for RootedPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_path().display())
  }
}
