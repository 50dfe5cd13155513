//! Shared helpers for session tests.

use std::path::{Path, PathBuf};

use bramble_lib::config::BrambleConfig;
use bramble_lib::label::PackageIdentifier;
use bramble_lib::package::PackageLookupValue;
use bramble_lib::session::LookupSession;
use bramble_lib::skyframe::SkyError;
use tempfile::TempDir;

/// A temporary workspace with any number of package roots below it.
pub struct TestWorkspace {
  pub temp: TempDir,
}

impl TestWorkspace {
  pub fn new() -> Self {
    Self {
      temp: TempDir::new().unwrap(),
    }
  }

  /// Canonical workspace directory.
  pub fn root(&self) -> PathBuf {
    dunce::canonicalize(self.temp.path()).unwrap()
  }

  /// Absolute path of `relative` inside the workspace.
  pub fn path(&self, relative: &str) -> PathBuf {
    self.root().join(relative)
  }

  /// Write a file relative to the workspace, creating parent directories.
  pub fn write_file(&self, relative: &str, content: &str) {
    let path = self.path(relative);
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
  }

  pub fn mkdir(&self, relative: &str) {
    std::fs::create_dir_all(self.path(relative)).unwrap();
  }

  /// Parse `bramble.toml` content with this workspace as `%workspace%`.
  pub fn config(&self, content: &str) -> BrambleConfig {
    BrambleConfig::parse(content, self.root()).unwrap()
  }

  pub fn session(&self, content: &str) -> LookupSession {
    LookupSession::new(self.config(content)).unwrap()
  }
}

/// Look up a single package, panicking if the build itself fails.
pub async fn lookup(session: &LookupSession, package: &str) -> Result<PackageLookupValue, SkyError> {
  let id: PackageIdentifier = package.parse().unwrap();
  let mut lookups = session.lookup(&[id]).await.unwrap();
  lookups.pop().unwrap().result
}

pub fn found(root: &Path) -> PackageLookupValue {
  PackageLookupValue::Found {
    root: root.to_path_buf(),
  }
}
