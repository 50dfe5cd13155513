use std::collections::BTreeSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

/// One published version of the deleted-packages set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedSnapshot {
  version: u64,
  packages: BTreeSet<String>,
}

impl DeletedSnapshot {
  pub fn version(&self) -> u64 {
    self.version
  }

  pub fn contains(&self, package: &str) -> bool {
    self.packages.contains(package)
  }

  pub fn packages(&self) -> &BTreeSet<String> {
    &self.packages
  }
}

/// Shared handle to the current deleted-packages set.
///
/// Readers load a whole snapshot and keep using it for the rest of their
/// computation, so a concurrent update is never observed halfway.
#[derive(Debug, Clone)]
pub struct DeletedPackages {
  current: Arc<ArcSwap<DeletedSnapshot>>,
}

impl Default for DeletedPackages {
  fn default() -> Self {
    Self::new()
  }
}

impl DeletedPackages {
  pub fn new() -> Self {
    Self {
      current: Arc::new(ArcSwap::from_pointee(DeletedSnapshot::default())),
    }
  }

  pub fn load(&self) -> Arc<DeletedSnapshot> {
    self.current.load_full()
  }

  /// Replace the set and return the packages whose membership changed.
  pub fn publish(&self, packages: impl IntoIterator<Item = String>) -> BTreeSet<String> {
    let packages: BTreeSet<String> = packages.into_iter().collect();
    let previous = self.current.rcu(|prev| DeletedSnapshot {
      version: prev.version + 1,
      packages: packages.clone(),
    });
    previous.packages.symmetric_difference(&packages).cloned().collect()
  }
}
