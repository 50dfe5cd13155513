//! Long-lived package lookup state.
//!
//! A [`LookupSession`] owns one evaluator configured from a [`BrambleConfig`].
//! Lookups made through the same session share the graph, so later builds only
//! recompute what was invalidated since the previous one.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{BrambleConfig, ConfigError};
use crate::consts::EXTERNAL_PACKAGE_NAME;
use crate::label::{PackageIdentifier, validate_package_name};
use crate::package::{DeletedPackages, PackageLookupFunction, PackageLookupValue};
use crate::precomputed::PathPackageLocator;
use crate::repository::{RepositoryDirectory, RepositoryFunction};
use crate::skyframe::{
  CancelToken, EvalError, Evaluator, EvaluatorConfig, FunctionError, FunctionFailure, FunctionName, SkyError, SkyKey,
};
use crate::vfs::FileFunction;

#[derive(Debug, Error)]
pub enum SessionError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Eval(#[from] EvalError),

  #[error(transparent)]
  Lookup(#[from] SkyError),
}

/// Result of looking up one package.
#[derive(Debug, Clone, PartialEq)]
pub struct PackageLookup {
  pub package: PackageIdentifier,
  pub result: Result<PackageLookupValue, SkyError>,
}

pub struct LookupSession {
  config: BrambleConfig,
  evaluator: Evaluator,
  deleted: DeletedPackages,
}

impl LookupSession {
  /// Build a session for `config` with every lookup function registered.
  pub fn new(config: BrambleConfig) -> Result<Self, SessionError> {
    config.validate()?;
    let locator = config.locator()?;

    let deleted = DeletedPackages::new();
    let evaluator = Evaluator::new(EvaluatorConfig { jobs: config.jobs });
    evaluator.register(FunctionName::FILE, Arc::new(FileFunction));
    evaluator.register(FunctionName::REPOSITORY, Arc::new(RepositoryFunction));
    evaluator.register(
      FunctionName::PACKAGE_LOOKUP,
      Arc::new(PackageLookupFunction::new(deleted.clone())),
    );

    evaluator.inject(PathPackageLocator::key(), locator.into());
    evaluator.inject(RepositoryDirectory::key(), config.repositories.clone().into());
    deleted.publish(config.deleted_packages.iter().cloned());

    info!(
      workspace = %config.workspace.display(),
      roots = config.package_path.len(),
      repositories = config.repositories.len(),
      jobs = config.jobs,
      "lookup session ready"
    );
    Ok(Self {
      config,
      evaluator,
      deleted,
    })
  }

  pub fn config(&self) -> &BrambleConfig {
    &self.config
  }

  pub fn evaluator(&self) -> &Evaluator {
    &self.evaluator
  }

  /// Look up `packages` in one build.
  ///
  /// A failure to look up one package does not affect the others. `Err` means the
  /// build itself could not finish.
  pub async fn lookup(&self, packages: &[PackageIdentifier]) -> Result<Vec<PackageLookup>, SessionError> {
    let keys: Vec<SkyKey> = packages.iter().cloned().map(SkyKey::package_lookup).collect();
    let result = self.evaluator.evaluate(&keys).await?;

    let lookups = packages
      .iter()
      .zip(&keys)
      .map(|(package, key)| {
        let result = match (result.get(key), result.error(key)) {
          (_, Some(err)) => Err(err.clone()),
          (Some(value), None) => value.as_package_lookup().cloned().ok_or_else(|| unexpected(key)),
          (None, None) => Err(unexpected(key)),
        };
        PackageLookup {
          package: package.clone(),
          result,
        }
      })
      .collect();
    Ok(lookups)
  }

  /// The root holding the workspace file.
  pub async fn workspace(&self) -> Result<PathBuf, SessionError> {
    let id = PackageIdentifier::main(EXTERNAL_PACKAGE_NAME);
    let mut lookups = self.lookup(std::slice::from_ref(&id)).await?;
    let lookup = lookups.pop().map(|l| l.result);
    match lookup {
      Some(Ok(PackageLookupValue::Workspace { root })) => Ok(root),
      Some(Err(err)) => Err(err.into()),
      _ => Err(unexpected(&SkyKey::package_lookup(id)).into()),
    }
  }

  /// Replace the package path. Lookups that read it are recomputed on the next build.
  pub fn set_package_path(&mut self, entries: &[String]) -> Result<(), SessionError> {
    let mut config = self.config.clone();
    config.set_package_path(entries);
    let locator = config.locator()?;
    debug!(locator = %locator, "package path changed");
    self.evaluator.inject(PathPackageLocator::key(), locator.into());
    self.config = config;
    Ok(())
  }

  /// Replace the deleted-packages set and invalidate the lookups whose membership
  /// changed. Returns how many lookups were invalidated.
  pub fn set_deleted_packages(&mut self, packages: Vec<String>) -> Result<usize, SessionError> {
    for name in &packages {
      if let Some(reason) = validate_package_name(name) {
        return Err(
          ConfigError::InvalidDeletedPackage {
            name: name.clone(),
            reason: reason.to_string(),
          }
          .into(),
        );
      }
    }

    let changed = self.deleted.publish(packages.iter().cloned());
    self.config.deleted_packages = packages;
    let keys: Vec<SkyKey> = changed
      .into_iter()
      .map(|package| SkyKey::package_lookup(PackageIdentifier::main(package)))
      .collect();
    let invalidated = self.evaluator.invalidate(&keys);
    debug!(changed = keys.len(), invalidated, "deleted packages changed");
    Ok(invalidated)
  }

  /// Invalidate every file observation at or beneath one of `paths`.
  ///
  /// Call after the files changed on disk. Returns how many files were invalidated.
  pub fn invalidate_paths(&self, paths: &[PathBuf]) -> usize {
    let keys: Vec<SkyKey> = self
      .evaluator
      .keys()
      .into_iter()
      .filter(|key| key.function() == FunctionName::FILE)
      .filter(|key| {
        key
          .rooted_path()
          .is_some_and(|path| paths.iter().any(|changed| path.is_under(changed)))
      })
      .collect();
    self.evaluator.invalidate(&keys)
  }

  pub fn cancel_token(&self) -> CancelToken {
    self.evaluator.cancel_token()
  }

  /// Abandon the build in progress, if any.
  pub fn cancel(&self) {
    self.evaluator.cancel();
  }
}

fn unexpected(key: &SkyKey) -> SkyError {
  SkyError::new(
    key.clone(),
    FunctionFailure::persistent(FunctionError::ConfigEval {
      message: format!("no package lookup value for {}", key),
    }),
  )
}
