use tracing::debug;

use super::types::RepositoryValue;
use crate::label::RepositoryName;
use crate::precomputed::repository_directory;
use crate::skyframe::{Environment, FunctionError, FunctionFailure, Lookup, SkyFunction, SkyKey, SkyValue};
use crate::vfs::RootedPath;

/// Computes `REPOSITORY` keys from the injected declarations.
///
/// Failures while reading the repository's files keep their own kind; a
/// declaration that does not match the disk is a `NoSuchPackage` or `ConfigEval`
/// failure.
#[derive(Debug, Default)]
pub struct RepositoryFunction;

impl SkyFunction for RepositoryFunction {
  fn compute(&self, key: &SkyKey, env: &mut Environment) -> Result<Lookup<SkyValue>, FunctionFailure> {
    let Some(name) = key.repository_name() else {
      return Err(FunctionFailure::persistent(FunctionError::ConfigEval {
        message: format!("REPOSITORY key without a repository argument: {}", key),
      }));
    };

    let Lookup::Ready(directory) = repository_directory(env)? else {
      return Ok(Lookup::Missing);
    };
    let Some(rule) = directory.get(name) else {
      debug!(repository = %name, "repository not declared");
      return Err(no_such_repository(name, "repository not declared".to_string()));
    };

    let mut keys = vec![SkyKey::file(RootedPath::root_only(&rule.path))];
    if let Some(build_file) = &rule.build_file {
      keys.push(SkyKey::file(RootedPath::root_only(build_file)));
    }
    let values = env.get_values(&keys);
    if values.iter().any(Lookup::is_missing) {
      return Ok(Lookup::Missing);
    }
    let mut files = values
      .into_iter()
      .filter_map(Lookup::ready)
      .map(|value| value.as_file().cloned());

    let directory_ok = files.next().flatten().is_some_and(|file| file.is_directory());
    if !directory_ok {
      return Err(no_such_repository(
        name,
        format!("repository directory {} does not exist", rule.path.display()),
      ));
    }

    let overlay = match (&rule.build_file, files.next().flatten()) {
      (Some(_), Some(file)) if file.is_file() => Some(file),
      (Some(build_file), _) => {
        return Err(FunctionFailure::persistent(FunctionError::ConfigEval {
          message: format!("overlay build file {} does not exist", build_file.display()),
        }));
      }
      (None, _) => None,
    };

    Ok(Lookup::Ready(SkyValue::Repository(RepositoryValue {
      path: rule.path.clone(),
      overlay,
    })))
  }
}

fn no_such_repository(name: &RepositoryName, message: String) -> FunctionFailure {
  FunctionFailure::persistent(FunctionError::NoSuchPackage {
    package: format!("{}//", name),
    message,
  })
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;
  use std::fs;
  use std::path::Path;
  use std::sync::Arc;

  use tempfile::TempDir;

  use super::*;
  use crate::repository::{RepositoryDirectory, RepositoryRule};
  use crate::skyframe::{ErrorKind, Evaluator, EvaluatorConfig, FunctionName, SkyError};
  use crate::vfs::FileFunction;

  fn evaluator(rules: Vec<(&str, RepositoryRule)>) -> Evaluator {
    let evaluator = Evaluator::new(EvaluatorConfig { jobs: 2 });
    evaluator.register(FunctionName::FILE, Arc::new(FileFunction));
    evaluator.register(FunctionName::REPOSITORY, Arc::new(RepositoryFunction));
    let rules: BTreeMap<_, _> = rules
      .into_iter()
      .map(|(name, rule)| (RepositoryName::new(name).unwrap(), rule))
      .collect();
    evaluator.inject(RepositoryDirectory::key(), RepositoryDirectory::new(rules).into());
    evaluator
  }

  fn rule(path: &Path, build_file: Option<&Path>) -> RepositoryRule {
    RepositoryRule {
      path: path.to_path_buf(),
      build_file: build_file.map(Path::to_path_buf),
    }
  }

  async fn resolve(evaluator: &Evaluator, name: &str) -> Result<RepositoryValue, SkyError> {
    let key = SkyKey::repository(RepositoryName::new(name).unwrap());
    let result = evaluator.evaluate(std::slice::from_ref(&key)).await.unwrap();
    match result.error(&key) {
      Some(err) => Err(err.clone()),
      None => Ok(result.get(&key).unwrap().as_repository().unwrap().clone()),
    }
  }

  #[tokio::test]
  async fn declared_repository_resolves() {
    let temp = TempDir::new().unwrap();
    let evaluator = evaluator(vec![("foo", rule(temp.path(), None))]);

    let value = resolve(&evaluator, "foo").await.unwrap();
    assert_eq!(value.path, temp.path());
    assert!(!value.has_overlay());
  }

  #[tokio::test]
  async fn overlay_is_recorded() {
    let temp = TempDir::new().unwrap();
    let overlay = temp.path().join("foo.BUILD");
    fs::write(&overlay, "").unwrap();
    let evaluator = evaluator(vec![("foo", rule(temp.path(), Some(&overlay)))]);

    let value = resolve(&evaluator, "foo").await.unwrap();
    let file = value.overlay.unwrap();
    assert!(file.is_file());
    assert_eq!(file.path.as_path(), overlay);
  }

  #[tokio::test]
  async fn undeclared_repository_is_no_such_package() {
    let evaluator = evaluator(vec![]);
    let err = resolve(&evaluator, "nope").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchPackage);
    assert_eq!(err.to_string(), "no such package '@nope//': repository not declared");
  }

  #[tokio::test]
  async fn missing_directory_is_no_such_package() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("gone");
    let evaluator = evaluator(vec![("foo", rule(&missing, None))]);

    let err = resolve(&evaluator, "foo").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoSuchPackage);
    assert!(err.error.cause().contains("does not exist"));
  }

  #[tokio::test]
  async fn missing_overlay_is_config_error() {
    let temp = TempDir::new().unwrap();
    let overlay = temp.path().join("foo.BUILD");
    let evaluator = evaluator(vec![("foo", rule(temp.path(), Some(&overlay)))]);

    let err = resolve(&evaluator, "foo").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigEval);
    assert_eq!(
      err.error.cause(),
      format!("overlay build file {} does not exist", overlay.display())
    );
  }
}
