//! Workspace configuration.
//!
//! Settings come from `bramble.toml` at the workspace root, then from
//! `BRAMBLE_*` environment variables, then from command-line flags. Paths in the
//! file may use `%workspace%`; relative paths are resolved against the workspace.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::consts::{CONFIG_FILENAME, ENV_DELETED_PACKAGES, ENV_JOBS, ENV_PACKAGE_PATH, WORKSPACE_PLACEHOLDER};
use crate::label::{LabelError, RepositoryName, validate_package_name};
use crate::precomputed::PathPackageLocator;
use crate::repository::{RepositoryDirectory, RepositoryRule};

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {}: {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("invalid config file {}: {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[error(transparent)]
  Label(#[from] LabelError),

  #[error("the package path must contain at least one root")]
  EmptyPackagePath,

  #[error("invalid deleted package '{name}': {reason}")]
  InvalidDeletedPackage { name: String, reason: String },

  #[error("jobs must be at least 1")]
  InvalidJobs,

  #[error("invalid value '{value}' for {name}: {message}")]
  InvalidEnv { name: String, value: String, message: String },
}

/// Raw contents of `bramble.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
  package_path: Option<Vec<String>>,
  deleted_packages: Vec<String>,
  evaluator: EvaluatorSection,
  repositories: BTreeMap<String, RepositoryEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EvaluatorSection {
  jobs: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RepositoryEntry {
  path: String,
  build_file: Option<String>,
}

/// Effective configuration for a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrambleConfig {
  /// Directory holding the config file, or the directory bramble was started in.
  pub workspace: PathBuf,
  /// Roots searched for packages, highest priority first.
  pub package_path: Vec<PathBuf>,
  pub deleted_packages: Vec<String>,
  pub jobs: usize,
  pub repositories: RepositoryDirectory,
}

impl BrambleConfig {
  /// Defaults for `workspace`: the workspace is the only root.
  pub fn for_workspace(workspace: impl Into<PathBuf>) -> Self {
    let workspace = workspace.into();
    Self {
      package_path: vec![workspace.clone()],
      workspace,
      deleted_packages: Vec::new(),
      jobs: default_jobs(),
      repositories: RepositoryDirectory::default(),
    }
  }

  /// Load the config file at `path`. Its directory becomes the workspace.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    let file: ConfigFile = toml::from_str(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })?;

    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let workspace = dunce::canonicalize(parent).map_err(|source| ConfigError::Read {
      path: parent.to_path_buf(),
      source,
    })?;
    debug!(path = %path.display(), workspace = %workspace.display(), "loaded config file");
    Self::from_file(file, workspace)
  }

  /// Parse config text for `workspace` without touching the disk.
  pub fn parse(content: &str, workspace: impl Into<PathBuf>) -> Result<Self, ConfigError> {
    let file: ConfigFile = toml::from_str(content).map_err(|source| ConfigError::Parse {
      path: PathBuf::from(CONFIG_FILENAME),
      source,
    })?;
    Self::from_file(file, workspace.into())
  }

  /// Find `bramble.toml` in `start` or one of its ancestors and load it.
  ///
  /// Without a config file, `start` is the workspace and defaults apply.
  pub fn discover(start: &Path) -> Result<Self, ConfigError> {
    let start = dunce::canonicalize(start).map_err(|source| ConfigError::Read {
      path: start.to_path_buf(),
      source,
    })?;
    for dir in start.ancestors() {
      let candidate = dir.join(CONFIG_FILENAME);
      if candidate.is_file() {
        return Self::load(&candidate);
      }
    }
    debug!(workspace = %start.display(), "no config file found, using defaults");
    Ok(Self::for_workspace(start))
  }

  fn from_file(file: ConfigFile, workspace: PathBuf) -> Result<Self, ConfigError> {
    let mut config = Self::for_workspace(workspace);
    if let Some(entries) = file.package_path {
      config.set_package_path(&entries);
    }
    config.deleted_packages = file.deleted_packages;
    if let Some(jobs) = file.evaluator.jobs {
      config.jobs = jobs;
    }

    let mut rules = BTreeMap::new();
    for (name, entry) in file.repositories {
      let rule = RepositoryRule {
        path: config.expand(&entry.path),
        build_file: entry.build_file.as_deref().map(|f| config.expand(f)),
      };
      rules.insert(RepositoryName::new(&name)?, rule);
    }
    config.repositories = RepositoryDirectory::new(rules);

    config.validate()?;
    Ok(config)
  }

  /// Apply `BRAMBLE_*` environment overrides.
  pub fn apply_env(&mut self) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(ENV_PACKAGE_PATH) {
      let entries: Vec<String> = split_list(&value, ':');
      debug!(entries = entries.len(), "package path from environment");
      self.set_package_path(&entries);
    }
    if let Ok(value) = std::env::var(ENV_DELETED_PACKAGES) {
      self.deleted_packages = split_list(&value, ',');
    }
    if let Ok(value) = std::env::var(ENV_JOBS) {
      self.jobs = value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidEnv {
        name: ENV_JOBS.to_string(),
        value: value.clone(),
        message: e.to_string(),
      })?;
    }
    self.validate()
  }

  /// Replace the package path, expanding `%workspace%` and relative entries.
  pub fn set_package_path(&mut self, entries: &[String]) {
    self.package_path = entries.iter().map(|entry| self.expand(entry)).collect();
  }

  pub fn locator(&self) -> Result<PathPackageLocator, ConfigError> {
    PathPackageLocator::new(self.package_path.clone()).map_err(|_| ConfigError::EmptyPackagePath)
  }

  /// Check the settings that can be checked without the filesystem.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.package_path.is_empty() {
      return Err(ConfigError::EmptyPackagePath);
    }
    if self.jobs == 0 {
      return Err(ConfigError::InvalidJobs);
    }
    for name in &self.deleted_packages {
      if let Some(reason) = validate_package_name(name) {
        return Err(ConfigError::InvalidDeletedPackage {
          name: name.clone(),
          reason: reason.to_string(),
        });
      }
    }
    Ok(())
  }

  fn expand(&self, entry: &str) -> PathBuf {
    let workspace = self.workspace.to_string_lossy();
    let path = PathBuf::from(entry.replace(WORKSPACE_PLACEHOLDER, &workspace));
    if path.is_relative() {
      self.workspace.join(path)
    } else {
      path
    }
  }
}

fn split_list(value: &str, separator: char) -> Vec<String> {
  value
    .split(separator)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(String::from)
    .collect()
}

fn default_jobs() -> usize {
  std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}
