//! Failure types produced by computations and by the evaluator itself.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::types::{FunctionName, SkyKey};

/// Whether a failure stays valid across builds.
///
/// A persistent failure is reused for as long as the dependencies it was computed
/// from are unchanged. A transient failure is recomputed on every build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transience {
  Persistent,
  Transient,
}

/// Discriminant of [`FunctionError`], used to declare which dependency failures a
/// function wants to handle itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  Io,
  SymlinkCycle,
  InconsistentFilesystem,
  NoSuchPackage,
  ConfigEval,
  BuildFileNotFound,
  Cycle,
}

/// What went wrong inside a computation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FunctionError {
  /// Reading the filesystem failed.
  #[error("io error reading {}: {message}", .path.display())]
  Io { path: PathBuf, message: String },

  /// Following symlinks from `path` revisited a link.
  #[error("symlink cycle detected at {}", .path.display())]
  SymlinkCycle { path: PathBuf },

  /// Two observations of the same path within one build disagreed.
  #[error("inconsistent filesystem state at {}: {message}", .path.display())]
  InconsistentFilesystem { path: PathBuf, message: String },

  /// A package or repository does not exist.
  #[error("no such package '{package}': {message}")]
  NoSuchPackage { package: String, message: String },

  /// Evaluating a repository declaration failed.
  #[error("error evaluating repository configuration: {message}")]
  ConfigEval { message: String },

  /// The build file of a package could not be determined.
  #[error("no such package '{package}': {message}")]
  BuildFileNotFound { package: String, message: String },

  /// Keys that transitively wait on themselves.
  #[error("dependency cycle detected: {}", .keys.join(" -> "))]
  Cycle { keys: Vec<String> },
}

impl FunctionError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      FunctionError::Io { .. } => ErrorKind::Io,
      FunctionError::SymlinkCycle { .. } => ErrorKind::SymlinkCycle,
      FunctionError::InconsistentFilesystem { .. } => ErrorKind::InconsistentFilesystem,
      FunctionError::NoSuchPackage { .. } => ErrorKind::NoSuchPackage,
      FunctionError::ConfigEval { .. } => ErrorKind::ConfigEval,
      FunctionError::BuildFileNotFound { .. } => ErrorKind::BuildFileNotFound,
      FunctionError::Cycle { .. } => ErrorKind::Cycle,
    }
  }

  /// The filesystem path the failure is about, if any.
  pub fn path(&self) -> Option<&Path> {
    match self {
      FunctionError::Io { path, .. }
      | FunctionError::SymlinkCycle { path }
      | FunctionError::InconsistentFilesystem { path, .. } => Some(path),
      _ => None,
    }
  }

  /// Plain description of the underlying cause, without the path prefix.
  pub fn cause(&self) -> String {
    match self {
      FunctionError::Io { message, .. }
      | FunctionError::InconsistentFilesystem { message, .. }
      | FunctionError::NoSuchPackage { message, .. }
      | FunctionError::ConfigEval { message }
      | FunctionError::BuildFileNotFound { message, .. } => message.clone(),
      other => other.to_string(),
    }
  }
}

/// A failure raised by a computation together with its transience.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct FunctionFailure {
  pub error: FunctionError,
  pub transience: Transience,
}

impl FunctionFailure {
  pub fn persistent(error: FunctionError) -> Self {
    Self {
      error,
      transience: Transience::Persistent,
    }
  }

  pub fn transient(error: FunctionError) -> Self {
    Self {
      error,
      transience: Transience::Transient,
    }
  }
}

/// A failure stored in the graph for a key.
///
/// `root_cause` is the key whose function raised the failure; keys that merely
/// depended on it carry the same root cause.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{error}")]
pub struct SkyError {
  pub root_cause: SkyKey,
  pub error: FunctionError,
  pub transience: Transience,
}

impl SkyError {
  pub fn new(root_cause: SkyKey, failure: FunctionFailure) -> Self {
    Self {
      root_cause,
      error: failure.error,
      transience: failure.transience,
    }
  }

  pub fn kind(&self) -> ErrorKind {
    self.error.kind()
  }

  pub fn is_transient(&self) -> bool {
    self.transience == Transience::Transient
  }
}

/// Errors that abort an evaluation as a whole rather than failing a single key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
  /// The evaluation was cancelled; nothing was committed for unfinished keys.
  #[error("evaluation cancelled")]
  Cancelled,

  /// No function is registered for a requested key.
  #[error("no function registered for {function} (requested by key {key})")]
  MissingFunction { function: FunctionName, key: SkyKey },

  /// A function reported missing dependencies without requesting any.
  #[error("function for {key} returned incomplete without requesting a missing dependency")]
  Stalled { key: SkyKey },

  /// A function panicked.
  #[error("function for {key} panicked: {message}")]
  Panicked { key: SkyKey, message: String },

  /// The task evaluating a key went away without reporting a result.
  #[error("evaluation of {key} was abandoned")]
  Abandoned { key: SkyKey },
}
