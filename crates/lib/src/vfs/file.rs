//! Filesystem leaf values.
//!
//! Every file observation made during a build goes through a `FILE` key, so the
//! evaluator knows exactly which paths a lookup depended on and can invalidate
//! them individually.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::trace;

use super::RootedPath;
use crate::skyframe::{Environment, FunctionError, FunctionFailure, Lookup, SkyFunction, SkyKey, SkyValue};

/// What a path resolved to after following symlinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
  RegularFile,
  Directory,
  /// Exists but is neither a file nor a directory, e.g. a socket or device.
  Special,
  NonExistent,
}

impl FileKind {
  fn of(metadata: &fs::Metadata) -> Self {
    let file_type = metadata.file_type();
    if file_type.is_file() {
      FileKind::RegularFile
    } else if file_type.is_dir() {
      FileKind::Directory
    } else {
      FileKind::Special
    }
  }
}

/// The observed state of one rooted path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileValue {
  pub path: RootedPath,
  pub kind: FileKind,
  /// Where the path led after following symlinks. `None` if it was not a symlink.
  pub real_path: Option<PathBuf>,
}

impl FileValue {
  pub fn exists(&self) -> bool {
    self.kind != FileKind::NonExistent
  }

  pub fn is_file(&self) -> bool {
    self.kind == FileKind::RegularFile
  }

  pub fn is_directory(&self) -> bool {
    self.kind == FileKind::Directory
  }

  pub fn is_symlink(&self) -> bool {
    self.real_path.is_some()
  }
}

/// Result of resolving a path on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
  pub kind: FileKind,
  pub real_path: Option<PathBuf>,
}

/// Resolve `path`, following symlinks one hop at a time.
///
/// A path that does not exist, or a symlink chain ending at one, is reported as
/// `NonExistent` rather than as an error.
pub fn stat_path(path: &Path) -> Result<Stat, FunctionError> {
  let mut current = path.to_path_buf();
  let mut visited = HashSet::new();
  let mut followed = false;

  let kind = loop {
    let metadata = match fs::symlink_metadata(&current) {
      Ok(metadata) => metadata,
      Err(e) if e.kind() == io::ErrorKind::NotFound => break FileKind::NonExistent,
      // a loop through one of the ancestors, found by the OS resolver
      Err(e) if is_symlink_loop(&e) => return Err(FunctionError::SymlinkCycle { path: path.to_path_buf() }),
      Err(e) => return Err(io_error(&current, &e)),
    };

    if !metadata.file_type().is_symlink() {
      break FileKind::of(&metadata);
    }

    if !visited.insert(normalize(&current)) {
      return Err(FunctionError::SymlinkCycle { path: path.to_path_buf() });
    }
    let target = fs::read_link(&current).map_err(|e| io_error(&current, &e))?;
    trace!(link = %current.display(), target = %target.display(), "following symlink");
    current = match current.parent() {
      Some(parent) if target.is_relative() => parent.join(target),
      _ => target,
    };
    followed = true;
  };

  if followed {
    check_consistent(path, kind)?;
  }

  Ok(Stat {
    kind,
    real_path: followed.then(|| dunce::simplified(&current).to_path_buf()),
  })
}

/// Stat `path` again through the OS resolver and make sure it agrees with the
/// manual resolution.
fn check_consistent(path: &Path, kind: FileKind) -> Result<(), FunctionError> {
  let observed = match fs::metadata(path) {
    Ok(metadata) => FileKind::of(&metadata),
    Err(e) if e.kind() == io::ErrorKind::NotFound => FileKind::NonExistent,
    // Loops the OS detects are reported by the manual walk.
    Err(_) => return Ok(()),
  };
  if observed != kind {
    return Err(FunctionError::InconsistentFilesystem {
      path: path.to_path_buf(),
      message: format!("resolved as {:?} but stat reports {:?}", kind, observed),
    });
  }
  Ok(())
}

/// Collapse `.` and `..` without touching the disk, so `t/../t/a` and `t/a` count
/// as the same visited link.
fn normalize(path: &Path) -> PathBuf {
  let mut out = PathBuf::new();
  for component in path.components() {
    match component {
      Component::CurDir => {}
      Component::ParentDir if matches!(out.components().next_back(), Some(Component::Normal(_))) => {
        out.pop();
      }
      other => out.push(other.as_os_str()),
    }
  }
  out
}

#[cfg(unix)]
fn is_symlink_loop(err: &io::Error) -> bool {
  err.raw_os_error() == Some(libc::ELOOP)
}

#[cfg(not(unix))]
fn is_symlink_loop(_err: &io::Error) -> bool {
  false
}

fn io_error(path: &Path, err: &io::Error) -> FunctionError {
  FunctionError::Io {
    path: path.to_path_buf(),
    message: err.to_string(),
  }
}

/// Computes `FILE` keys from the real disk.
#[derive(Debug, Default)]
pub struct FileFunction;

impl SkyFunction for FileFunction {
  fn compute(&self, key: &SkyKey, _env: &mut Environment) -> Result<Lookup<SkyValue>, FunctionFailure> {
    let Some(rooted) = key.rooted_path() else {
      return Err(FunctionFailure::persistent(FunctionError::ConfigEval {
        message: format!("FILE key without a path argument: {}", key),
      }));
    };

    let stat = stat_path(&rooted.as_path()).map_err(FunctionFailure::persistent)?;
    trace!(path = %rooted, kind = ?stat.kind, "stat");
    Ok(Lookup::Ready(SkyValue::File(FileValue {
      path: rooted.clone(),
      kind: stat.kind,
      real_path: stat.real_path,
    })))
  }
}
