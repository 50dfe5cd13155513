use std::path::Path;

use tracing::{debug, trace};

use super::deleted::DeletedPackages;
use super::value::PackageLookupValue;
use crate::consts::{BUILD_FILE_NAME, EXTERNAL_PACKAGE_NAME, WORKSPACE_FILE_NAME};
use crate::label::{PackageIdentifier, validate_package_name};
use crate::precomputed::package_locator;
use crate::skyframe::{
  Environment, ErrorKind, FunctionError, FunctionFailure, Lookup, SkyFunction, SkyKey, SkyValue,
};
use crate::vfs::{FileValue, RootedPath};

/// Computes `PACKAGE_LOOKUP` keys.
///
/// Roots are probed one per restart, so a package found on an early root never
/// depends on the files of later roots.
#[derive(Debug, Clone, Default)]
pub struct PackageLookupFunction {
  deleted: DeletedPackages,
}

impl PackageLookupFunction {
  pub fn new(deleted: DeletedPackages) -> Self {
    Self { deleted }
  }

  fn lookup_main(&self, id: &PackageIdentifier, env: &mut Environment) -> Result<Lookup<PackageLookupValue>, FunctionFailure> {
    let package = id.package();
    if let Some(invalid) = invalid_name(package) {
      return Ok(Lookup::Ready(invalid));
    }

    let deleted = self.deleted.load();
    if deleted.contains(package) {
      trace!(package, version = deleted.version(), "package is deleted");
      return Ok(Lookup::Ready(PackageLookupValue::Deleted));
    }

    let Lookup::Ready(locator) = package_locator(env)? else {
      return Ok(Lookup::Missing);
    };
    for root in locator.roots() {
      let build_file = RootedPath::new(root, id.child(BUILD_FILE_NAME));
      let Lookup::Ready(file) = file_value(env, &build_file)? else {
        return Ok(Lookup::Missing);
      };
      if file.is_file() {
        debug!(package = %id, root = %root.display(), "found package");
        return Ok(Lookup::Ready(PackageLookupValue::Found { root: root.clone() }));
      }
    }
    Ok(Lookup::Ready(PackageLookupValue::NotFound))
  }

  fn lookup_external(&self, id: &PackageIdentifier, env: &mut Environment) -> Result<Lookup<PackageLookupValue>, FunctionFailure> {
    // the fragment is joined onto the repository path, so it must stay inside it
    if let Some(invalid) = invalid_name(id.package()) {
      return Ok(Lookup::Ready(invalid));
    }

    let repository_key = SkyKey::repository(id.repository().clone());
    let declared = [ErrorKind::NoSuchPackage, ErrorKind::Io, ErrorKind::ConfigEval];
    let value = match env.get_value_or_fail(&repository_key, &declared) {
      Ok(Lookup::Ready(value)) => value,
      Ok(Lookup::Missing) => return Ok(Lookup::Missing),
      Err(err) if err.kind() == ErrorKind::NoSuchPackage => {
        return Err(FunctionFailure::persistent(err.error));
      }
      Err(err) => {
        return Err(FunctionFailure::persistent(FunctionError::BuildFileNotFound {
          package: EXTERNAL_PACKAGE_NAME.to_string(),
          message: err.error.cause(),
        }));
      }
    };
    let Some(repository) = value.as_repository() else {
      return Err(unexpected(&repository_key, &value));
    };

    let build_file = RootedPath::new(&repository.path, id.child(BUILD_FILE_NAME));
    let Lookup::Ready(file) = file_value(env, &build_file)? else {
      return Ok(Lookup::Missing);
    };
    if !file.is_file() {
      return Ok(Lookup::Ready(PackageLookupValue::NotFound));
    }

    let root = repository.path.clone();
    Ok(Lookup::Ready(match &repository.overlay {
      Some(overlay) => PackageLookupValue::OverlaidBuildFile {
        root,
        overlay: overlay.clone(),
      },
      None => PackageLookupValue::Found { root },
    }))
  }

  /// Find the first root with a workspace file, falling back to the last root.
  fn lookup_workspace(&self, env: &mut Environment) -> Result<Lookup<PackageLookupValue>, FunctionFailure> {
    let Lookup::Ready(locator) = package_locator(env)? else {
      return Ok(Lookup::Missing);
    };
    for root in locator.roots() {
      let marker = RootedPath::new(root, WORKSPACE_FILE_NAME);
      let Lookup::Ready(file) = file_value(env, &marker)? else {
        return Ok(Lookup::Missing);
      };
      if file.exists() {
        return Ok(Lookup::Ready(PackageLookupValue::Workspace { root: root.clone() }));
      }
    }
    trace!(root = %locator.last().display(), "no workspace file, using last root");
    Ok(Lookup::Ready(PackageLookupValue::Workspace {
      root: locator.last().to_path_buf(),
    }))
  }
}

impl SkyFunction for PackageLookupFunction {
  fn compute(&self, key: &SkyKey, env: &mut Environment) -> Result<Lookup<SkyValue>, FunctionFailure> {
    let Some(id) = key.package_identifier() else {
      return Err(FunctionFailure::persistent(FunctionError::ConfigEval {
        message: format!("PACKAGE_LOOKUP key without a package argument: {}", key),
      }));
    };

    let lookup = if !id.repository().is_main() {
      self.lookup_external(id, env)?
    } else if id.package() == EXTERNAL_PACKAGE_NAME {
      self.lookup_workspace(env)?
    } else {
      self.lookup_main(id, env)?
    };
    Ok(lookup.map(SkyValue::PackageLookup))
  }
}

fn invalid_name(package: &str) -> Option<PackageLookupValue> {
  let message = validate_package_name(package)?;
  trace!(package, message, "invalid package name");
  Some(PackageLookupValue::InvalidName {
    reason: format!("Invalid package name '{}': {}", package, message),
  })
}

/// Request the file value for `path`, translating filesystem failures into
/// failures of the package being looked up.
fn file_value(env: &mut Environment, path: &RootedPath) -> Result<Lookup<FileValue>, FunctionFailure> {
  let key = SkyKey::file(path.clone());
  let declared = [ErrorKind::Io, ErrorKind::SymlinkCycle, ErrorKind::InconsistentFilesystem];
  let absolute = path.as_path();
  let basename = absolute
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();

  match env.get_value_or_fail(&key, &declared) {
    Ok(Lookup::Missing) => Ok(Lookup::Missing),
    Ok(Lookup::Ready(value)) => match value.as_file() {
      Some(file) => Ok(Lookup::Ready(file.clone())),
      None => Err(unexpected(&key, &value)),
    },
    Err(err) => {
      let error = match err.kind() {
        ErrorKind::Io => FunctionError::BuildFileNotFound {
          package: path.relative().parent().unwrap_or(Path::new("")).display().to_string(),
          message: format!(
            "IO errors while looking for {} file reading {}: {}",
            basename,
            absolute.display(),
            err.error.cause()
          ),
        },
        ErrorKind::SymlinkCycle => FunctionError::BuildFileNotFound {
          package: absolute.display().to_string(),
          message: format!(
            "Symlink cycle detected while trying to find {} file {}",
            basename,
            absolute.display()
          ),
        },
        _ => err.error,
      };
      Err(FunctionFailure::persistent(error))
    }
  }
}

fn unexpected(key: &SkyKey, value: &SkyValue) -> FunctionFailure {
  FunctionFailure::persistent(FunctionError::ConfigEval {
    message: format!("unexpected value for {}: {:?}", key, value),
  })
}
