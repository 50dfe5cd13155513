//! Package lookup.
//!
//! Resolves a [`PackageIdentifier`](crate::label::PackageIdentifier) to the root
//! that holds its build file:
//! - main-repository packages search the package path in order
//! - external-repository packages look inside the repository's directory
//! - the `external` package resolves to the root holding the workspace file

mod deleted;
mod function;
mod value;

pub use deleted::{DeletedPackages, DeletedSnapshot};
pub use function::PackageLookupFunction;
pub use value::PackageLookupValue;
