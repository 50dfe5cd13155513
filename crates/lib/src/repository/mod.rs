//! External repositories.
//!
//! Repositories other than the main one are declared in the configuration and
//! injected as a [`RepositoryDirectory`]. `REPOSITORY` keys resolve a declaration
//! against the filesystem.

mod function;
mod types;

pub use function::RepositoryFunction;
pub use types::{RepositoryDirectory, RepositoryRule, RepositoryValue};
