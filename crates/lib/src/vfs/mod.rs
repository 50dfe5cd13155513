//! Filesystem view used by the evaluator.
//!
//! Every filesystem observation made during evaluation goes through a
//! [`FileValue`] key so that it is cached and can be invalidated.

mod file;
mod rooted;

pub use file::{FileFunction, FileKind, FileValue, Stat, stat_path};
pub use rooted::RootedPath;
