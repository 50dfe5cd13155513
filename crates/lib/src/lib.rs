//! bramble-lib: incremental package resolution
//!
//! This crate provides the evaluation core and the package lookup built on it:
//! - `skyframe`: keyed computations re-run from scratch until their dependencies are ready
//! - `vfs` / `repository` / `package`: the filesystem, repository and package lookup functions
//! - `session`: a configured evaluator that answers package lookups across builds

pub mod config;
pub mod consts;
pub mod label;
pub mod package;
pub mod precomputed;
pub mod repository;
pub mod session;
pub mod skyframe;
pub mod vfs;
