//! Incremental evaluation graph.
//!
//! This module provides the restart-based evaluation engine:
//! - `SkyKey` / `SkyValue`: identifiers and immutable results of computations
//! - `SkyFunction`: a computation, re-invoked from scratch until its dependencies are ready
//! - `Environment`: the per-restart view through which a function requests dependencies
//! - `Evaluator`: drives keys to completion in parallel, caches results, and re-checks
//!   them incrementally between builds
//!
//! # Restart Protocol
//!
//! A function asks the [`Environment`] for each dependency it needs. A dependency that is
//! not yet computed comes back as [`Lookup::Missing`]; the function then returns
//! `Ok(Lookup::Missing)` and the evaluator schedules the missing keys, waits for them
//! without holding a worker, and calls the function again from the beginning.

mod cancel;
mod environment;
mod error;
mod evaluator;
mod graph;
mod types;

pub use cancel::CancelToken;
pub use environment::Environment;
pub use error::{ErrorKind, EvalError, FunctionError, FunctionFailure, SkyError, Transience};
pub use evaluator::{EvaluationResult, Evaluator, EvaluatorConfig, SkyFunction};
pub use graph::NodeEntry;
pub use types::{FunctionName, KeyArgument, Lookup, SkyKey, SkyValue};
