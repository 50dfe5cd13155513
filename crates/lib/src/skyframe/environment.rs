use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::error::{ErrorKind, SkyError};
use super::graph::{InMemoryGraph, Version};
use super::types::{Lookup, SkyKey, SkyValue};

type Observed = Option<Result<Arc<SkyValue>, SkyError>>;

/// A function's view of the graph for a single restart.
///
/// Every request is recorded as a dependency edge, in the order issued. Answers are
/// memoized for the lifetime of the environment, so asking twice for the same key
/// within one restart always gives the same answer.
pub struct Environment {
  graph: Arc<InMemoryGraph>,
  version: Version,
  observed: HashMap<SkyKey, Observed>,
  deps: Vec<SkyKey>,
  missing: Vec<SkyKey>,
  propagated: Option<SkyError>,
}

/// What the evaluator needs from an environment once the function has returned.
pub(crate) struct Requests {
  pub deps: Vec<SkyKey>,
  pub missing: Vec<SkyKey>,
  pub propagated: Option<SkyError>,
}

impl Environment {
  pub(crate) fn new(graph: Arc<InMemoryGraph>, version: Version) -> Self {
    Self {
      graph,
      version,
      observed: HashMap::new(),
      deps: Vec::new(),
      missing: Vec::new(),
      propagated: None,
    }
  }

  /// Request the value of `key`.
  ///
  /// Returns `Lookup::Missing` if the key has not been computed for this build yet.
  /// A failed dependency also yields `Lookup::Missing`; its failure becomes the
  /// requesting key's failure once the function returns.
  pub fn get_value(&mut self, key: &SkyKey) -> Lookup<Arc<SkyValue>> {
    match self.get_value_or_fail(key, &[]) {
      Ok(lookup) => lookup,
      Err(_) => Lookup::Missing,
    }
  }

  /// Request the value of `key`, handing back failures of the `declared` kinds.
  ///
  /// A dependency failure whose kind is in `declared` is returned as `Err` so the
  /// caller can translate it. Any other failure is treated as in [`get_value`].
  ///
  /// [`get_value`]: Environment::get_value
  pub fn get_value_or_fail(&mut self, key: &SkyKey, declared: &[ErrorKind]) -> Result<Lookup<Arc<SkyValue>>, SkyError> {
    match self.observe(key) {
      None => Ok(Lookup::Missing),
      Some(Ok(value)) => Ok(Lookup::Ready(value)),
      Some(Err(err)) if declared.contains(&err.kind()) => Err(err),
      Some(Err(err)) => {
        trace!(key = %key, error = %err, "undeclared dependency failure");
        self.propagated.get_or_insert(err);
        Ok(Lookup::Missing)
      }
    }
  }

  /// Request several keys at once. Every key is recorded even if an earlier one is missing.
  pub fn get_values(&mut self, keys: &[SkyKey]) -> Vec<Lookup<Arc<SkyValue>>> {
    keys.iter().map(|key| self.get_value(key)).collect()
  }

  /// Whether any request in this restart came back missing.
  pub fn values_missing(&self) -> bool {
    !self.missing.is_empty() || self.propagated.is_some()
  }

  /// Dependencies requested so far, in request order.
  pub fn requested(&self) -> &[SkyKey] {
    &self.deps
  }

  fn observe(&mut self, key: &SkyKey) -> Observed {
    if let Some(observed) = self.observed.get(key) {
      return observed.clone();
    }

    let observed = self.graph.current(key, self.version);
    self.deps.push(key.clone());
    if observed.is_none() {
      self.missing.push(key.clone());
    }
    self.observed.insert(key.clone(), observed.clone());
    observed
  }

  pub(crate) fn into_requests(self) -> Requests {
    Requests {
      deps: self.deps,
      missing: self.missing,
      propagated: self.propagated,
    }
  }
}
