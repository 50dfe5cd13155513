//! In-memory node storage for the evaluator.
//!
//! Each key is in one of two states:
//! - `InFlight`: exactly one task is evaluating it; others subscribe to its channel
//! - `Done`: the committed value or failure, with the edges of its last restart
//!
//! A key that was never requested has no entry at all.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use petgraph::algo::astar;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use tokio::sync::watch;

use super::error::{EvalError, SkyError};
use super::types::{SkyKey, SkyValue};

/// Build counter. Every evaluation runs at a fresh version.
pub(crate) type Version = u64;

/// Outcome broadcast to everyone waiting on an in-flight key.
pub(crate) type NodeOutcome = Result<Arc<NodeEntry>, EvalError>;

/// A committed node: its result and the bookkeeping for incremental re-checks.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeEntry {
  outcome: Result<Arc<SkyValue>, SkyError>,
  deps: Vec<SkyKey>,
  changed_at: Version,
  verified_at: Version,
  injected: bool,
}

impl NodeEntry {
  pub(crate) fn computed(
    outcome: Result<Arc<SkyValue>, SkyError>,
    deps: Vec<SkyKey>,
    previous: Option<&NodeEntry>,
    version: Version,
  ) -> Self {
    let changed_at = match previous {
      Some(prev) if prev.outcome == outcome => prev.changed_at,
      _ => version,
    };
    Self {
      outcome,
      deps,
      changed_at,
      verified_at: version,
      injected: false,
    }
  }

  pub(crate) fn injected(value: SkyValue, previous: Option<&NodeEntry>, version: Version) -> Self {
    let mut entry = Self::computed(Ok(Arc::new(value)), Vec::new(), previous, version);
    entry.injected = true;
    entry
  }

  /// The same entry, confirmed up to date at `version`.
  pub(crate) fn reverified(&self, version: Version) -> Self {
    Self {
      verified_at: version,
      ..self.clone()
    }
  }

  pub fn outcome(&self) -> &Result<Arc<SkyValue>, SkyError> {
    &self.outcome
  }

  /// Dependencies requested during the restart that produced this entry, in request order.
  pub fn deps(&self) -> &[SkyKey] {
    &self.deps
  }

  /// Version at which the outcome last changed.
  pub fn changed_at(&self) -> u64 {
    self.changed_at
  }

  /// Version at which the outcome was last confirmed current.
  pub fn verified_at(&self) -> u64 {
    self.verified_at
  }

  pub(crate) fn is_injected(&self) -> bool {
    self.injected
  }

  pub(crate) fn is_transient_failure(&self) -> bool {
    matches!(&self.outcome, Err(err) if err.is_transient())
  }
}

pub(crate) enum NodeState {
  InFlight {
    done: watch::Receiver<Option<NodeOutcome>>,
    previous: Option<Arc<NodeEntry>>,
    dirty: bool,
  },
  Done {
    entry: Arc<NodeEntry>,
    dirty: bool,
  },
}

/// Result of asking the graph for a key at a given version.
pub(crate) enum Claim {
  /// Committed and current.
  Ready(Arc<NodeEntry>),
  /// Another task is evaluating the key.
  Wait(watch::Receiver<Option<NodeOutcome>>),
  /// The caller now owns the evaluation and must report through `done`.
  Evaluate {
    previous: Option<Arc<NodeEntry>>,
    dirty: bool,
    done: watch::Sender<Option<NodeOutcome>>,
  },
}

#[derive(Default)]
pub(crate) struct InMemoryGraph {
  nodes: DashMap<SkyKey, NodeState>,
}

impl InMemoryGraph {
  /// Look up `key` for `version`, claiming it for evaluation if it is not current.
  ///
  /// The entry API holds the shard lock while deciding, so two callers can never
  /// both receive `Claim::Evaluate` for the same key.
  pub(crate) fn claim(&self, key: &SkyKey, version: Version) -> Claim {
    match self.nodes.entry(key.clone()) {
      Entry::Occupied(mut occupied) => {
        let (previous, dirty) = match occupied.get() {
          NodeState::Done { entry, dirty: false } if entry.verified_at >= version => {
            return Claim::Ready(entry.clone());
          }
          NodeState::InFlight { done, .. } => return Claim::Wait(done.clone()),
          NodeState::Done { entry, dirty } => (entry.clone(), *dirty),
        };
        let (tx, rx) = watch::channel(None);
        occupied.insert(NodeState::InFlight {
          done: rx,
          previous: Some(previous.clone()),
          dirty,
        });
        Claim::Evaluate {
          previous: Some(previous),
          dirty,
          done: tx,
        }
      }
      Entry::Vacant(vacant) => {
        let (tx, rx) = watch::channel(None);
        vacant.insert(NodeState::InFlight {
          done: rx,
          previous: None,
          dirty: false,
        });
        Claim::Evaluate {
          previous: None,
          dirty: false,
          done: tx,
        }
      }
    }
  }

  /// The committed outcome of `key`, if it is current at `version`.
  pub(crate) fn current(&self, key: &SkyKey, version: Version) -> Option<Result<Arc<SkyValue>, SkyError>> {
    match self.nodes.get(key).as_deref() {
      Some(NodeState::Done { entry, dirty: false }) if entry.verified_at >= version => Some(entry.outcome.clone()),
      _ => None,
    }
  }

  /// The last committed entry of `key`, current or not.
  pub(crate) fn entry(&self, key: &SkyKey) -> Option<Arc<NodeEntry>> {
    match self.nodes.get(key).as_deref() {
      Some(NodeState::Done { entry, .. }) => Some(entry.clone()),
      Some(NodeState::InFlight { previous, .. }) => previous.clone(),
      None => None,
    }
  }

  pub(crate) fn commit(&self, key: &SkyKey, entry: Arc<NodeEntry>) {
    self.nodes.insert(key.clone(), NodeState::Done { entry, dirty: false });
  }

  /// Put back what was there before an abandoned evaluation.
  pub(crate) fn restore(&self, key: &SkyKey, previous: Option<Arc<NodeEntry>>, dirty: bool) {
    match previous {
      Some(entry) => {
        self.nodes.insert(key.clone(), NodeState::Done { entry, dirty });
      }
      None => {
        self.nodes.remove(key);
      }
    }
  }

  /// Mark `key` so its function runs again on the next request. Returns false for unknown keys.
  pub(crate) fn mark_dirty(&self, key: &SkyKey) -> bool {
    match self.nodes.get_mut(key).as_deref_mut() {
      Some(NodeState::Done { dirty, .. }) | Some(NodeState::InFlight { dirty, .. }) => {
        *dirty = true;
        true
      }
      None => false,
    }
  }

  pub(crate) fn keys(&self) -> Vec<SkyKey> {
    self.nodes.iter().map(|node| node.key().clone()).collect()
  }

  pub(crate) fn len(&self) -> usize {
    self.nodes.len()
  }
}

/// Which in-flight keys are currently waiting on which other keys.
///
/// Used to turn a dependency cycle into a failure instead of a hang: a key that
/// is about to wait on something that already (transitively) waits on it is on a
/// cycle.
#[derive(Default)]
pub(crate) struct WaitGraph {
  graph: StableDiGraph<SkyKey, ()>,
  nodes: HashMap<SkyKey, NodeIndex>,
}

impl WaitGraph {
  fn node(&mut self, key: &SkyKey) -> NodeIndex {
    if let Some(&idx) = self.nodes.get(key) {
      return idx;
    }
    let idx = self.graph.add_node(key.clone());
    self.nodes.insert(key.clone(), idx);
    idx
  }

  /// Record that `waiter` waits on each of `deps`.
  ///
  /// Returns the keys along the cycle, starting and ending with `waiter`, if
  /// waiting would close one. Nothing is recorded in that case.
  pub(crate) fn add_waits(&mut self, waiter: &SkyKey, deps: &[SkyKey]) -> Option<Vec<SkyKey>> {
    let from = self.node(waiter);
    for dep in deps {
      let to = self.node(dep);
      if let Some((_, path)) = astar(&self.graph, to, |idx| idx == from, |_| 1, |_| 0) {
        // read the path before clearing, which may remove its nodes
        let mut cycle = vec![waiter.clone()];
        cycle.extend(path.into_iter().map(|idx| self.graph[idx].clone()));
        self.clear(waiter);
        return Some(cycle);
      }
      self.graph.update_edge(from, to, ());
    }
    None
  }

  /// Forget everything `waiter` was waiting on.
  pub(crate) fn clear(&mut self, waiter: &SkyKey) {
    let Some(&from) = self.nodes.get(waiter) else {
      return;
    };
    let targets: Vec<NodeIndex> = self.graph.neighbors(from).collect();
    for &target in &targets {
      if let Some(edge) = self.graph.find_edge(from, target) {
        self.graph.remove_edge(edge);
      }
    }
    for idx in targets.into_iter().chain(std::iter::once(from)) {
      self.remove_if_isolated(idx);
    }
  }

  fn remove_if_isolated(&mut self, idx: NodeIndex) {
    let isolated = self.graph.neighbors_undirected(idx).next().is_none();
    if isolated && let Some(key) = self.graph.remove_node(idx) {
      self.nodes.remove(&key);
    }
  }

  #[cfg(test)]
  pub(crate) fn is_empty(&self) -> bool {
    self.graph.node_count() == 0
  }
}
