//! Parallel, incremental evaluation of keys.
//!
//! Each requested key is evaluated by exactly one task. A task runs the key's
//! function on a blocking worker, and when the function reports missing
//! dependencies the task requests them, waits for all of them to be committed,
//! and restarts the function. Waiting happens on an async channel, never on a
//! worker thread, so a bounded pool can evaluate an arbitrarily deep graph.
//!
//! # Incremental Builds
//!
//! Every call to [`Evaluator::evaluate`] runs at a new version. A key committed
//! by an earlier build is re-checked rather than recomputed: its recorded
//! dependencies are brought up to date in order, and the function only runs again
//! if one of them changed since the key was last verified, if the key was
//! invalidated, or if its stored failure is transient.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::{Semaphore, watch};
use tracing::{debug, info, trace, warn};

use super::cancel::CancelToken;
use super::environment::Environment;
use super::error::{EvalError, FunctionError, FunctionFailure, SkyError};
use super::graph::{Claim, InMemoryGraph, NodeEntry, NodeOutcome, Version, WaitGraph};
use super::types::{FunctionName, Lookup, SkyKey, SkyValue};

/// A computation registered for a [`FunctionName`].
///
/// `compute` may be called many times for the same key within one build. It must
/// derive everything from the key and from values obtained through `env`, and it
/// should return `Ok(Lookup::Missing)` as soon as any request comes back missing.
pub trait SkyFunction: Send + Sync {
  fn compute(&self, key: &SkyKey, env: &mut Environment) -> Result<Lookup<SkyValue>, FunctionFailure>;
}

impl<F> SkyFunction for F
where
  F: Fn(&SkyKey, &mut Environment) -> Result<Lookup<SkyValue>, FunctionFailure> + Send + Sync,
{
  fn compute(&self, key: &SkyKey, env: &mut Environment) -> Result<Lookup<SkyValue>, FunctionFailure> {
    self(key, env)
  }
}

/// Configuration for the evaluator.
#[derive(Debug, Clone)]
pub struct EvaluatorConfig {
  /// Maximum number of functions running at the same time.
  pub jobs: usize,
}

impl Default for EvaluatorConfig {
  fn default() -> Self {
    Self { jobs: num_cpus() }
  }
}

/// Get the number of CPUs for default parallelism.
fn num_cpus() -> usize {
  std::thread::available_parallelism().map(|p| p.get()).unwrap_or(4)
}

/// Values and failures for the keys passed to [`Evaluator::evaluate`].
#[derive(Debug, Default)]
pub struct EvaluationResult {
  values: HashMap<SkyKey, Arc<SkyValue>>,
  errors: HashMap<SkyKey, SkyError>,
}

impl EvaluationResult {
  pub fn get(&self, key: &SkyKey) -> Option<&Arc<SkyValue>> {
    self.values.get(key)
  }

  pub fn error(&self, key: &SkyKey) -> Option<&SkyError> {
    self.errors.get(key)
  }

  pub fn has_errors(&self) -> bool {
    !self.errors.is_empty()
  }

  pub fn values(&self) -> &HashMap<SkyKey, Arc<SkyValue>> {
    &self.values
  }

  pub fn errors(&self) -> &HashMap<SkyKey, SkyError> {
    &self.errors
  }
}

/// Drives keys to committed values.
///
/// Cheap to clone; clones share the same graph.
#[derive(Clone)]
pub struct Evaluator {
  inner: Arc<Inner>,
}

struct Inner {
  functions: RwLock<HashMap<FunctionName, Arc<dyn SkyFunction>>>,
  graph: Arc<InMemoryGraph>,
  waits: Mutex<WaitGraph>,
  version: AtomicU64,
  permits: Arc<Semaphore>,
  cancel: CancelToken,
  build: tokio::sync::Mutex<()>,
}

/// A key's result, either already at hand or still being computed elsewhere.
enum Pending {
  Ready(Arc<NodeEntry>),
  Wait(watch::Receiver<Option<NodeOutcome>>),
}

impl Pending {
  fn is_waiting(&self) -> bool {
    matches!(self, Pending::Wait(_))
  }

  async fn wait(self, key: &SkyKey) -> NodeOutcome {
    match self {
      Pending::Ready(entry) => Ok(entry),
      Pending::Wait(mut rx) => {
        let outcome = rx
          .wait_for(Option::is_some)
          .await
          .map_err(|_| EvalError::Abandoned { key: key.clone() })?
          .clone();
        outcome.unwrap_or_else(|| Err(EvalError::Abandoned { key: key.clone() }))
      }
    }
  }
}

/// How waiting on a set of dependencies ended.
enum DepWait {
  Done(Vec<Arc<NodeEntry>>),
  Cycle(Vec<SkyKey>),
}

impl Evaluator {
  pub fn new(config: EvaluatorConfig) -> Self {
    let jobs = config.jobs.max(1);
    Self {
      inner: Arc::new(Inner {
        functions: RwLock::new(HashMap::new()),
        graph: Arc::new(InMemoryGraph::default()),
        waits: Mutex::new(WaitGraph::default()),
        version: AtomicU64::new(0),
        permits: Arc::new(Semaphore::new(jobs)),
        cancel: CancelToken::new(),
        build: tokio::sync::Mutex::new(()),
      }),
    }
  }

  /// Register the function that computes keys named `function`.
  ///
  /// Registering a name twice replaces the earlier function.
  pub fn register(&self, function: FunctionName, implementation: Arc<dyn SkyFunction>) {
    debug!(function = %function, "registering function");
    self.inner.functions.write().insert(function, implementation);
  }

  /// Set the value of a key that has no function, such as a precomputed setting.
  ///
  /// Takes effect for the next evaluation. Injecting a value equal to the current
  /// one does not invalidate anything that depends on it.
  pub fn inject(&self, key: SkyKey, value: SkyValue) {
    let version = self.next_version();
    let previous = self.inner.graph.entry(&key);
    let entry = NodeEntry::injected(value, previous.as_deref(), version);
    if previous.as_deref().is_some_and(|prev| prev.changed_at() == entry.changed_at()) {
      trace!(key = %key, "injected value unchanged");
    } else {
      debug!(key = %key, version, "injected new value");
    }
    self.inner.graph.commit(&key, Arc::new(entry));
  }

  /// Mark keys as changed so their functions run again on the next request.
  ///
  /// Intended for inputs whose underlying state changed between builds, such as
  /// file keys. Returns how many of the keys were known to the graph.
  pub fn invalidate<'a>(&self, keys: impl IntoIterator<Item = &'a SkyKey>) -> usize {
    let mut marked = 0;
    for key in keys {
      if self.inner.graph.mark_dirty(key) {
        trace!(key = %key, "invalidated");
        marked += 1;
      }
    }
    debug!(marked, "invalidated keys");
    marked
  }

  /// Evaluate `roots`, computing whatever is missing or out of date.
  ///
  /// Failures of individual keys are reported in the result. `Err` is returned only
  /// when the evaluation as a whole could not finish, e.g. on cancellation.
  /// Evaluations on the same evaluator run one after another.
  pub async fn evaluate(&self, roots: &[SkyKey]) -> Result<EvaluationResult, EvalError> {
    let _build = self.inner.build.lock().await;
    self.inner.cancel.reset();

    let version = self.inner.version.fetch_add(1, Ordering::SeqCst) + 1;
    info!(version, roots = roots.len(), "starting evaluation");

    let pending: Vec<Pending> = roots.iter().map(|key| self.inner.request(key, version)).collect();

    let mut result = EvaluationResult::default();
    for (key, pending) in roots.iter().zip(pending) {
      let entry = pending.wait(key).await?;
      match entry.outcome() {
        Ok(value) => {
          result.values.insert(key.clone(), value.clone());
        }
        Err(err) => {
          result.errors.insert(key.clone(), err.clone());
        }
      }
    }

    info!(
      version,
      values = result.values.len(),
      errors = result.errors.len(),
      nodes = self.inner.graph.len(),
      "evaluation complete"
    );
    Ok(result)
  }

  /// Token that cancels the evaluation currently in progress.
  pub fn cancel_token(&self) -> CancelToken {
    self.inner.cancel.clone()
  }

  /// Abandon the evaluation currently in progress.
  pub fn cancel(&self) {
    info!("cancelling evaluation");
    self.inner.cancel.cancel();
  }

  /// The last committed outcome for `key`, whether or not it is current.
  pub fn done_value(&self, key: &SkyKey) -> Option<Result<Arc<SkyValue>, SkyError>> {
    self.inner.graph.entry(key).map(|entry| entry.outcome().clone())
  }

  /// The dependencies recorded for `key` by its last committed evaluation.
  pub fn dependencies(&self, key: &SkyKey) -> Option<Vec<SkyKey>> {
    self.inner.graph.entry(key).map(|entry| entry.deps().to_vec())
  }

  /// The last committed entry for `key`.
  pub fn entry(&self, key: &SkyKey) -> Option<Arc<NodeEntry>> {
    self.inner.graph.entry(key)
  }

  /// Every key the graph knows about.
  pub fn keys(&self) -> Vec<SkyKey> {
    self.inner.graph.keys()
  }

  /// Version of the most recent evaluation.
  pub fn graph_version(&self) -> u64 {
    self.inner.version.load(Ordering::SeqCst)
  }

  fn next_version(&self) -> Version {
    self.inner.version.load(Ordering::SeqCst) + 1
  }
}

impl Inner {
  /// Get `key` at `version`, starting its evaluation if nobody else has.
  fn request(self: &Arc<Self>, key: &SkyKey, version: Version) -> Pending {
    match self.graph.claim(key, version) {
      Claim::Ready(entry) => Pending::Ready(entry),
      Claim::Wait(rx) => Pending::Wait(rx),
      Claim::Evaluate { previous, dirty, done } => {
        let rx = done.subscribe();
        tokio::spawn(drive(self.clone(), key.clone(), version, previous, dirty, done));
        Pending::Wait(rx)
      }
    }
  }

  fn function(&self, key: &SkyKey) -> Result<Arc<dyn SkyFunction>, EvalError> {
    self
      .functions
      .read()
      .get(&key.function())
      .cloned()
      .ok_or_else(|| EvalError::MissingFunction {
        function: key.function(),
        key: key.clone(),
      })
  }

  async fn evaluate_node(
    self: &Arc<Self>,
    key: &SkyKey,
    version: Version,
    previous: Option<&Arc<NodeEntry>>,
    dirty: bool,
  ) -> Result<NodeEntry, EvalError> {
    if let Some(prev) = previous {
      if prev.is_injected() {
        return Ok(prev.reverified(version));
      }
      if !dirty && !prev.is_transient_failure() && self.deps_unchanged(key, prev, version).await? {
        trace!(key = %key, "dependencies unchanged, reusing entry");
        return Ok(prev.reverified(version));
      }
    }

    let function = self.function(key)?;
    let mut restarts = 0usize;
    loop {
      if self.cancel.is_cancelled() {
        return Err(EvalError::Cancelled);
      }

      let permit = self
        .permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|_| EvalError::Cancelled)?;
      let graph = self.graph.clone();
      let function = function.clone();
      let task_key = key.clone();
      let (result, env) = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let mut env = Environment::new(graph, version);
        let result = function.compute(&task_key, &mut env);
        (result, env)
      })
      .await
      .map_err(|e| EvalError::Panicked {
        key: key.clone(),
        message: e.to_string(),
      })?;

      if self.cancel.is_cancelled() {
        return Err(EvalError::Cancelled);
      }

      let requests = env.into_requests();
      let outcome = match result {
        Err(failure) => Some(Err(SkyError::new(key.clone(), failure))),
        Ok(_) if requests.propagated.is_some() => requests.propagated.map(Err),
        Ok(Lookup::Ready(value)) if requests.missing.is_empty() => Some(Ok(Arc::new(value))),
        Ok(Lookup::Ready(_)) => {
          warn!(key = %key, "function returned a value while dependencies were missing");
          None
        }
        Ok(Lookup::Missing) if requests.missing.is_empty() => {
          return Err(EvalError::Stalled { key: key.clone() });
        }
        Ok(Lookup::Missing) => None,
      };

      if let Some(outcome) = outcome {
        if let Err(err) = &outcome {
          debug!(key = %key, error = %err, transience = ?err.transience, "key failed");
        } else {
          trace!(key = %key, restarts, deps = requests.deps.len(), "key computed");
        }
        return Ok(NodeEntry::computed(outcome, requests.deps, previous.map(Arc::as_ref), version));
      }

      restarts += 1;
      debug!(key = %key, restarts, missing = requests.missing.len(), "restarting after missing dependencies");
      if let DepWait::Cycle(cycle) = self.await_dependencies(key, &requests.missing, version).await? {
        return Ok(self.cycle_entry(key, cycle, requests.deps, previous, version));
      }
    }
  }

  /// Bring each recorded dependency of `prev` up to date, in order, and report
  /// whether none of them changed since `prev` was last verified.
  async fn deps_unchanged(self: &Arc<Self>, key: &SkyKey, prev: &NodeEntry, version: Version) -> Result<bool, EvalError> {
    for dep in prev.deps() {
      match self.await_dependencies(key, std::slice::from_ref(dep), version).await? {
        DepWait::Done(entries) => {
          if entries.iter().any(|entry| entry.changed_at() > prev.verified_at()) {
            trace!(key = %key, dep = %dep, "dependency changed");
            return Ok(false);
          }
        }
        DepWait::Cycle(_) => return Ok(false),
      }
    }
    Ok(true)
  }

  /// Request every key in `deps` and wait until all of them are committed.
  async fn await_dependencies(self: &Arc<Self>, key: &SkyKey, deps: &[SkyKey], version: Version) -> Result<DepWait, EvalError> {
    let pending: Vec<Pending> = deps.iter().map(|dep| self.request(dep, version)).collect();

    let waiting: Vec<SkyKey> = deps
      .iter()
      .zip(&pending)
      .filter(|(_, p)| p.is_waiting())
      .map(|(dep, _)| dep.clone())
      .collect();
    if let Some(cycle) = self.waits.lock().add_waits(key, &waiting) {
      warn!(key = %key, length = cycle.len(), "dependency cycle detected");
      return Ok(DepWait::Cycle(cycle));
    }

    let mut entries = Vec::with_capacity(pending.len());
    let mut result = Ok(());
    for (dep, pending) in deps.iter().zip(pending) {
      match pending.wait(dep).await {
        Ok(entry) => entries.push(entry),
        Err(e) => {
          result = Err(e);
          break;
        }
      }
    }
    self.waits.lock().clear(key);
    result.map(|_| DepWait::Done(entries))
  }

  /// A persistent `Cycle` failure for `key`, keeping the edges of the restart that
  /// closed the cycle so a later change to any of them re-runs the function.
  fn cycle_entry(
    &self,
    key: &SkyKey,
    cycle: Vec<SkyKey>,
    deps: Vec<SkyKey>,
    previous: Option<&Arc<NodeEntry>>,
    version: Version,
  ) -> NodeEntry {
    let error = FunctionError::Cycle {
      keys: cycle.iter().map(ToString::to_string).collect(),
    };
    let outcome = Err(SkyError::new(key.clone(), FunctionFailure::persistent(error)));
    NodeEntry::computed(outcome, deps, previous.map(Arc::as_ref), version)
  }
}

/// Evaluate one claimed key and publish the outcome to everyone waiting on it.
///
/// Returns a boxed future so tasks can spawn tasks for their dependencies.
fn drive(
  inner: Arc<Inner>,
  key: SkyKey,
  version: Version,
  previous: Option<Arc<NodeEntry>>,
  dirty: bool,
  done: watch::Sender<Option<NodeOutcome>>,
) -> Pin<Box<dyn Future<Output = ()> + Send>> {
  Box::pin(async move {
    let mut claim = ClaimGuard {
      inner: inner.clone(),
      key: key.clone(),
      previous: previous.clone(),
      dirty,
      done: Some(done),
    };
    let outcome = inner
      .evaluate_node(&key, version, previous.as_ref(), dirty)
      .await
      .map(Arc::new);
    claim.finish(outcome);
  })
}

/// Owns a claimed key until its outcome is published.
///
/// If the task is dropped first, for instance because it panicked or the runtime
/// shut down, the key is put back as it was and waiters see `Abandoned`, so the next
/// request evaluates it again.
struct ClaimGuard {
  inner: Arc<Inner>,
  key: SkyKey,
  previous: Option<Arc<NodeEntry>>,
  dirty: bool,
  done: Option<watch::Sender<Option<NodeOutcome>>>,
}

impl ClaimGuard {
  fn finish(&mut self, outcome: NodeOutcome) {
    match &outcome {
      Ok(entry) => self.inner.graph.commit(&self.key, entry.clone()),
      Err(e) => {
        debug!(key = %self.key, error = %e, "evaluation abandoned");
        self.inner.graph.restore(&self.key, self.previous.take(), self.dirty);
      }
    }
    self.inner.waits.lock().clear(&self.key);
    if let Some(done) = self.done.take() {
      done.send_replace(Some(outcome));
    }
  }
}

impl Drop for ClaimGuard {
  fn drop(&mut self) {
    if self.done.is_some() {
      warn!(key = %self.key, "evaluation task ended without a result");
      let outcome = Err(EvalError::Abandoned { key: self.key.clone() });
      self.finish(outcome);
    }
  }
}
