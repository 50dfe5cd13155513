use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared flag used to abandon an evaluation from outside, e.g. on interrupt.
///
/// The evaluator checks the token before every restart and before committing a
/// result, so a cancelled key is never stored.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn cancel(&self) {
    self.0.store(true, Ordering::SeqCst);
  }

  pub fn is_cancelled(&self) -> bool {
    self.0.load(Ordering::SeqCst)
  }

  pub(crate) fn reset(&self) {
    self.0.store(false, Ordering::SeqCst);
  }
}
