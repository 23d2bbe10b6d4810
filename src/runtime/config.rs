use std::time::Duration;

use crate::consts;

// -----------------------------------------------------------------------------
// Orphan Policy
// -----------------------------------------------------------------------------

/// What the completion poller does with a worker that terminates without
/// delivering an outcome.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum OrphanPolicy {
  /// Reap the worker and fail its task with [`TaskError::Lost`].
  ///
  /// [`TaskError::Lost`]: crate::error::TaskError::Lost
  Fail,
  /// Leave the task pending forever and the worker unreaped until an
  /// outcome arrives.
  Ignore,
}

// -----------------------------------------------------------------------------
// Runtime Config
// -----------------------------------------------------------------------------

/// Options used to configure a [`Runtime`].
///
/// [`Runtime`]: crate::Runtime
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
  /// How long the completion poller sleeps between iterations.
  pub poll_interval: Duration,
  /// Handling of workers that exit without an outcome.
  pub orphans: OrphanPolicy,
  /// Name prefix of the completion poller thread.
  pub thread_name: String,
}

impl RuntimeConfig {
  #[inline]
  pub fn new() -> Self {
    Self {
      poll_interval: consts::POLL_INTERVAL,
      orphans: OrphanPolicy::Fail,
      thread_name: consts::POLLER_THREAD_NAME.to_owned(),
    }
  }
}

impl Default for RuntimeConfig {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}
