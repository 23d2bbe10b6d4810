use serde::de::DeserializeOwned;
use std::task::Waker;
use triomphe::Arc;

use crate::core::WorkerId;
use crate::core::fatal;
use crate::error::TaskError;
use crate::ipc::CodecError;
use crate::ipc::codec;
use crate::task::Shared;
use crate::task::State;
use crate::task::Task;

/// Creates a running task handle and the resolver owning its write side.
pub(crate) fn pair<T>(worker: WorkerId) -> (Task<T>, Resolver<T>) {
  let shared: Arc<Shared<T>> = Arc::new(Shared::new());

  (
    Task::new(worker, Arc::clone(&shared)),
    Resolver {
      worker,
      shared,
      staged: None,
    },
  )
}

// -----------------------------------------------------------------------------
// Resolve
// -----------------------------------------------------------------------------

/// Type-erased write side of a task handle, as stored in the registry.
pub(crate) trait Resolve: Send {
  /// Decodes a success payload and stages it for [`fulfill`].
  ///
  /// [`fulfill`]: Resolve::fulfill
  fn accept(&mut self, payload: &[u8]) -> Result<(), CodecError>;

  /// Resolves the handle with the staged value.
  fn fulfill(self: Box<Self>);

  /// Resolves the handle with an error.
  fn fail(self: Box<Self>, error: TaskError);
}

// -----------------------------------------------------------------------------
// Resolver
// -----------------------------------------------------------------------------

/// Write side of a single [`Task`].
pub(crate) struct Resolver<T> {
  worker: WorkerId,
  shared: Arc<Shared<T>>,
  staged: Option<T>,
}

impl<T> Resolver<T> {
  /// Moves the handle into its final state and wakes every reader.
  ///
  /// Aborts the process if the handle was already resolved.
  pub(crate) fn complete(self, outcome: Result<T, TaskError>) {
    let waker: Option<Waker> = {
      let mut state = self.shared.state.lock();

      let State::Running(waker) = &mut *state else {
        fatal!("{} resolved twice", self.worker);
      };

      let waker: Option<Waker> = waker.take();

      *state = match outcome {
        Ok(value) => State::Fulfilled(value),
        Err(error) => State::Failed(error),
      };

      waker
    };

    self.shared.ready.notify_all();

    if let Some(waker) = waker {
      waker.wake();
    }
  }
}

impl<T> Resolve for Resolver<T>
where
  T: DeserializeOwned + Send + 'static,
{
  fn accept(&mut self, payload: &[u8]) -> Result<(), CodecError> {
    self.staged = Some(codec::decode(payload)?);
    Ok(())
  }

  fn fulfill(mut self: Box<Self>) {
    let Some(value) = self.staged.take() else {
      fatal!("{} fulfilled without a value", self.worker);
    };

    self.complete(Ok(value));
  }

  fn fail(self: Box<Self>, error: TaskError) {
    self.complete(Err(error));
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
