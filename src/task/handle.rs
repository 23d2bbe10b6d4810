use parking_lot::Condvar;
use parking_lot::Mutex;
use parking_lot::MutexGuard;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::mem;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::task::Waker;
use std::time::Duration;
use std::time::Instant;
use triomphe::Arc;

use crate::core::WorkerId;
use crate::error::TaskError;

// -----------------------------------------------------------------------------
// Task Status
// -----------------------------------------------------------------------------

/// Observable state of a [`Task`].
///
/// A task is created [`Running`] and moves to exactly one of the final
/// states. It never moves back.
///
/// [`Running`]: TaskStatus::Running
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum TaskStatus {
  /// The worker has not delivered an outcome yet.
  Running,
  /// The computation returned a value.
  Fulfilled,
  /// The computation panicked, or the worker was lost.
  Failed,
}

// -----------------------------------------------------------------------------
// Shared State
// -----------------------------------------------------------------------------

pub(crate) enum State<T> {
  Running(Option<Waker>),
  Fulfilled(T),
  Failed(TaskError),
  Taken(TaskStatus),
}

impl<T> State<T> {
  #[inline]
  const fn status(&self) -> TaskStatus {
    match self {
      Self::Running(_) => TaskStatus::Running,
      Self::Fulfilled(_) => TaskStatus::Fulfilled,
      Self::Failed(_) => TaskStatus::Failed,
      Self::Taken(status) => *status,
    }
  }
}

pub(crate) struct Shared<T> {
  pub(crate) state: Mutex<State<T>>,
  pub(crate) ready: Condvar,
}

impl<T> Shared<T> {
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      state: Mutex::new(State::Running(None)),
      ready: Condvar::new(),
    }
  }
}

// -----------------------------------------------------------------------------
// Task
// -----------------------------------------------------------------------------

/// Handle to a computation running in a worker process.
///
/// The handle resolves exactly once, when the completion poller observes the
/// worker's outcome. Reading it yields the returned value, or the
/// reconstructed panic as [`TaskError::Raised`].
///
/// `Task` can be read synchronously with [`get`] or awaited as a
/// [`Future`]; awaiting does not require any particular async runtime.
///
/// [`get`]: Task::get
pub struct Task<T> {
  worker: WorkerId,
  shared: Arc<Shared<T>>,
}

impl<T> Task<T> {
  #[inline]
  pub(crate) fn new(worker: WorkerId, shared: Arc<Shared<T>>) -> Self {
    Self { worker, shared }
  }

  /// Returns the worker process running this task.
  #[inline]
  pub const fn worker(&self) -> WorkerId {
    self.worker
  }

  /// Returns the current status of the task.
  #[inline]
  pub fn status(&self) -> TaskStatus {
    self.shared.state.lock().status()
  }

  /// Returns `true` if the task has been resolved.
  #[inline]
  pub fn is_done(&self) -> bool {
    self.status() != TaskStatus::Running
  }

  /// Blocks the current thread until the task is resolved.
  pub fn wait(&self) {
    let mut state: MutexGuard<'_, State<T>> = self.shared.state.lock();

    while let State::Running(_) = *state {
      self.shared.ready.wait(&mut state);
    }
  }

  /// Blocks the current thread until the task is resolved or `timeout`
  /// elapses.
  ///
  /// Returns `true` if the task is resolved.
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    // A deadline past the clock's range is no deadline at all.
    let Some(deadline) = Instant::now().checked_add(timeout) else {
      self.wait();
      return true;
    };

    let mut state: MutexGuard<'_, State<T>> = self.shared.state.lock();

    while let State::Running(_) = *state {
      if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
        return !matches!(*state, State::Running(_));
      }
    }

    true
  }

  /// Blocks until the task is resolved, then returns its outcome.
  ///
  /// # Panics
  ///
  /// Panics if the outcome was already taken by awaiting the task.
  pub fn get(self) -> Result<T, TaskError> {
    self.wait();
    take(&mut self.shared.state.lock())
  }
}

impl<T> Future for Task<T> {
  type Output = Result<T, TaskError>;

  fn poll(self: Pin<&mut Self>, context: &mut Context<'_>) -> Poll<Self::Output> {
    let mut state: MutexGuard<'_, State<T>> = self.shared.state.lock();

    if let State::Running(waker) = &mut *state {
      match waker {
        Some(waker) if waker.will_wake(context.waker()) => {}
        _ => *waker = Some(context.waker().clone()),
      }

      return Poll::Pending;
    }

    Poll::Ready(take(&mut state))
  }
}

impl<T> Debug for Task<T> {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Task")
      .field("worker", &self.worker)
      .field("status", &self.status())
      .finish()
  }
}

fn take<T>(state: &mut State<T>) -> Result<T, TaskError> {
  let status: TaskStatus = state.status();

  match mem::replace(state, State::Taken(status)) {
    State::Fulfilled(value) => Ok(value),
    State::Failed(error) => Err(error),
    State::Taken(_) => panic!("task outcome already taken"),
    State::Running(_) => unreachable!("task read before resolution"),
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::thread;
  use std::time::Duration;

  use crate::core::WorkerId;
  use crate::error::Exception;
  use crate::error::ExceptionClass;
  use crate::error::ExceptionGroup;
  use crate::error::TaskError;
  use crate::task::Resolver;
  use crate::task::Task;
  use crate::task::TaskStatus;
  use crate::task::pair;

  fn raised(message: &str) -> TaskError {
    TaskError::Raised(Exception::new(ExceptionClass::Error, ExceptionGroup::BadArg, message))
  }

  #[test]
  fn test_created_running() {
    let (task, _resolver): (Task<u32>, Resolver<u32>) = pair(WorkerId::from_raw(1));

    assert_eq!(task.status(), TaskStatus::Running);
    assert!(!task.is_done());
    assert!(!task.wait_timeout(Duration::from_millis(5)));
  }

  #[test]
  fn test_fulfilled() {
    let (task, resolver): (Task<u32>, Resolver<u32>) = pair(WorkerId::from_raw(1));

    resolver.complete(Ok(49));

    assert_eq!(task.status(), TaskStatus::Fulfilled);
    assert!(task.wait_timeout(Duration::ZERO));
    assert_eq!(task.get().unwrap(), 49);
  }

  #[test]
  fn test_wait_timeout_unbounded() {
    let (task, resolver): (Task<u32>, Resolver<u32>) = pair(WorkerId::from_raw(1));

    let thread = thread::spawn(move || {
      thread::sleep(Duration::from_millis(10));
      resolver.complete(Ok(7));
    });

    assert!(task.wait_timeout(Duration::MAX));
    assert!(task.wait_timeout(Duration::MAX));
    assert_eq!(task.get().unwrap(), 7);

    thread.join().unwrap();
  }

  #[test]
  fn test_failed() {
    let (task, resolver): (Task<u32>, Resolver<u32>) = pair(WorkerId::from_raw(1));

    resolver.complete(Err(raised("bad")));

    assert_eq!(task.status(), TaskStatus::Failed);

    let error: TaskError = task.get().unwrap_err();
    assert_eq!(error.exception().map(Exception::error), Some("bad"));
  }

  #[test]
  fn test_get_blocks_until_resolved() {
    let (task, resolver): (Task<String>, Resolver<String>) = pair(WorkerId::from_raw(1));

    let handle: thread::JoinHandle<()> = thread::spawn(move || {
      thread::sleep(Duration::from_millis(20));
      resolver.complete(Ok("done".to_owned()));
    });

    assert_eq!(task.get().unwrap(), "done");
    handle.join().unwrap();
  }

  #[tokio::test]
  async fn test_await() {
    let (task, resolver): (Task<u64>, Resolver<u64>) = pair(WorkerId::from_raw(1));

    let handle: thread::JoinHandle<()> = thread::spawn(move || {
      thread::sleep(Duration::from_millis(20));
      resolver.complete(Ok(7));
    });

    assert_eq!(task.await.unwrap(), 7);
    handle.join().unwrap();
  }

  #[tokio::test]
  async fn test_status_kept_after_await() {
    let (mut task, resolver): (Task<u64>, Resolver<u64>) = pair(WorkerId::from_raw(1));

    resolver.complete(Err(raised("gone")));

    assert!((&mut task).await.is_err());
    assert_eq!(task.status(), TaskStatus::Failed);
  }

  #[tokio::test]
  #[should_panic(expected = "task outcome already taken")]
  async fn test_get_after_await() {
    let (mut task, resolver): (Task<u64>, Resolver<u64>) = pair(WorkerId::from_raw(1));

    resolver.complete(Ok(1));

    let _ignore: u64 = (&mut task).await.unwrap();
    let _ignore: Result<u64, TaskError> = task.get();
  }
}
