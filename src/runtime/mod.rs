//! Task runtime and spawning.
//!
//! # Process Images
//!
//! A [`Runtime`] keeps one registry and at most one completion poller per
//! process image. When a worker is forked, the inherited registry and
//! poller belong to the parent; the worker discards them without touching
//! their locks and starts afresh if its computation spawns nested tasks.
//!
//! # Forking
//!
//! Spawning holds a process-wide fork lock from channel creation until the
//! parent has closed its copies of the write-ends. Spawns on all runtimes
//! are therefore serialized, and a worker never inherits a sibling task's
//! write-end.
//!
//! Every image lock is taken under the fork lock as well. At the moment of
//! a fork the forking thread is the only one holding an image lock, so a
//! worker can spawn nested tasks on any runtime, the global one included.

mod config;
mod poller;

pub(crate) mod registry;

pub use self::config::OrphanPolicy;
pub use self::config::RuntimeConfig;

use nix::unistd;
use nix::unistd::ForkResult;
use nix::unistd::Pid;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::fmt::Formatter;
use std::fmt::Result as FmtResult;
use std::mem;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::OnceLock;
use std::sync::PoisonError;
use std::sync::TryLockError;
use std::thread;
use std::thread::JoinHandle;
use tracing::debug;
use triomphe::Arc;

use crate::core::WorkerId;
use crate::error::SpawnError;
use crate::error::SpawnOp;
use crate::ipc;
use crate::ipc::ReadEnd;
use crate::ipc::WriteEnd;
use crate::runtime::poller::Mode;
use crate::runtime::poller::PollerShared;
use crate::runtime::registry::Registration;
use crate::task;
use crate::task::Resolver;
use crate::task::Task;
use crate::worker;

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

/// Serializes forks with every image lock acquisition.
static FORK_LOCK: Mutex<()> = Mutex::new(());

#[inline]
fn fork_lock() -> MutexGuard<'static, ()> {
  FORK_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

// -----------------------------------------------------------------------------
// Runtime
// -----------------------------------------------------------------------------

/// Spawns computations in forked worker processes and tracks their
/// completion.
///
/// Cloning a runtime is cheap; clones share the registry and poller.
#[derive(Clone)]
pub struct Runtime {
  inner: Arc<Inner>,
}

impl Runtime {
  /// Creates a runtime with the default configuration.
  #[inline]
  pub fn new() -> Self {
    Self::with_config(RuntimeConfig::new())
  }

  /// Creates a runtime with the given configuration.
  ///
  /// No thread is started until the first task is spawned.
  pub fn with_config(config: RuntimeConfig) -> Self {
    let image: Image = Image::new(&config);

    Self {
      inner: Arc::new(Inner {
        config,
        image: Mutex::new(image),
      }),
    }
  }

  /// Returns the process-wide runtime used by [`spawn`] and [`task`].
  ///
  /// [`spawn`]: crate::spawn
  /// [`task`]: crate::task
  #[inline]
  pub fn global() -> &'static Self {
    GLOBAL.get_or_init(Self::new)
  }

  /// Returns the configuration of this runtime.
  #[inline]
  pub fn config(&self) -> &RuntimeConfig {
    &self.inner.config
  }

  /// Returns the number of tasks spawned in this process image that have
  /// not settled yet.
  pub fn pending(&self) -> usize {
    let fork: MutexGuard<'_, ()> = fork_lock();
    let shared: Arc<PollerShared> = Arc::clone(&self.image().shared);

    drop(fork);

    shared.registry.lock().len()
  }

  /// Returns the number of settled workers the poller has not reaped yet.
  pub fn unreaped(&self) -> usize {
    let _fork: MutexGuard<'_, ()> = fork_lock();

    self.image().shared.unreaped()
  }

  /// Runs `compute` in a new worker process and returns a handle to its
  /// outcome.
  ///
  /// The worker is a copy of the calling process taken at the moment of the
  /// spawn; anything `compute` captures is visible to it by value. The
  /// return value crosses back to the caller serialized, so side effects on
  /// captured state are never observed by the caller.
  ///
  /// A panic inside `compute` resolves the task with
  /// [`TaskError::Raised`].
  ///
  /// # Errors
  ///
  /// Returns [`SpawnError`] if channels, the poller thread or the worker
  /// process cannot be created. Nothing is registered in that case.
  ///
  /// [`TaskError::Raised`]: crate::error::TaskError::Raised
  pub fn spawn<F, T>(&self, compute: F) -> Result<Task<T>, SpawnError>
  where
    F: FnOnce() -> T,
    T: Serialize + DeserializeOwned + Send + 'static,
  {
    // A worker must not find the global runtime half-initialized.
    let _: &Self = Self::global();

    let fork: MutexGuard<'_, ()> = fork_lock();

    worker::prepare();

    let mut image: MutexGuard<'_, Image> = self.image();

    image.ensure_poller(&self.inner.config)?;

    let (value_rx, value_tx): (ReadEnd, WriteEnd) = ipc::channel()?;
    let (error_rx, error_tx): (ReadEnd, WriteEnd) = ipc::channel()?;

    // SAFETY: The child runs only `worker::run`, which regains control of
    //         the inherited image without taking any lock held elsewhere
    //         and terminates with `_exit`, never returning here. It
    //         releases the fork and image guards first; no other image
    //         lock can be held at this point.
    match unsafe { unistd::fork() } {
      Err(errno) => Err(SpawnError::errno(SpawnOp::Fork, errno)),
      Ok(ForkResult::Child) => {
        image.reset(&self.inner.config);

        drop(image);
        drop(fork);
        drop(value_rx);
        drop(error_rx);

        worker::run(self, compute, value_tx, error_tx)
      }
      Ok(ForkResult::Parent { child }) => {
        drop(value_tx);
        drop(error_tx);

        let worker: WorkerId = WorkerId::new(child);
        let (task, resolver): (Task<T>, Resolver<T>) = task::pair(worker);
        let registration: Registration = Registration::new(Box::new(resolver), value_rx, error_rx);

        image.shared.registry.lock().insert(worker, registration);

        drop(image);
        drop(fork);

        debug!(target: "forktask", %worker, "task spawned");

        Ok(task)
      }
    }
  }

  /// Wraps `compute` so that every call spawns it as a task.
  ///
  /// The wrapper takes the computation's argument and returns the handle
  /// [`spawn`] would return.
  ///
  /// [`spawn`]: Self::spawn
  pub fn task<F, A, T>(&self, compute: F) -> impl Fn(A) -> Result<Task<T>, SpawnError>
  where
    F: Fn(A) -> T,
    T: Serialize + DeserializeOwned + Send + 'static,
  {
    move |argument: A| self.spawn(|| compute(argument))
  }

  /// Stops the poller started by this runtime in the current process
  /// image, if any, and waits for it to exit.
  ///
  /// Pending registrations are abandoned.
  pub(crate) fn halt(&self) {
    let mut image: MutexGuard<'_, Image> = match self.inner.image.try_lock() {
      Ok(guard) => guard,
      Err(TryLockError::Poisoned(error)) => error.into_inner(),
      // Held by a thread that did not survive the fork.
      Err(TryLockError::WouldBlock) => return,
    };

    if image.owner != unistd::getpid() {
      return;
    }

    let Some(thread) = image.thread.take() else {
      return;
    };

    image.shared.set_mode(Mode::Halt);

    drop(image);

    let _ = thread.join();
  }

  /// Halts the pollers of both this runtime and the global one.
  pub(crate) fn halt_all(&self) {
    self.halt();

    if let Some(global) = GLOBAL.get() {
      if !Arc::ptr_eq(&global.inner, &self.inner) {
        global.halt();
      }
    }
  }

  fn image(&self) -> MutexGuard<'_, Image> {
    let mut image: MutexGuard<'_, Image> = self.inner.image.lock().unwrap_or_else(PoisonError::into_inner);

    if image.owner != unistd::getpid() {
      image.reset(&self.inner.config);
    }

    image
  }
}

impl Default for Runtime {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl Debug for Runtime {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("Runtime")
      .field("config", &self.inner.config)
      .finish_non_exhaustive()
  }
}

// -----------------------------------------------------------------------------
// Inner
// -----------------------------------------------------------------------------

struct Inner {
  config: RuntimeConfig,
  image: Mutex<Image>,
}

impl Drop for Inner {
  fn drop(&mut self) {
    let image: &mut Image = self.image.get_mut().unwrap_or_else(PoisonError::into_inner);

    if image.owner == unistd::getpid() {
      // Detach; the poller exits once everything is settled and reaped.
      image.shared.set_mode(Mode::Drain);
      image.thread = None;
    } else if let Some(thread) = image.thread.take() {
      mem::forget(thread);
    }
  }
}

// -----------------------------------------------------------------------------
// Process Image
// -----------------------------------------------------------------------------

/// Registry and poller owned by one process image.
struct Image {
  owner: Pid,
  shared: Arc<PollerShared>,
  thread: Option<JoinHandle<()>>,
}

impl Image {
  fn new(config: &RuntimeConfig) -> Self {
    Self {
      owner: unistd::getpid(),
      shared: Arc::new(PollerShared::new(config)),
      thread: None,
    }
  }

  /// Takes ownership of an image inherited from another process.
  ///
  /// The inherited registry and poller handle are leaked: their locks may
  /// be held by threads that do not exist here, and the poller thread
  /// itself was not duplicated.
  fn reset(&mut self, config: &RuntimeConfig) {
    let stale: Self = mem::replace(self, Self::new(config));

    mem::forget(stale);
  }

  /// Starts the poller thread for this image if it is not running.
  fn ensure_poller(&mut self, config: &RuntimeConfig) -> Result<(), SpawnError> {
    if self.thread.is_some() {
      return Ok(());
    }

    let shared: Arc<PollerShared> = Arc::clone(&self.shared);

    let thread: JoinHandle<()> = thread::Builder::new()
      .name(format!("{}-{}", config.thread_name, self.owner))
      .spawn(move || poller::run(shared))
      .map_err(|error| SpawnError::new(SpawnOp::Thread, error))?;

    self.thread = Some(thread);

    Ok(())
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use crate::runtime::OrphanPolicy;
  use crate::runtime::Runtime;
  use crate::runtime::RuntimeConfig;

  #[test]
  fn test_with_config() {
    let mut config: RuntimeConfig = RuntimeConfig::new();
    config.poll_interval = Duration::from_millis(5);
    config.orphans = OrphanPolicy::Ignore;

    let runtime: Runtime = Runtime::with_config(config);

    assert_eq!(runtime.config().poll_interval, Duration::from_millis(5));
    assert_eq!(runtime.config().orphans, OrphanPolicy::Ignore);
    assert_eq!(runtime.pending(), 0);
    assert_eq!(runtime.unreaped(), 0);
  }

  #[test]
  fn test_global_is_shared() {
    assert!(std::ptr::eq(Runtime::global(), Runtime::global()));
  }

  #[test]
  fn test_halt_without_poller() {
    Runtime::new().halt();
  }

  #[test]
  fn test_spawn_roundtrip() {
    let runtime: Runtime = Runtime::new();
    let value: u64 = runtime.spawn(|| 6_u64 * 7).unwrap().get().unwrap();

    assert_eq!(value, 42);
    assert_eq!(runtime.pending(), 0);
  }
}
