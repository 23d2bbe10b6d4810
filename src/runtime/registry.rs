use hashbrown::HashMap;
use parking_lot::Mutex;
use std::time::Instant;
use triomphe::Arc;

use crate::consts;
use crate::core::WorkerId;
use crate::core::fatal;
use crate::error::WorkerExit;
use crate::ipc::ReadEnd;
use crate::task::Resolve;

// -----------------------------------------------------------------------------
// Registration
// -----------------------------------------------------------------------------

/// Parent-side bookkeeping for one live worker.
pub(crate) struct Registration {
  /// Write side of the caller's task handle.
  pub(crate) resolver: Box<dyn Resolve>,
  /// Read-end of the success channel.
  pub(crate) value: ReadEnd,
  /// Read-end of the error channel.
  pub(crate) error: ReadEnd,
  /// When the worker was spawned.
  pub(crate) spawned: Instant,
  /// Termination status, once the worker has been reaped.
  pub(crate) exit: Option<WorkerExit>,
  /// Last transport fault observed on either channel.
  pub(crate) fault: Option<String>,
}

impl Registration {
  #[inline]
  pub(crate) fn new(resolver: Box<dyn Resolve>, value: ReadEnd, error: ReadEnd) -> Self {
    Self {
      resolver,
      value,
      error,
      spawned: Instant::now(),
      exit: None,
      fault: None,
    }
  }
}

// -----------------------------------------------------------------------------
// Registry
// -----------------------------------------------------------------------------

/// A registration shared between the registry and one poller sweep.
pub(crate) type Entry = Arc<Mutex<Registration>>;

/// Table of live workers, keyed by process id.
///
/// Entries are inserted by the spawning path and removed only by the
/// completion poller. Each entry has its own lock, so the table lock is
/// held only to insert, snapshot or remove and never while a channel is
/// read.
pub(crate) struct Registry {
  tasks: HashMap<WorkerId, Entry>,
}

impl Registry {
  #[inline]
  pub(crate) fn new() -> Self {
    Self {
      tasks: HashMap::with_capacity(consts::CAP_REGISTERED_TASKS),
    }
  }

  #[inline]
  pub(crate) fn len(&self) -> usize {
    self.tasks.len()
  }

  #[inline]
  pub(crate) fn is_empty(&self) -> bool {
    self.tasks.is_empty()
  }

  /// Returns the entries registered at this instant.
  pub(crate) fn snapshot(&self) -> Vec<(WorkerId, Entry)> {
    self
      .tasks
      .iter()
      .map(|(worker, entry)| (*worker, Arc::clone(entry)))
      .collect()
  }

  /// Registers a freshly spawned worker.
  pub(crate) fn insert(&mut self, worker: WorkerId, registration: Registration) {
    if self.tasks.insert(worker, Arc::new(Mutex::new(registration))).is_some() {
      fatal!("duplicate registration for {worker}");
    }
  }

  /// Removes the registration of a settled worker.
  ///
  /// The caller must have released every snapshot of the entry.
  pub(crate) fn remove(&mut self, worker: WorkerId) -> Registration {
    let Some(entry) = self.tasks.remove(&worker) else {
      fatal!("missing registration for {worker}");
    };

    match Arc::try_unwrap(entry) {
      Ok(registration) => registration.into_inner(),
      Err(_) => fatal!("registration for {worker} removed while shared"),
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::core::WorkerId;
  use crate::ipc::ReadEnd;
  use crate::ipc::WriteEnd;
  use crate::ipc::channel;
  use crate::runtime::registry::Entry;
  use crate::runtime::registry::Registration;
  use crate::runtime::registry::Registry;
  use crate::task::Resolver;
  use crate::task::Task;
  use crate::task::pair;

  fn registration() -> (Task<u8>, Registration, WriteEnd, WriteEnd) {
    let (task, resolver): (Task<u8>, Resolver<u8>) = pair(WorkerId::from_raw(5));
    let (value, value_tx): (ReadEnd, WriteEnd) = channel().unwrap();
    let (error, error_tx): (ReadEnd, WriteEnd) = channel().unwrap();

    (task, Registration::new(Box::new(resolver), value, error), value_tx, error_tx)
  }

  #[test]
  fn test_insert_remove() {
    let mut registry: Registry = Registry::new();
    let (_task, registration, _value, _error) = registration();

    registry.insert(WorkerId::from_raw(5), registration);

    assert_eq!(registry.len(), 1);

    let snapshot: Vec<(WorkerId, Entry)> = registry.snapshot();

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].0, WorkerId::from_raw(5));
    assert!(snapshot[0].1.lock().exit.is_none());

    drop(snapshot);

    let removed: Registration = registry.remove(WorkerId::from_raw(5));

    assert!(removed.exit.is_none());
    assert!(registry.is_empty());
  }

  #[test]
  fn test_snapshot_does_not_hold_table() {
    let mut registry: Registry = Registry::new();
    let (_task, first, _value, _error) = registration();

    registry.insert(WorkerId::from_raw(5), first);

    let snapshot: Vec<(WorkerId, Entry)> = registry.snapshot();
    let _guard = snapshot[0].1.lock();

    // Inserting while an entry is locked does not touch that entry.
    let (_other, second, _other_value, _other_error) = registration();
    registry.insert(WorkerId::from_raw(6), second);

    assert_eq!(registry.len(), 2);
  }
}
