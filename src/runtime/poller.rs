//! Completion poller.
//!
//! A single background thread per process image scans the registry,
//! settles tasks whose worker delivered an outcome, and reaps terminated
//! workers. Polling is plain busy-waiting with a short sleep; no readiness
//! notification facility is involved.

use nix::errno::Errno;
use nix::sys::wait::WaitPidFlag;
use nix::sys::wait::WaitStatus;
use nix::sys::wait::waitpid;
use nix::unistd;
use parking_lot::Mutex;
use parking_lot::MutexGuard;
use std::sync::atomic::AtomicU8;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;
use tracing::Level;
use tracing::Span;
use tracing::debug;
use tracing::span;
use tracing::trace;
use tracing::warn;
use triomphe::Arc;

use crate::core::WorkerId;
use crate::error::Exception;
use crate::error::TaskError;
use crate::error::WorkerExit;
use crate::error::WorkerLost;
use crate::ipc::Frame;
use crate::ipc::codec;
use crate::runtime::OrphanPolicy;
use crate::runtime::RuntimeConfig;
use crate::runtime::registry::Entry;
use crate::runtime::registry::Registration;
use crate::runtime::registry::Registry;

// -----------------------------------------------------------------------------
// Poller Mode
// -----------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Mode {
  /// Keep polling.
  Run = 0,
  /// Exit once every registration is settled and every worker reaped.
  Drain = 1,
  /// Exit at the start of the next iteration.
  Halt = 2,
}

impl Mode {
  #[inline]
  const fn from_u8(value: u8) -> Self {
    match value {
      0 => Self::Run,
      1 => Self::Drain,
      _ => Self::Halt,
    }
  }
}

// -----------------------------------------------------------------------------
// Poller Shared State
// -----------------------------------------------------------------------------

/// State shared between the spawning path and one poller thread.
pub(crate) struct PollerShared {
  pub(crate) registry: Mutex<Registry>,
  mode: AtomicU8,
  unreaped: AtomicUsize,
  interval: Duration,
  orphans: OrphanPolicy,
}

impl PollerShared {
  #[inline]
  pub(crate) fn new(config: &RuntimeConfig) -> Self {
    Self {
      registry: Mutex::new(Registry::new()),
      mode: AtomicU8::new(Mode::Run as u8),
      unreaped: AtomicUsize::new(0),
      interval: config.poll_interval,
      orphans: config.orphans,
    }
  }

  #[inline]
  pub(crate) fn mode(&self) -> Mode {
    Mode::from_u8(self.mode.load(Ordering::Acquire))
  }

  #[inline]
  pub(crate) fn set_mode(&self, mode: Mode) {
    self.mode.store(mode as u8, Ordering::Release);
  }

  /// Returns the number of settled workers not reaped yet.
  #[inline]
  pub(crate) fn unreaped(&self) -> usize {
    self.unreaped.load(Ordering::Acquire)
  }
}

// -----------------------------------------------------------------------------
// Poller Loop
// -----------------------------------------------------------------------------

/// Runs the poller loop until the shared mode asks it to stop.
pub(crate) fn run(shared: Arc<PollerShared>) {
  let span: Span = span!(target: "forktask", Level::DEBUG, "poller", pid = %unistd::getpid());
  let _enter: span::Entered<'_> = span.enter();

  debug!(target: "forktask", interval = ?shared.interval, "poller started");

  let mut backlog: Vec<WorkerId> = Vec::new();

  loop {
    let mode: Mode = shared.mode();

    if mode == Mode::Halt {
      break;
    }

    for settled in sweep(&shared) {
      if settled.registration.exit.is_none() {
        backlog.push(settled.worker);
      }

      settled.resolve();
    }

    backlog.retain(|worker| matches!(reap(*worker), Reap::Alive));
    shared.unreaped.store(backlog.len(), Ordering::Release);

    if mode == Mode::Drain && backlog.is_empty() && shared.registry.lock().is_empty() {
      break;
    }

    thread::sleep(shared.interval);
  }

  debug!(target: "forktask", pending = shared.registry.lock().len(), "poller stopped");
}

// -----------------------------------------------------------------------------
// Sweep
// -----------------------------------------------------------------------------

enum Verdict {
  Fulfilled,
  Failed(TaskError),
}

/// A registration removed from the registry, waiting to be resolved.
struct Settled {
  worker: WorkerId,
  registration: Registration,
  verdict: Verdict,
}

impl Settled {
  fn resolve(self) {
    let Registration {
      resolver, spawned, ..
    } = self.registration;

    match self.verdict {
      Verdict::Fulfilled => {
        debug!(target: "forktask", worker = %self.worker, latency = ?spawned.elapsed(), "task fulfilled");
        resolver.fulfill();
      }
      Verdict::Failed(error) => {
        debug!(target: "forktask", worker = %self.worker, latency = ?spawned.elapsed(), %error, "task failed");
        resolver.fail(error);
      }
    }
  }
}

/// Visits every registration once and removes those that settled.
///
/// The registry lock is taken only to snapshot the entries and to remove
/// settled ones; channels are read under each entry's own lock, so
/// spawning never waits for a frame to be read or decoded. Handles are
/// resolved by the caller.
fn sweep(shared: &PollerShared) -> Vec<Settled> {
  let snapshot: Vec<(WorkerId, Entry)> = shared.registry.lock().snapshot();
  let mut verdicts: Vec<(WorkerId, Verdict)> = Vec::new();

  for (worker, entry) in snapshot {
    let mut registration: MutexGuard<'_, Registration> = entry.lock();

    let verdict: Option<Verdict> = match settle(worker, &mut registration) {
      Some(verdict) => Some(verdict),
      None if shared.orphans == OrphanPolicy::Fail => orphan(worker, &mut registration),
      None => None,
    };

    if let Some(verdict) = verdict {
      verdicts.push((worker, verdict));
    }
  }

  if verdicts.is_empty() {
    return Vec::new();
  }

  let mut registry: MutexGuard<'_, Registry> = shared.registry.lock();

  verdicts
    .into_iter()
    .map(|(worker, verdict)| Settled {
      worker,
      registration: registry.remove(worker),
      verdict,
    })
    .collect()
}

/// Checks both channels of a registration for its outcome frame.
fn settle(worker: WorkerId, registration: &mut Registration) -> Option<Verdict> {
  match registration.value.poll_frame() {
    Frame::Ready(payload) => match registration.resolver.accept(&payload) {
      Ok(()) => return Some(Verdict::Fulfilled),
      Err(error) => record_fault(worker, registration, format!("malformed value payload: {error}")),
    },
    Frame::Fault(fault) => record_fault(worker, registration, fault),
    Frame::Pending | Frame::Closed => {}
  }

  match registration.error.poll_frame() {
    Frame::Ready(payload) => match codec::decode::<Exception>(&payload) {
      Ok(mut exception) => {
        exception.set_origin(worker);
        return Some(Verdict::Failed(TaskError::Raised(exception)));
      }
      Err(error) => record_fault(worker, registration, format!("malformed error payload: {error}")),
    },
    Frame::Fault(fault) => record_fault(worker, registration, fault),
    Frame::Pending | Frame::Closed => {}
  }

  None
}

/// Fails a registration whose worker terminated without an outcome.
fn orphan(worker: WorkerId, registration: &mut Registration) -> Option<Verdict> {
  if registration.exit.is_none() {
    let Reap::Exited(exit) = reap(worker) else {
      return None;
    };

    registration.exit = Some(exit);

    // The worker closes its channels before exiting; collect what it left.
    if let Some(verdict) = settle(worker, registration) {
      return Some(verdict);
    }
  }

  let exit: WorkerExit = registration.exit.unwrap_or(WorkerExit::Unknown);

  warn!(target: "forktask", %worker, %exit, "worker terminated without an outcome");

  Some(Verdict::Failed(TaskError::Lost(WorkerLost {
    worker,
    exit,
    fault: registration.fault.take(),
  })))
}

fn record_fault(worker: WorkerId, registration: &mut Registration, fault: String) {
  if registration.fault.as_deref() != Some(fault.as_str()) {
    warn!(target: "forktask", %worker, %fault, "transport fault");
    registration.fault = Some(fault);
  }
}

// -----------------------------------------------------------------------------
// Reaping
// -----------------------------------------------------------------------------

enum Reap {
  Alive,
  Exited(WorkerExit),
}

/// Reaps a worker without blocking.
fn reap(worker: WorkerId) -> Reap {
  match waitpid(worker.pid(), Some(WaitPidFlag::WNOHANG)) {
    Ok(WaitStatus::StillAlive) => Reap::Alive,
    Ok(status) => match WorkerExit::from_status(status) {
      Some(exit) => {
        trace!(target: "forktask", %worker, %exit, "worker reaped");
        Reap::Exited(exit)
      }
      None => Reap::Alive,
    },
    Err(Errno::ECHILD) => {
      trace!(target: "forktask", %worker, "worker already reaped");
      Reap::Exited(WorkerExit::Unknown)
    }
    Err(Errno::EINTR) => Reap::Alive,
    Err(errno) => {
      warn!(target: "forktask", %worker, %errno, "waitpid failed");
      Reap::Alive
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
