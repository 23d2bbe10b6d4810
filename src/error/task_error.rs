use nix::sys::wait::WaitStatus;
use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

use crate::core::WorkerId;
use crate::error::Exception;

// -----------------------------------------------------------------------------
// Task Error
// -----------------------------------------------------------------------------

/// Error returned when reading a failed task.
#[derive(Debug)]
#[non_exhaustive]
pub enum TaskError {
  /// The computation panicked or raised an [`Exception`].
  Raised(Exception),
  /// The worker terminated without producing an outcome.
  Lost(WorkerLost),
}

impl TaskError {
  /// Returns the reconstructed exception, if the computation raised one.
  #[inline]
  pub const fn exception(&self) -> Option<&Exception> {
    match self {
      Self::Raised(exception) => Some(exception),
      Self::Lost(_) => None,
    }
  }

  /// Returns the exception, consuming the error.
  #[inline]
  pub fn into_exception(self) -> Option<Exception> {
    match self {
      Self::Raised(exception) => Some(exception),
      Self::Lost(_) => None,
    }
  }

  /// Returns `true` if the worker terminated without an outcome.
  #[inline]
  pub const fn is_lost(&self) -> bool {
    matches!(self, Self::Lost(_))
  }
}

impl Display for TaskError {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    match self {
      Self::Raised(exception) => Display::fmt(exception, f),
      Self::Lost(lost) => Display::fmt(lost, f),
    }
  }
}

impl Error for TaskError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self {
      Self::Raised(exception) => Some(exception),
      Self::Lost(_) => None,
    }
  }
}

// -----------------------------------------------------------------------------
// Worker Lost
// -----------------------------------------------------------------------------

/// Details of a worker that terminated without producing an outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerLost {
  pub(crate) worker: WorkerId,
  pub(crate) exit: WorkerExit,
  pub(crate) fault: Option<String>,
}

impl WorkerLost {
  /// Returns the worker that was lost.
  #[inline]
  pub const fn worker(&self) -> WorkerId {
    self.worker
  }

  /// Returns how the worker terminated.
  #[inline]
  pub const fn exit(&self) -> WorkerExit {
    self.exit
  }

  /// Returns the last transport fault observed on the worker's channels.
  #[inline]
  pub fn fault(&self) -> Option<&str> {
    self.fault.as_deref()
  }
}

impl Display for WorkerLost {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    write!(f, "{} terminated without an outcome ({})", self.worker, self.exit)?;

    if let Some(fault) = self.fault.as_deref() {
      write!(f, ": {fault}")?;
    }

    Ok(())
  }
}

// -----------------------------------------------------------------------------
// Worker Exit
// -----------------------------------------------------------------------------

/// Termination status of a reaped worker process.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum WorkerExit {
  /// The worker exited with the given status code.
  Exited(i32),
  /// The worker was terminated by the given signal number.
  Signaled(i32),
  /// The worker was reaped elsewhere; its status is unknown.
  Unknown,
}

impl WorkerExit {
  /// Converts a `waitpid` result for a terminated worker.
  ///
  /// Returns `None` if the status does not describe a terminated process.
  pub(crate) fn from_status(status: WaitStatus) -> Option<Self> {
    match status {
      WaitStatus::Exited(_, code) => Some(Self::Exited(code)),
      WaitStatus::Signaled(_, signal, _) => Some(Self::Signaled(signal as i32)),
      _ => None,
    }
  }
}

impl Display for WorkerExit {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    match self {
      Self::Exited(code) => write!(f, "exit status {code}"),
      Self::Signaled(signal) => write!(f, "signal {signal}"),
      Self::Unknown => f.write_str("status unknown"),
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use nix::sys::signal::Signal;
  use nix::sys::wait::WaitStatus;
  use nix::unistd::Pid;

  use crate::core::WorkerId;
  use crate::error::TaskError;
  use crate::error::WorkerExit;
  use crate::error::WorkerLost;

  #[test]
  fn test_from_status() {
    let pid: Pid = Pid::from_raw(10);

    assert_eq!(WorkerExit::from_status(WaitStatus::Exited(pid, 3)), Some(WorkerExit::Exited(3)));
    assert_eq!(
      WorkerExit::from_status(WaitStatus::Signaled(pid, Signal::SIGABRT, false)),
      Some(WorkerExit::Signaled(libc::SIGABRT)),
    );
    assert_eq!(WorkerExit::from_status(WaitStatus::StillAlive), None);
  }

  #[test]
  fn test_lost_display() {
    let error: TaskError = TaskError::Lost(WorkerLost {
      worker: WorkerId::from_raw(99),
      exit: WorkerExit::Signaled(9),
      fault: Some("frame too large".to_owned()),
    });

    assert!(error.is_lost());
    assert!(error.exception().is_none());
    assert_eq!(
      error.to_string(),
      "<worker.99> terminated without an outcome (signal 9): frame too large",
    );
  }
}
