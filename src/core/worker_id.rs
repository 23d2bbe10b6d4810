use nix::unistd::Pid;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

/// Identifier of a worker process.
///
/// This is the OS process id of the duplicated process running a task. The
/// id is unique among live workers; the OS recycles it only after the worker
/// has been reaped.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct WorkerId {
  pid: Pid,
}

impl WorkerId {
  #[inline]
  pub(crate) const fn new(pid: Pid) -> Self {
    Self { pid }
  }

  /// Creates a `WorkerId` from a raw process id.
  #[cfg(test)]
  #[inline]
  pub(crate) const fn from_raw(raw: i32) -> Self {
    Self::new(Pid::from_raw(raw))
  }

  /// Returns the raw OS process id of the worker.
  #[inline]
  pub const fn as_raw(&self) -> i32 {
    self.pid.as_raw()
  }

  #[inline]
  pub(crate) const fn pid(&self) -> Pid {
    self.pid
  }
}

impl Debug for WorkerId {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    Display::fmt(self, f)
  }
}

impl Display for WorkerId {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    write!(f, "<worker.{}>", self.pid)
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
