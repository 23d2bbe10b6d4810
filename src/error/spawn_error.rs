use nix::errno::Errno;
use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;
use std::io;

/// The step of the spawn sequence that failed.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub enum SpawnOp {
  /// Creating an outcome channel.
  Pipe,
  /// Configuring an outcome channel.
  Fcntl,
  /// Duplicating the process.
  Fork,
  /// Starting the completion poller thread.
  Thread,
}

impl Display for SpawnOp {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    match self {
      Self::Pipe => f.write_str("pipe"),
      Self::Fcntl => f.write_str("fcntl"),
      Self::Fork => f.write_str("fork"),
      Self::Thread => f.write_str("thread"),
    }
  }
}

/// Error returned when a task could not be spawned.
///
/// No worker process exists and nothing was registered when this is
/// returned.
#[derive(Debug)]
pub struct SpawnError {
  op: SpawnOp,
  source: io::Error,
}

impl SpawnError {
  #[inline]
  pub(crate) fn new<E>(op: SpawnOp, source: E) -> Self
  where
    E: Into<io::Error>,
  {
    Self {
      op,
      source: source.into(),
    }
  }

  #[inline]
  pub(crate) fn errno(op: SpawnOp, errno: Errno) -> Self {
    Self::new(op, io::Error::from(errno))
  }

  /// Returns the step of the spawn sequence that failed.
  #[inline]
  pub const fn op(&self) -> SpawnOp {
    self.op
  }

  /// Returns the underlying OS error.
  #[inline]
  pub const fn io_error(&self) -> &io::Error {
    &self.source
  }
}

impl Display for SpawnError {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    write!(f, "failed to spawn task ({}): {}", self.op, self.source)
  }
}

impl Error for SpawnError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    Some(&self.source)
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use nix::errno::Errno;
  use std::error::Error;

  use crate::error::SpawnError;
  use crate::error::SpawnOp;

  #[test]
  fn test_display() {
    let error: SpawnError = SpawnError::errno(SpawnOp::Fork, Errno::EAGAIN);

    assert_eq!(error.op(), SpawnOp::Fork);
    assert!(error.to_string().starts_with("failed to spawn task (fork): "));
    assert!(error.source().is_some());
  }
}
