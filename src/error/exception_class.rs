use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

/// Exception severity classification.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ExceptionClass {
  /// Structured error raised with [`raise!`].
  ///
  /// [`raise!`]: crate::raise
  Error,
  /// Any other panic, e.g. `panic!`, a failed assertion or an arithmetic check.
  Panic,
}

impl Display for ExceptionClass {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    match self {
      Self::Error => f.write_str("error"),
      Self::Panic => f.write_str("panic"),
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::error::ExceptionClass;

  #[test]
  fn test_display() {
    assert_eq!(format!("{}", ExceptionClass::Error), "error");
    assert_eq!(format!("{}", ExceptionClass::Panic), "panic");
  }
}
