use serde::Deserialize;
use serde::Serialize;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

/// Exception category indicating the nature of the error.
///
/// Groups travel with the exception from the worker process to the caller,
/// so they can drive error handling on the reading side.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ExceptionGroup {
  /// Invalid function argument or parameter.
  ///
  /// Indicates the caller provided data that violates function preconditions.
  BadArg,
  /// Arithmetic fault such as division by zero or integer overflow.
  Arith,
  /// Serialization fault while moving a value across the process boundary.
  Codec,
  /// System capacity limit exceeded.
  SysCap,
  /// Invalid system operation or state.
  SysInv,
  /// Panic payload without a recognizable category.
  Unknown,
}

impl ExceptionGroup {
  #[inline]
  pub(crate) const fn label(&self) -> &'static str {
    match self {
      Self::BadArg => "badarg",
      Self::Arith => "arith",
      Self::Codec => "codec",
      Self::SysCap => "syscap",
      Self::SysInv => "sysinv",
      Self::Unknown => "unknown",
    }
  }

  /// Infers the group of a plain panic from its message.
  ///
  /// Only the messages emitted by the compiler-inserted arithmetic checks are
  /// recognized; everything else is [`Unknown`].
  ///
  /// [`Unknown`]: Self::Unknown
  pub fn classify(message: &str) -> Self {
    let Some(check) = message.strip_prefix("attempt to ") else {
      return Self::Unknown;
    };

    if check.starts_with("divide by zero")
      || check.starts_with("calculate the remainder with a divisor of zero")
      || check.ends_with("with overflow")
    {
      Self::Arith
    } else {
      Self::Unknown
    }
  }
}

impl Display for ExceptionGroup {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    match self {
      Self::BadArg => f.write_str("(BadArg) errors were found with the given argument(s)"),
      Self::Arith => f.write_str("(Arith) an arithmetic operation failed"),
      Self::Codec => f.write_str("(Codec) a value could not be transferred"),
      Self::SysCap => f.write_str("(SysCap) a system limit has been reached"),
      Self::SysInv => f.write_str("(SysInv) a system invariant has been broken"),
      Self::Unknown => f.write_str("(Unknown) the computation panicked"),
    }
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
