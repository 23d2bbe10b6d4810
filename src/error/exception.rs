use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use std::any::Any;
use std::backtrace::Backtrace;
use std::backtrace::BacktraceStatus;
use std::error::Error;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;
use std::panic;

use crate::core::WorkerId;
use crate::error::ExceptionClass;
use crate::error::ExceptionGroup;

// -----------------------------------------------------------------------------
// Exception
// -----------------------------------------------------------------------------

/// A structured exception with class, group, message, and stack context.
///
/// Exceptions are produced in two ways:
///
/// - raised explicitly with the [`raise!`] macro, which panics with the
///   exception itself as payload;
/// - built from any other panic that escapes a task's computation.
///
/// When a task fails, the exception is serialized in the worker process and
/// reconstructed in the caller. The reconstructed exception keeps the class,
/// group, message and source location, and carries the worker's stack trace
/// as rendered text (see [`Trace::Remote`]).
///
/// # Display Format
///
/// Exceptions format as: `{class}:{group} - {message}`
///
/// Example: `panic:arith - attempt to divide by zero`
///
/// [`raise!`]: crate::raise
#[derive(Serialize, Deserialize)]
pub struct Exception {
  class: ExceptionClass,
  group: ExceptionGroup,
  error: String,
  location: Option<Location>,
  trace: Trace,
  #[serde(skip)]
  origin: Option<WorkerId>,
}

impl Exception {
  /// Creates a new exception with the given class, group, and message.
  ///
  /// Captures a backtrace at the call site, subject to `RUST_BACKTRACE`.
  /// This function is typically invoked via the [`raise!`] macro rather
  /// than directly.
  ///
  /// # Examples
  ///
  /// ```
  /// use forktask::error::{Exception, ExceptionClass, ExceptionGroup};
  ///
  /// let exception = Exception::new(
  ///   ExceptionClass::Error,
  ///   ExceptionGroup::BadArg,
  ///   "invalid input",
  /// );
  ///
  /// assert_eq!(exception.to_string(), "error:badarg - invalid input");
  /// ```
  ///
  /// [`raise!`]: crate::raise
  #[inline]
  pub fn new<T>(class: ExceptionClass, group: ExceptionGroup, error: T) -> Self
  where
    T: Display,
  {
    Self {
      class,
      group,
      error: error.to_string(),
      location: None,
      trace: Trace::Local(Backtrace::capture()),
      origin: None,
    }
  }

  /// Builds an exception from a caught panic payload.
  ///
  /// An [`Exception`] payload is returned as-is. String payloads become
  /// [`ExceptionClass::Panic`] exceptions whose group is inferred from the
  /// message.
  pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
    let payload: Box<dyn Any + Send> = match payload.downcast::<Self>() {
      Ok(exception) => return *exception,
      Err(payload) => payload,
    };

    let error: String = match payload.downcast::<String>() {
      Ok(error) => *error,
      Err(payload) => match payload.downcast_ref::<&'static str>() {
        Some(error) => (*error).to_owned(),
        None => "Box<dyn Any>".to_owned(),
      },
    };

    Self {
      class: ExceptionClass::Panic,
      group: ExceptionGroup::classify(&error),
      error,
      location: None,
      trace: Trace::Local(Backtrace::disabled()),
      origin: None,
    }
  }

  /// Returns the exception's severity class.
  #[inline]
  pub const fn class(&self) -> ExceptionClass {
    self.class
  }

  /// Returns the exception's error category.
  #[inline]
  pub const fn group(&self) -> ExceptionGroup {
    self.group
  }

  /// Returns the human-readable error message.
  #[inline]
  pub const fn error(&self) -> &str {
    self.error.as_str()
  }

  /// Returns the source location the exception was raised at, if known.
  #[inline]
  pub const fn location(&self) -> Option<&Location> {
    self.location.as_ref()
  }

  /// Returns the stack trace leading up to the exception.
  #[inline]
  pub const fn trace(&self) -> &Trace {
    &self.trace
  }

  /// Returns the worker the exception was raised in.
  ///
  /// This is `None` for exceptions that never crossed a process boundary.
  #[inline]
  pub const fn origin(&self) -> Option<WorkerId> {
    self.origin
  }

  /// Raises this exception as a panic in the current thread.
  ///
  /// The panic payload is the exception itself, so a task re-raising an
  /// exception from a nested task forwards it unchanged.
  #[track_caller]
  pub fn raise(self) -> ! {
    panic::panic_any(self)
  }

  #[inline]
  pub(crate) fn set_location(&mut self, location: Location) {
    self.location = Some(location);
  }

  #[inline]
  pub(crate) fn set_trace(&mut self, trace: Trace) {
    self.trace = trace;
  }

  #[inline]
  pub(crate) fn set_origin(&mut self, origin: WorkerId) {
    self.origin = Some(origin);
  }
}

impl Debug for Exception {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    Display::fmt(self, f)
  }
}

impl Display for Exception {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    write!(f, "{}:{} - {}", self.class, self.group.label(), self.error)
  }
}

impl Error for Exception {}

// -----------------------------------------------------------------------------
// Location
// -----------------------------------------------------------------------------

/// Source location of a raised exception.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
  file: String,
  line: u32,
  column: u32,
}

impl Location {
  /// Returns the name of the source file.
  #[inline]
  pub fn file(&self) -> &str {
    self.file.as_str()
  }

  /// Returns the line number.
  #[inline]
  pub const fn line(&self) -> u32 {
    self.line
  }

  /// Returns the column number.
  #[inline]
  pub const fn column(&self) -> u32 {
    self.column
  }
}

impl From<&panic::Location<'_>> for Location {
  fn from(other: &panic::Location<'_>) -> Self {
    Self {
      file: other.file().to_owned(),
      line: other.line(),
      column: other.column(),
    }
  }
}

impl Display for Location {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    write!(f, "{}:{}:{}", self.file, self.line, self.column)
  }
}

// -----------------------------------------------------------------------------
// Trace
// -----------------------------------------------------------------------------

/// Stack context of an exception.
pub enum Trace {
  /// Backtrace captured in the current process.
  Local(Backtrace),
  /// Backtrace captured in a worker process, rendered as text.
  Remote(String),
}

impl Trace {
  /// Returns `true` if the trace holds resolved stack frames.
  pub fn is_captured(&self) -> bool {
    match self {
      Self::Local(trace) => trace.status() == BacktraceStatus::Captured,
      Self::Remote(trace) => !trace.is_empty(),
    }
  }
}

impl Debug for Trace {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    match self {
      Self::Local(trace) => Debug::fmt(trace, f),
      Self::Remote(trace) => f.debug_tuple("Remote").field(trace).finish(),
    }
  }
}

impl Display for Trace {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    match self {
      Self::Local(trace) if trace.status() == BacktraceStatus::Captured => Display::fmt(trace, f),
      Self::Local(_) => Ok(()),
      Self::Remote(trace) => f.write_str(trace),
    }
  }
}

impl Serialize for Trace {
  fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
  where
    S: Serializer,
  {
    serializer.collect_str(self)
  }
}

impl<'de> Deserialize<'de> for Trace {
  fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
  where
    D: Deserializer<'de>,
  {
    String::deserialize(deserializer).map(Self::Remote)
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
