//! Exception handling and error types.
//!
//! # Exception Model
//!
//! A task's computation reports failure by panicking. The worker process
//! catches the panic, turns it into an [`Exception`] and sends it to the
//! caller, where reading the task handle yields [`TaskError::Raised`].
//!
//! Exceptions carry:
//!
//! 1. **Class**: How the failure was produced ([`Error`], [`Panic`])
//! 2. **Group**: The error category ([`BadArg`], [`Arith`], [`SysInv`], ...)
//! 3. **Description**: A human-readable error message
//! 4. **Location** and **Trace**: Where the failure happened in the worker
//!
//! # Raising Exceptions
//!
//! Use the [`raise!`] macro to construct and panic with an exception:
//!
//! ```
//! use forktask::raise;
//!
//! fn validate_input(value: i32) {
//!   if value < 0 {
//!     raise!(Error, BadArg, "value must be non-negative");
//!   }
//! }
//! ```
//!
//! Plain panics work as well; their group is inferred from the message so
//! that, for example, a division by zero arrives as [`Arith`].
//!
//! [`Error`]: ExceptionClass::Error
//! [`Panic`]: ExceptionClass::Panic
//! [`BadArg`]: ExceptionGroup::BadArg
//! [`Arith`]: ExceptionGroup::Arith
//! [`SysInv`]: ExceptionGroup::SysInv
//!
//! [`raise!`]: crate::raise!

mod exception;
mod exception_class;
mod exception_group;
mod spawn_error;
mod task_error;

pub use self::exception::Exception;
pub use self::exception::Location;
pub use self::exception::Trace;
pub use self::exception_class::ExceptionClass;
pub use self::exception_group::ExceptionGroup;
pub use self::spawn_error::SpawnError;
pub use self::spawn_error::SpawnOp;
pub use self::task_error::TaskError;
pub use self::task_error::WorkerExit;
pub use self::task_error::WorkerLost;

// -----------------------------------------------------------------------------
// raise!
// -----------------------------------------------------------------------------

/// Raises an exception with the specified class, group, and message.
///
/// This macro constructs an [`Exception`] and panics with it as the payload.
/// Inside a task, the exception reaches the caller with its class and group
/// intact. Outside a task it behaves like any panic with a non-string
/// payload.
///
/// # Examples
///
/// ```
/// # use forktask::raise;
/// fn register_name(name: &str) {
///   if name.is_empty() {
///     raise!(Error, BadArg, "name cannot be empty");
///   }
/// }
/// ```
#[macro_export]
macro_rules! raise {
  ($class:ident, $group:ident, $error:expr $(,)?) => {
    $crate::error::Exception::new(
      $crate::error::ExceptionClass::$class,
      $crate::error::ExceptionGroup::$group,
      $error,
    )
    .raise()
  };
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::panic;

  use crate::error::Exception;

  #[test]
  fn test_raise_macro_badarg() {
    assert!(panic::catch_unwind(|| raise!(Error, BadArg, "test message")).is_err());
  }

  #[test]
  fn test_raise_macro_payload() {
    let payload = panic::catch_unwind(|| raise!(Error, SysInv, "invalid state")).unwrap_err();
    let exception: Box<Exception> = payload.downcast::<Exception>().unwrap();

    assert_eq!(exception.error(), "invalid state");
  }
}
