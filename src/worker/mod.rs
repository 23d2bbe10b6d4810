//! Worker process entry point.
//!
//! Runs in the child created by [`Runtime::spawn`]. The child carries a copy
//! of every lock in the parent, including those held by threads that were
//! not duplicated, so this code avoids logging and any runtime state it
//! does not own. The panic hook is installed by the parent before forking;
//! the child only switches it to recording.
//!
//! [`Runtime::spawn`]: crate::Runtime::spawn

mod hook;

use serde::Serialize;
use std::panic;
use std::panic::AssertUnwindSafe;

use crate::consts;
use crate::error::Exception;
use crate::error::ExceptionClass;
use crate::error::ExceptionGroup;
use crate::ipc::WriteEnd;
use crate::ipc::codec;
use crate::runtime::Runtime;

/// Prepares the calling process for forking workers.
///
/// Must be called with the fork lock held, so no worker is forked while the
/// panic hook is being replaced.
#[inline]
pub(crate) fn prepare() {
  hook::install();
}

/// Evaluates `compute`, sends its outcome and terminates the worker.
///
/// Exactly one of the two channels receives a frame. Both write-ends are
/// closed before the worker waits for any poller it started itself.
pub(crate) fn run<F, T>(runtime: &Runtime, compute: F, mut value: WriteEnd, mut error: WriteEnd) -> !
where
  F: FnOnce() -> T,
  T: Serialize,
{
  hook::enter_worker();

  // Nothing may unwind past this point into the caller's stack.
  let delivered: bool =
    panic::catch_unwind(AssertUnwindSafe(|| deliver(compute, &mut value, &mut error))).unwrap_or(false);

  drop(value);
  drop(error);

  runtime.halt_all();

  let code: i32 = if delivered {
    consts::E_CODE_SUCCESS
  } else {
    consts::E_CODE_FAILURE_SEND
  };

  // SAFETY: `_exit` ends the process without running destructors, atexit
  //         handlers or stdio flushes, none of which may run on state
  //         copied from the parent. Both write-ends are already closed.
  unsafe { libc::_exit(code) }
}

fn deliver<F, T>(compute: F, value: &mut WriteEnd, error: &mut WriteEnd) -> bool
where
  F: FnOnce() -> T,
  T: Serialize,
{
  match panic::catch_unwind(AssertUnwindSafe(compute)) {
    Ok(output) => match codec::encode(&output) {
      Ok(payload) => value.send(&payload).is_ok(),
      Err(codec_error) => send_exception(
        error,
        Exception::new(
          ExceptionClass::Error,
          ExceptionGroup::Codec,
          format_args!("failed to encode return value: {codec_error}"),
        ),
      ),
    },
    Err(payload) => send_exception(error, hook::exception(payload)),
  }
}

fn send_exception(channel: &mut WriteEnd, exception: Exception) -> bool {
  match codec::encode(&exception) {
    Ok(payload) => channel.send(&payload).is_ok(),
    Err(_) => false,
  }
}
