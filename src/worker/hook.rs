use parking_lot::Mutex;
use std::any::Any;
use std::backtrace::Backtrace;
use std::panic;
use std::panic::PanicHookInfo;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::thread;

use crate::error::Exception;
use crate::error::Location;
use crate::error::Trace;

/// Context of the most recent panic in this worker.
struct PanicRecord {
  location: Option<Location>,
  trace: String,
}

static LAST_PANIC: Mutex<Option<PanicRecord>> = Mutex::new(None);

/// Set once the recording hook is in place; inherited by every worker.
static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Set in worker images only.
static IN_WORKER: AtomicBool = AtomicBool::new(false);

/// Installs the recording panic hook in front of the current one.
///
/// Runs in the parent, before the first fork, so a worker never replaces
/// the hook itself: `set_hook` takes a process-wide lock that a thread of
/// the parent may hold at the moment of the fork. Outside a worker the hook
/// defers to the hook it replaced.
pub(crate) fn install() {
  // `set_hook` refuses to run on a panicking thread; workers spawned from
  // here keep the previous hook.
  if thread::panicking() || INSTALLED.load(Ordering::Acquire) {
    return;
  }

  let previous: Box<dyn Fn(&PanicHookInfo<'_>) + Send + Sync> = panic::take_hook();

  panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
    if IN_WORKER.load(Ordering::Relaxed) {
      record(info);
    } else {
      previous(info);
    }
  }));

  INSTALLED.store(true, Ordering::Release);
}

/// Switches the inherited hook to recording; called first thing in a
/// worker.
#[inline]
pub(crate) fn enter_worker() {
  IN_WORKER.store(true, Ordering::Relaxed);
}

/// Records where the panic happened and renders the stack trace while it is
/// still intact. Nothing is printed; the panic is reported to the caller
/// instead.
fn record(info: &PanicHookInfo<'_>) {
  let record: PanicRecord = PanicRecord {
    location: info.location().map(Location::from),
    trace: Backtrace::force_capture().to_string(),
  };

  *LAST_PANIC.lock() = Some(record);
}

/// Converts a caught panic payload into the exception sent to the caller.
pub(crate) fn exception(payload: Box<dyn Any + Send>) -> Exception {
  let mut exception: Exception = Exception::from_panic(payload);
  let record: Option<PanicRecord> = LAST_PANIC.lock().take();

  // A forwarded exception keeps the context of the worker that raised it.
  if exception.location().is_none() {
    if let Some(record) = record {
      if let Some(location) = record.location {
        exception.set_location(location);
      }

      exception.set_trace(Trace::Remote(record.trace));
    }
  }

  exception
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::error::Exception;
  use crate::error::ExceptionClass;
  use crate::error::ExceptionGroup;
  use crate::error::Location;
  use crate::error::Trace;
  use crate::worker::hook::LAST_PANIC;
  use crate::worker::hook::PanicRecord;
  use crate::worker::hook::exception;
  use crate::worker::hook::install;

  // The hook and the record are process-global.
  static SERIAL: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

  #[test]
  fn test_record_fills_location() {
    let _serial = SERIAL.lock();

    *LAST_PANIC.lock() = Some(PanicRecord {
      location: Some(Location::from(std::panic::Location::caller())),
      trace: "0: frame".to_owned(),
    });

    let exception: Exception = exception(Box::new("boom"));

    assert_eq!(exception.class(), ExceptionClass::Panic);
    assert!(exception.location().is_some_and(|location| location.file().ends_with("hook.rs")));
    assert!(matches!(exception.trace(), Trace::Remote(trace) if trace == "0: frame"));
    assert!(LAST_PANIC.lock().is_none());
  }

  #[test]
  fn test_forwarded_exception_keeps_location() {
    let _serial = SERIAL.lock();

    let mut forwarded: Exception = Exception::new(ExceptionClass::Error, ExceptionGroup::BadArg, "nested");
    forwarded.set_location(Location::from(std::panic::Location::caller()));
    forwarded.set_trace(Trace::Remote("nested trace".to_owned()));

    *LAST_PANIC.lock() = Some(PanicRecord {
      location: None,
      trace: "outer trace".to_owned(),
    });

    let exception: Exception = exception(Box::new(forwarded));

    assert_eq!(exception.group(), ExceptionGroup::BadArg);
    assert!(matches!(exception.trace(), Trace::Remote(trace) if trace == "nested trace"));
  }

  #[test]
  fn test_parent_panic_is_not_recorded() {
    let _serial = SERIAL.lock();

    install();
    install();

    let caught: bool = std::panic::catch_unwind(|| panic!("outside any worker")).is_err();

    assert!(caught);
    assert!(LAST_PANIC.lock().is_none());
  }
}
