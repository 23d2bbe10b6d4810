//! Internal error handling macros.

/// Displays a system error message and aborts the program.
///
/// Use this for unrecoverable errors that indicate bugs in the engine
/// itself, e.g. a task handle resolved twice. The program prints a
/// diagnostic message and immediately aborts without unwinding.
///
/// # Examples
///
/// ```ignore
/// if registry.remove(worker).is_none() {
///   fatal!("missing task registration");
/// }
/// ```
macro_rules! fatal {
  ($($error:tt)+) => {{
    ::std::eprintln!(
      "{}:{}: (SysInv) a system invariant has been broken: {}",
      ::std::file!(),
      ::std::line!(),
      ::std::format_args!($($error)+),
    );

    ::std::process::abort();
  }};
}

pub(crate) use fatal;
