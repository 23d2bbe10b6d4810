//! Logging initialization.
//!
//! The crate emits [`tracing`] events under the `forktask` target. With the
//! `tracing` feature enabled, [`tracing`](fn@tracing) installs a compact
//! `tracing-subscriber` formatter as the global default; without it the
//! call does nothing and events go to whatever subscriber the application
//! installs itself.
//!
//! Worker processes never log.

use std::fmt::Display;

use crate::error::Exception;
use crate::error::ExceptionClass;
use crate::error::ExceptionGroup;

// -----------------------------------------------------------------------------
// Tracing Config
// -----------------------------------------------------------------------------

/// Options for the global tracing subscriber.
#[derive(Clone, Debug)]
pub struct TracingConfig {
  pub source_file: bool,
  pub source_line: bool,
  pub source_name: bool,
  pub thread_info: bool,
  pub verbose: bool,
  pub very_verbose: bool,
}

impl TracingConfig {
  #[inline]
  pub const fn new() -> Self {
    Self {
      source_file: false,
      source_line: false,
      source_name: false,
      thread_info: true,
      verbose: true,
      very_verbose: false,
    }
  }

  /// Returns the most verbose level that is recorded.
  #[inline]
  pub const fn filter(&self) -> tracing::Level {
    if self.very_verbose {
      tracing::Level::TRACE
    } else if self.verbose {
      tracing::Level::DEBUG
    } else {
      tracing::Level::INFO
    }
  }
}

impl Default for TracingConfig {
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

// -----------------------------------------------------------------------------
// Subscriber
// -----------------------------------------------------------------------------

/// Installs the global tracing subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already set.
#[cfg(feature = "tracing")]
pub fn tracing(config: &TracingConfig) -> Result<(), Exception> {
  use tracing_subscriber::FmtSubscriber;
  use tracing_subscriber::fmt::format;
  use tracing_subscriber::util::SubscriberInitExt;

  FmtSubscriber::builder()
    .event_format(format().compact())
    .log_internal_errors(true)
    .with_ansi(true)
    .with_file(config.source_file)
    .with_level(true)
    .with_line_number(config.source_line)
    .with_max_level(config.filter())
    .with_target(config.source_name)
    .with_thread_ids(config.thread_info)
    .with_thread_names(config.thread_info)
    .finish()
    .try_init()
    .map_err(error)
}

/// Installs the global tracing subscriber.
///
/// Does nothing unless the `tracing` feature is enabled.
#[cfg(not(feature = "tracing"))]
#[inline]
pub fn tracing(_config: &TracingConfig) -> Result<(), Exception> {
  Ok(())
}

#[cfg_attr(not(feature = "tracing"), allow(dead_code))]
fn error<E>(error: E) -> Exception
where
  E: Display,
{
  Exception::new(ExceptionClass::Error, ExceptionGroup::SysInv, error)
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use crate::init::TracingConfig;

  #[test]
  fn test_filter() {
    let mut config: TracingConfig = TracingConfig::new();
    assert_eq!(config.filter(), tracing::Level::DEBUG);

    config.very_verbose = true;
    assert_eq!(config.filter(), tracing::Level::TRACE);

    config.very_verbose = false;
    config.verbose = false;
    assert_eq!(config.filter(), tracing::Level::INFO);
  }
}
