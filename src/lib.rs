//! Forktask - run closures in forked worker processes.
//!
//! Every task runs in its own child process, created by duplicating the
//! calling process. The caller gets a [`Task`] handle back immediately; a
//! background poller thread resolves it with the computation's return value
//! or with the panic that ended it, reconstructed as an
//! [`Exception`](error::Exception).
//!
//! # Quick Start
//!
//! ```no_run
//! fn square(value: u64) -> u64 {
//!   value * value
//! }
//!
//! let task = forktask::spawn(|| square(7)).unwrap();
//!
//! assert_eq!(task.get().unwrap(), 49);
//! ```
//!
//! Handles can also be awaited, and [`wait_for`] yields handles from a set
//! as they finish.
//!
//! # Core Modules
//!
//! - [`runtime`]: Spawning and the completion poller
//! - [`task`]: Result handles
//! - [`wait`]: Completion-waiting combinator
//! - [`error`]: Exception system and error types
//! - [`init`]: Logging initialization
//! - [`consts`]: Runtime configuration constants
//!
//! # Platform
//!
//! Unix only. The crate relies on `fork`, `pipe` and `waitpid`; a worker is
//! a full copy of the caller, so anything the computation captures is
//! available to it without serialization, and only the return value is
//! sent back.

mod ipc;
mod worker;

pub mod consts;
pub mod core;
pub mod error;
pub mod init;
pub mod runtime;
pub mod task;
pub mod wait;

pub use self::core::WorkerId;
pub use self::runtime::OrphanPolicy;
pub use self::runtime::Runtime;
pub use self::runtime::RuntimeConfig;
pub use self::task::Task;
pub use self::task::TaskStatus;
pub use self::wait::Ready;
pub use self::wait::WaitFor;
pub use self::wait::wait_for;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::SpawnError;

/// Runs `compute` in a new worker process of the global [`Runtime`].
///
/// See [`Runtime::spawn`].
#[inline]
pub fn spawn<F, T>(compute: F) -> Result<Task<T>, SpawnError>
where
  F: FnOnce() -> T,
  T: Serialize + DeserializeOwned + Send + 'static,
{
  Runtime::global().spawn(compute)
}

/// Wraps `compute` so that every call spawns it on the global [`Runtime`].
///
/// See [`Runtime::task`].
#[inline]
pub fn task<F, A, T>(compute: F) -> impl Fn(A) -> Result<Task<T>, SpawnError>
where
  F: Fn(A) -> T,
  T: Serialize + DeserializeOwned + Send + 'static,
{
  Runtime::global().task(compute)
}
