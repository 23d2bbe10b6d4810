use std::time::Duration;

// -----------------------------------------------------------------------------
// Exit Codes
// -----------------------------------------------------------------------------

/// Worker exited after delivering its outcome.
pub const E_CODE_SUCCESS: i32 = libc::EXIT_SUCCESS;

/// Worker failed to write its outcome to either channel.
pub const E_CODE_FAILURE_SEND: i32 = 70;

// -----------------------------------------------------------------------------
// Poller Behavior
// -----------------------------------------------------------------------------

/// How long the completion poller sleeps between iterations.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default name prefix of completion poller threads.
///
/// The owning process id is appended, e.g. `forktask-poller-4242`.
pub const POLLER_THREAD_NAME: &str = "forktask-poller";

/// Initial capacity of the task registry.
pub const CAP_REGISTERED_TASKS: usize = 64;

// -----------------------------------------------------------------------------
// Channel Behavior
// -----------------------------------------------------------------------------

/// Size of the little-endian length prefix of every frame.
pub const FRAME_HEADER_LEN: usize = 4;

/// Maximum payload size accepted by a channel read-end.
///
/// Frames declaring a larger payload are treated as transport faults.
pub const MAX_FRAME_LEN: usize = 1 << 30;

/// Number of bytes requested per non-blocking read.
pub const READ_CHUNK_LEN: usize = 16 * 1024;

/// Maximum number of bytes read from one channel per poll.
///
/// Larger frames are assembled over several poller iterations, so one big
/// outcome never monopolizes a sweep.
pub const READ_BUDGET_LEN: usize = 4 * 1024 * 1024;

// -----------------------------------------------------------------------------
// Combinator Behavior
// -----------------------------------------------------------------------------

/// How long [`wait_for`] sleeps when no pending task has finished.
///
/// [`wait_for`]: crate::wait_for
pub const WAIT_INTERVAL: Duration = Duration::from_millis(1);
