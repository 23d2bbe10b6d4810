//! Result handles for spawned tasks.
//!
//! A [`Task`] is the caller's side of a computation running in a worker
//! process. Its write side, the [`Resolver`], is owned by the registry and
//! used only by the completion poller.

mod handle;
mod resolver;

pub(crate) use self::handle::Shared;
pub(crate) use self::handle::State;
pub(crate) use self::resolver::Resolve;
pub(crate) use self::resolver::Resolver;
pub(crate) use self::resolver::pair;

pub use self::handle::Task;
pub use self::handle::TaskStatus;
