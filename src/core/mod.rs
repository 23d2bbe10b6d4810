mod macros;
mod worker_id;

pub(crate) use self::macros::fatal;

pub use self::worker_id::WorkerId;
