//! Outcome channels between a worker process and its parent.
//!
//! Every task owns two channels: one carries the encoded return value, the
//! other the encoded [`Exception`]. A channel carries at most one frame in
//! its lifetime, framed as a little-endian `u32` length followed by the
//! [`bincode`] payload.
//!
//! [`Exception`]: crate::error::Exception

mod channel;

pub(crate) mod codec;

pub(crate) use self::channel::Frame;
pub(crate) use self::channel::ReadEnd;
pub(crate) use self::channel::WriteEnd;
pub(crate) use self::channel::channel;

pub use self::codec::CodecError;
