//! Payload encoding for outcome frames.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::error::Error;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::fmt::Result;

/// Error produced when a payload cannot be encoded or decoded.
pub struct CodecError {
  inner: bincode::Error,
}

impl Debug for CodecError {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    Debug::fmt(&self.inner, f)
  }
}

impl Display for CodecError {
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    Display::fmt(&self.inner, f)
  }
}

impl Error for CodecError {}

#[inline]
pub(crate) fn encode<T>(value: &T) -> std::result::Result<Vec<u8>, CodecError>
where
  T: Serialize + ?Sized,
{
  bincode::serialize(value).map_err(|inner| CodecError { inner })
}

#[inline]
pub(crate) fn decode<T>(bytes: &[u8]) -> std::result::Result<T, CodecError>
where
  T: DeserializeOwned,
{
  bincode::deserialize(bytes).map_err(|inner| CodecError { inner })
}
