use nix::fcntl::FcntlArg;
use nix::fcntl::FdFlag;
use nix::fcntl::OFlag;
use nix::fcntl::fcntl;
use nix::unistd;
use std::fs::File;
use std::io;
use std::io::ErrorKind;
use std::io::Read;
use std::io::Write;
use std::os::fd::AsRawFd;
use std::os::fd::OwnedFd;

use crate::consts;
use crate::error::SpawnError;
use crate::error::SpawnOp;

/// Creates a unidirectional outcome channel.
///
/// Both ends are close-on-exec. The read-end is non-blocking; the write-end
/// blocks. Channels must be created before the process is duplicated so
/// the worker inherits its write-end.
pub(crate) fn channel() -> Result<(ReadEnd, WriteEnd), SpawnError> {
  let (read, write): (OwnedFd, OwnedFd) =
    unistd::pipe().map_err(|errno| SpawnError::errno(SpawnOp::Pipe, errno))?;

  set_cloexec(&read)?;
  set_cloexec(&write)?;
  set_nonblocking(&read)?;

  Ok((ReadEnd::new(read), WriteEnd::new(write)))
}

fn set_cloexec(fd: &OwnedFd) -> Result<(), SpawnError> {
  fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
    .map(drop)
    .map_err(|errno| SpawnError::errno(SpawnOp::Fcntl, errno))
}

fn set_nonblocking(fd: &OwnedFd) -> Result<(), SpawnError> {
  let error = |errno| SpawnError::errno(SpawnOp::Fcntl, errno);
  let flags: OFlag = OFlag::from_bits_truncate(fcntl(fd.as_raw_fd(), FcntlArg::F_GETFL).map_err(error)?);

  fcntl(fd.as_raw_fd(), FcntlArg::F_SETFL(flags | OFlag::O_NONBLOCK))
    .map(drop)
    .map_err(error)
}

// -----------------------------------------------------------------------------
// Frame
// -----------------------------------------------------------------------------

/// Result of polling a read-end for its outcome frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Frame {
  /// A complete frame payload.
  Ready(Vec<u8>),
  /// No complete frame yet; more bytes may arrive.
  Pending,
  /// End-of-stream was reached without a complete frame.
  Closed,
  /// The stream is unusable: malformed header or failed read.
  Fault(String),
}

// -----------------------------------------------------------------------------
// Read End
// -----------------------------------------------------------------------------

/// Parent-side end of an outcome channel.
///
/// Bytes are accumulated across polls, so a frame larger than the pipe
/// buffer is assembled over several poller iterations.
pub(crate) struct ReadEnd {
  file: File,
  buffer: Vec<u8>,
  closed: bool,
}

impl ReadEnd {
  #[inline]
  fn new(fd: OwnedFd) -> Self {
    Self {
      file: File::from(fd),
      buffer: Vec::new(),
      closed: false,
    }
  }

  /// Reads whatever is available without blocking and returns the state of
  /// the channel's frame.
  pub(crate) fn poll_frame(&mut self) -> Frame {
    if !self.closed {
      if let Err(error) = self.fill() {
        return Frame::Fault(format!("read failed: {error}"));
      }
    }

    match self.take_frame() {
      Ok(Some(frame)) => Frame::Ready(frame),
      Ok(None) if self.closed => Frame::Closed,
      Ok(None) => Frame::Pending,
      Err(fault) => Frame::Fault(fault),
    }
  }

  fn fill(&mut self) -> io::Result<()> {
    let mut chunk: [u8; consts::READ_CHUNK_LEN] = [0; consts::READ_CHUNK_LEN];
    let mut read: usize = 0;

    while read < consts::READ_BUDGET_LEN
      && self.buffer.len() <= consts::FRAME_HEADER_LEN + consts::MAX_FRAME_LEN
    {
      match self.file.read(&mut chunk) {
        Ok(0) => {
          self.closed = true;
          break;
        }
        Ok(count) => {
          read += count;
          self.buffer.extend_from_slice(&chunk[..count]);
        }
        Err(error) if error.kind() == ErrorKind::Interrupted => continue,
        Err(error) if error.kind() == ErrorKind::WouldBlock => break,
        Err(error) => return Err(error),
      }
    }

    Ok(())
  }

  fn take_frame(&mut self) -> Result<Option<Vec<u8>>, String> {
    let Some(header) = self.buffer.first_chunk::<{ consts::FRAME_HEADER_LEN }>() else {
      return Ok(None);
    };

    let size: usize = u32::from_le_bytes(*header) as usize;

    if size > consts::MAX_FRAME_LEN {
      return Err(format!("frame of {size} bytes exceeds the limit"));
    }

    let end: usize = consts::FRAME_HEADER_LEN + size;

    if self.buffer.len() < end {
      return Ok(None);
    }

    // A channel carries a single frame; anything after it is discarded.
    let frame: Vec<u8> = self.buffer[consts::FRAME_HEADER_LEN..end].to_vec();
    self.buffer = Vec::new();

    Ok(Some(frame))
  }
}

// -----------------------------------------------------------------------------
// Write End
// -----------------------------------------------------------------------------

/// Worker-side end of an outcome channel.
pub(crate) struct WriteEnd {
  file: File,
}

impl WriteEnd {
  #[inline]
  fn new(fd: OwnedFd) -> Self {
    Self {
      file: File::from(fd),
    }
  }

  /// Writes `payload` as a single length-prefixed frame.
  pub(crate) fn send(&mut self, payload: &[u8]) -> io::Result<()> {
    let size: u32 = u32::try_from(payload.len())
      .ok()
      .filter(|size| *size as usize <= consts::MAX_FRAME_LEN)
      .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "payload exceeds the frame limit"))?;

    self.file.write_all(&size.to_le_bytes())?;
    self.file.write_all(payload)?;
    self.file.flush()
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
