//! Reading and writing whole frames on a byte stream.
//!
//! A single `read` may return fewer bytes than asked for. `read_frame`
//! keeps reading until the length prefix and the full body it declares
//! have arrived, and hands back the body as one contiguous buffer.
//!
//! Deadlines are enforced through [`TimedRead`]: before every `read` the
//! stream is told how long that read may block at most.

use log::trace;
use std::io::{self, Cursor, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::protocol::LENGTH_PREFIX_LEN;

/// A byte source whose blocking reads can be bounded in time.
///
/// Sources that never block keep the default, which ignores the limit.
pub trait TimedRead: Read {
    /// Limits how long the next `read` may block. `None` lifts the limit.
    fn limit_next_read(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        let _ = timeout;
        Ok(())
    }
}

impl TimedRead for TcpStream {
    fn limit_next_read(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_read_timeout(timeout)
    }
}

impl<T: TimedRead + ?Sized> TimedRead for &mut T {
    fn limit_next_read(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        (**self).limit_next_read(timeout)
    }
}

impl<T: TimedRead + ?Sized> TimedRead for Box<T> {
    fn limit_next_read(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        (**self).limit_next_read(timeout)
    }
}

impl TimedRead for &[u8] {}

impl<T: AsRef<[u8]>> TimedRead for Cursor<T> {}

/// Reads one frame and returns its body with the length prefix removed.
///
/// Fails with `Error::ConnectionClosed` if the stream ends mid-frame and
/// with `Error::Timeout` once `deadline` has passed, including while a read
/// is blocked waiting for data. A partially read frame is never returned.
pub fn read_frame<R: TimedRead>(reader: &mut R, deadline: Option<Instant>) -> Result<Vec<u8>> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    read_full(reader, &mut prefix, deadline)?;
    let declared = u16::from_le_bytes(prefix) as usize;

    let mut body = vec![0u8; declared];
    read_full(reader, &mut body, deadline)?;
    trace!("received {} byte frame: {:02x?}", declared, body);
    Ok(body)
}

/// Writes a complete frame, length prefix included.
pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> Result<()> {
    trace!("sending {} byte frame: {:02x?}", frame.len(), frame);
    writer.write_all(frame)?;
    writer.flush()?;
    Ok(())
}

/// Fills `buf` completely, accumulating short reads.
fn read_full<R: TimedRead>(
    reader: &mut R,
    buf: &mut [u8],
    deadline: Option<Instant>,
) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        reader.limit_next_read(remaining(deadline)?)?;
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(Error::ConnectionClosed {
                    expected: buf.len(),
                    received: filled,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Time left until `deadline`. A socket timeout of zero means "block
/// forever", so an elapsed deadline is reported as `Timeout` instead.
fn remaining(deadline: Option<Instant>) -> Result<Option<Duration>> {
    match deadline {
        None => Ok(None),
        Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(Some(left)),
            _ => Err(Error::Timeout),
        },
    }
}
