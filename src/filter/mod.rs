//! Layered byte streams.
//!
//! A layer holds the next stream by value (or by `&mut`/`Box`) and implements
//! [`ByteStream`] itself, so layers compose without callback tables.

mod buffered;
mod queue;

use std::os::fd::BorrowedFd;
use std::time::Duration;

use crate::wait::{Direction, Readiness};

pub use self::buffered::BufferedWriteStream;
pub use self::queue::WriteQueue;

/// Outcome of one read or write attempt that did not fail.
///
/// Fatal failures are the `Err` side of the surrounding `io::Result`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// This many bytes moved. Zero only for an empty buffer.
    Bytes(usize),
    /// Nothing moved; retry once the stream is ready again.
    WouldBlock,
    /// Peer closed its sending side.
    Eof,
}

impl Progress {
    /// Bytes moved, zero for anything else.
    #[inline]
    pub fn bytes(self) -> usize {
        match self {
            Progress::Bytes(n) => n,
            Progress::WouldBlock | Progress::Eof => 0,
        }
    }

    #[inline]
    pub fn is_would_block(self) -> bool {
        self == Progress::WouldBlock
    }
}

/// The read/write/retry contract every stream layer honors.
pub trait ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<Progress>;

    fn write(&mut self, buf: &[u8]) -> std::io::Result<Progress>;

    /// Pushes out anything the layer holds back. Never blocks.
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }

    /// Bytes accepted by this layer but not yet handed further down.
    fn pending_write(&self) -> usize {
        0
    }

    fn is_read_blocked(&self) -> bool {
        false
    }

    fn is_write_blocked(&self) -> bool {
        false
    }

    /// Blocks up to `timeout` until the stream is ready in `direction`.
    fn wait(&self, direction: Direction, timeout: Duration) -> std::io::Result<Readiness>;

    fn set_nonblocking(&mut self, _nonblocking: bool) -> std::io::Result<()> {
        Ok(())
    }

    /// Descriptor that becomes readable when the stream has something to report.
    fn readiness_fd(&self) -> Option<BorrowedFd<'_>> {
        None
    }
}

impl<S: ByteStream + ?Sized> ByteStream for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<Progress> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<Progress> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        (**self).flush()
    }

    fn pending_write(&self) -> usize {
        (**self).pending_write()
    }

    fn is_read_blocked(&self) -> bool {
        (**self).is_read_blocked()
    }

    fn is_write_blocked(&self) -> bool {
        (**self).is_write_blocked()
    }

    fn wait(&self, direction: Direction, timeout: Duration) -> std::io::Result<Readiness> {
        (**self).wait(direction, timeout)
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> std::io::Result<()> {
        (**self).set_nonblocking(nonblocking)
    }

    fn readiness_fd(&self) -> Option<BorrowedFd<'_>> {
        (**self).readiness_fd()
    }
}

impl<S: ByteStream + ?Sized> ByteStream for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<Progress> {
        (**self).read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<Progress> {
        (**self).write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        (**self).flush()
    }

    fn pending_write(&self) -> usize {
        (**self).pending_write()
    }

    fn is_read_blocked(&self) -> bool {
        (**self).is_read_blocked()
    }

    fn is_write_blocked(&self) -> bool {
        (**self).is_write_blocked()
    }

    fn wait(&self, direction: Direction, timeout: Duration) -> std::io::Result<Readiness> {
        (**self).wait(direction, timeout)
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> std::io::Result<()> {
        (**self).set_nonblocking(nonblocking)
    }

    fn readiness_fd(&self) -> Option<BorrowedFd<'_>> {
        (**self).readiness_fd()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_counts_only_moved_bytes() {
        assert_eq!(Progress::Bytes(7).bytes(), 7);
        assert_eq!(Progress::WouldBlock.bytes(), 0);
        assert_eq!(Progress::Eof.bytes(), 0);
        assert!(Progress::WouldBlock.is_would_block());
        assert!(!Progress::Bytes(0).is_would_block());
    }
}
