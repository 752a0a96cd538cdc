//! The transport abstraction everything above the socket talks to.

use std::os::fd::{AsFd, BorrowedFd};
use std::time::Duration;

use crate::filter::Progress;
use crate::socket::{ConnectedSocket, RawSocketStream};
use crate::wait::{Direction, Readiness};

/// Capability set of one connected transport.
///
/// Object safe; callers usually hold a `Box<dyn TransportLayer>`.
pub trait TransportLayer {
    /// One non-blocking read. An empty buffer reads nothing.
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<Progress>;

    /// One non-blocking write, possibly partial.
    fn write(&mut self, buf: &[u8]) -> std::io::Result<Progress>;

    /// Releases the socket and readiness handle. Idempotent.
    fn close(&mut self);

    /// Blocks up to `timeout` until the transport is ready in `direction`.
    fn wait(&self, direction: Direction, timeout: Duration) -> std::io::Result<Readiness>;

    /// Descriptor signaled on incoming data or peer close, for an outer wait loop.
    fn readiness_handle(&self) -> Option<BorrowedFd<'_>>;
}

/// Transport over a plain connected socket (TCP, Unix-domain or VSOCK).
#[derive(Debug)]
pub struct TcpLayer {
    stream: RawSocketStream,
}

impl TcpLayer {
    /// Wraps `socket`; it is switched to non-blocking mode and registered for
    /// read and close readiness.
    pub fn from_socket(socket: ConnectedSocket) -> std::io::Result<Self> {
        Ok(Self { stream: RawSocketStream::new(socket)? })
    }

    pub fn stream(&self) -> &RawSocketStream {
        &self.stream
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }
}

impl TransportLayer for TcpLayer {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<Progress> {
        self.stream.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<Progress> {
        self.stream.write(buf)
    }

    fn close(&mut self) {
        self.stream.close();
    }

    fn wait(&self, direction: Direction, timeout: Duration) -> std::io::Result<Readiness> {
        self.stream.wait(direction, timeout)
    }

    fn readiness_handle(&self) -> Option<BorrowedFd<'_>> {
        self.stream.readiness().map(|r| r.as_fd())
    }
}
