use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::time::Duration;

use crate::addr::{Family, SockAddr};
use crate::error::{IoError, errno, is_transient};
use crate::filter::{ByteStream, Progress};
use crate::wait::{self, Direction, Readiness};
use super::connected::{ConnectedSocket, SocketKind, sock_name};
use super::readiness::{Interest, ReadinessHandle};

/// A connected socket driven in non-blocking mode.
///
/// Owns the descriptor and its readiness handle; both are released exactly
/// once, by [`close`](Self::close) or on drop. Every operation after close
/// fails with [`IoError::Closed`].
#[derive(Debug)]
pub struct RawSocketStream {
	fd: Option<OwnedFd>,
	readiness: Option<ReadinessHandle>,
	family: Family,
	kind: SocketKind,
}

impl RawSocketStream {
	/// Takes over `socket`, switches it to non-blocking mode and registers it
	/// for read and close readiness.
	pub fn new(socket: ConnectedSocket) -> std::io::Result<Self> {
		let (fd, family, kind) = socket.into_parts();
		super::raw::set_nonblocking(&fd, true)?;
		let readiness = ReadinessHandle::new(&fd, Interest::READ | Interest::CLOSE)?;

		Ok(Self {
			fd: Some(fd),
			readiness: Some(readiness),
			family,
			kind,
		})
	}

	fn fd(&self) -> std::io::Result<BorrowedFd<'_>> {
		match &self.fd {
			Some(fd) => Ok(fd.as_fd()),
			None => Err(IoError::Closed.into()),
		}
	}

	#[inline]
	pub fn family(&self) -> Family {
		self.family
	}

	#[inline]
	pub fn kind(&self) -> SocketKind {
		self.kind
	}

	/// One `recv(2)`.
	pub fn read(&self, buf: &mut [u8]) -> std::io::Result<Progress> {
		let fd = self.fd()?;
		if buf.is_empty() {
			return Ok(Progress::Bytes(0));
		}

		let n = unsafe {
			libc::recv(
				fd.as_raw_fd(),
				buf.as_mut_ptr() as *mut libc::c_void,
				buf.len(),
				0,
			)
		};

		match n {
			-1 => {
				let e = errno();
				if is_transient(e) {
					Ok(Progress::WouldBlock)
				} else {
					Err(IoError::Read { errno: e }.into())
				}
			}
			0 => Ok(Progress::Eof),
			n => Ok(Progress::Bytes(n as usize)),
		}
	}

	/// One `send(2)`; may be partial.
	///
	/// `MSG_NOSIGNAL` turns a dead peer into `EPIPE` instead of `SIGPIPE`.
	pub fn write(&self, buf: &[u8]) -> std::io::Result<Progress> {
		let fd = self.fd()?;
		if buf.is_empty() {
			return Ok(Progress::Bytes(0));
		}

		let n = unsafe {
			libc::send(
				fd.as_raw_fd(),
				buf.as_ptr() as *const libc::c_void,
				buf.len(),
				libc::MSG_NOSIGNAL,
			)
		};

		if n == -1 {
			let e = errno();
			if is_transient(e) {
				Ok(Progress::WouldBlock)
			} else {
				Err(IoError::Write { errno: e }.into())
			}
		} else {
			Ok(Progress::Bytes(n as usize))
		}
	}

	pub fn wait_readable(&self, timeout: Duration) -> std::io::Result<Readiness> {
		self.wait(Direction::Read, timeout)
	}

	pub fn wait_writable(&self, timeout: Duration) -> std::io::Result<Readiness> {
		self.wait(Direction::Write, timeout)
	}

	/// Blocks up to `timeout`; zero polls once.
	pub fn wait(&self, direction: Direction, timeout: Duration) -> std::io::Result<Readiness> {
		wait::wait_fd(self.fd()?, direction, timeout)
	}

	pub fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
		super::raw::set_nonblocking(&self.fd()?, nonblocking)
	}

	pub fn is_nonblocking(&self) -> std::io::Result<bool> {
		super::raw::is_nonblocking(&self.fd()?)
	}

	/// The readiness handle, `None` once closed.
	pub fn readiness(&self) -> Option<&ReadinessHandle> {
		self.readiness.as_ref()
	}

	pub fn local_addr(&self) -> std::io::Result<SockAddr> {
		sock_name(self.fd()?.as_raw_fd(), false)
	}

	pub fn peer_addr(&self) -> std::io::Result<SockAddr> {
		sock_name(self.fd()?.as_raw_fd(), true)
	}

	/// Remote address as text: the bare IP for internet peers.
	pub fn peer_address(&self) -> std::io::Result<String> {
		let addr = self.peer_addr()?;
		Ok(match addr.ip_string() {
			Some((ip, _)) => ip,
			None => addr.to_string(),
		})
	}

	/// Shuts down both directions and releases the socket and readiness
	/// handle. Further calls do nothing.
	pub fn close(&mut self) {
		self.readiness = None;

		let Some(fd) = self.fd.take() else {
			return;
		};

		let result = unsafe { libc::shutdown(fd.as_raw_fd(), libc::SHUT_RDWR) };
		if result == -1 {
			let e = errno();
			// Peer may already be gone.
			if e != libc::ENOTCONN {
				tracing::debug!("shutdown() failed: errno {}", e);
			}
		}
	}

	#[inline]
	pub fn is_closed(&self) -> bool {
		self.fd.is_none()
	}
}

impl Drop for RawSocketStream {
	fn drop(&mut self) {
		self.close();
	}
}

impl ByteStream for RawSocketStream {
	fn read(&mut self, buf: &mut [u8]) -> std::io::Result<Progress> {
		RawSocketStream::read(self, buf)
	}

	fn write(&mut self, buf: &[u8]) -> std::io::Result<Progress> {
		RawSocketStream::write(self, buf)
	}

	fn wait(&self, direction: Direction, timeout: Duration) -> std::io::Result<Readiness> {
		RawSocketStream::wait(self, direction, timeout)
	}

	fn set_nonblocking(&mut self, nonblocking: bool) -> std::io::Result<()> {
		RawSocketStream::set_nonblocking(self, nonblocking)
	}

	fn readiness_fd(&self) -> Option<BorrowedFd<'_>> {
		self.readiness.as_ref().map(|r| r.as_fd())
	}
}
