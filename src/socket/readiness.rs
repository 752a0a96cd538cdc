use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};
use std::time::Duration;

use crate::error::{SocketError, errno};
use crate::wait;

bitflags::bitflags! {
	/// Socket conditions a [`ReadinessHandle`] reports.
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct Interest: u32 {
		/// Readable, or a pending connection on a listener.
		const READ = libc::EPOLLIN as u32;
		/// Writable, which is also how a finished connect shows up.
		const WRITE = libc::EPOLLOUT as u32;
		/// Peer closed its side.
		const CLOSE = libc::EPOLLRDHUP as u32;
	}
}

/// Waitable object signaled while its socket matches the registered interest.
///
/// Backed by an epoll instance holding one registration. The epoll
/// descriptor is itself pollable, so it can be handed to a larger wait loop.
/// Level-triggered: it stays signaled while the condition holds and needs no
/// reset. Dropping it closes the epoll descriptor and nothing else.
#[derive(Debug)]
pub struct ReadinessHandle {
	epfd: OwnedFd,
	target: RawFd,
}

impl ReadinessHandle {
	/// Creates a handle and registers `socket` for `interest`.
	pub fn new<S: AsFd>(socket: &S, interest: Interest) -> std::io::Result<Self> {
		let epfd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
		if epfd == -1 {
			return Err(SocketError::Readiness { errno: errno(), call: "epoll_create1" }.into());
		}
		let handle = Self {
			epfd: unsafe { OwnedFd::from_raw_fd(epfd) },
			target: socket.as_fd().as_raw_fd(),
		};
		handle.ctl(libc::EPOLL_CTL_ADD, interest)?;
		Ok(handle)
	}

	/// Replaces the registered interest.
	pub fn modify(&self, interest: Interest) -> std::io::Result<()> {
		self.ctl(libc::EPOLL_CTL_MOD, interest)
	}

	/// Removes the socket; the handle then never signals again.
	pub fn deregister(&self) -> std::io::Result<()> {
		let result = unsafe {
			libc::epoll_ctl(self.epfd.as_raw_fd(), libc::EPOLL_CTL_DEL, self.target, std::ptr::null_mut())
		};
		if result == -1 {
			return Err(SocketError::Readiness { errno: errno(), call: "epoll_ctl" }.into());
		}
		Ok(())
	}

	fn ctl(&self, op: libc::c_int, interest: Interest) -> std::io::Result<()> {
		let mut event = libc::epoll_event {
			events: interest.bits(),
			u64: self.target as u64,
		};
		let result = unsafe { libc::epoll_ctl(self.epfd.as_raw_fd(), op, self.target, &mut event) };
		if result == -1 {
			return Err(SocketError::Readiness { errno: errno(), call: "epoll_ctl" }.into());
		}
		Ok(())
	}

	/// Non-blocking check.
	pub fn is_signaled(&self) -> std::io::Result<bool> {
		self.wait(Duration::ZERO)
	}

	/// Blocks up to `timeout` for the handle to become signaled.
	pub fn wait(&self, timeout: Duration) -> std::io::Result<bool> {
		Ok(wait::wait_any(&[self.epfd.as_fd()], Some(timeout))?.is_some())
	}
}

impl AsRawFd for ReadinessHandle {
	fn as_raw_fd(&self) -> RawFd {
		self.epfd.as_raw_fd()
	}
}

impl AsFd for ReadinessHandle {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.epfd.as_fd()
	}
}
