use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};

use crate::addr::Family;
use crate::error::{SocketError, errno};
use super::connected::{ConnectedSocket, SocketKind};

/// A non-blocking connect that has been issued but not confirmed.
#[derive(Debug)]
pub struct PendingConnect {
	fd: OwnedFd,
	family: Family,
}

impl PendingConnect {
	pub(crate) fn from_fd(fd: OwnedFd, family: Family) -> Self {
		Self { fd, family }
	}

	/// Reads and clears the socket error status.
	///
	/// Returns `None` if no error (connect succeeded).
	/// Returns `Some(error)` if connect failed.
	///
	/// Call this after the socket signals writable.
	/// Reading clears the error, so call it once.
	pub fn take_error(&self) -> std::io::Result<Option<std::io::Error>> {
		let mut error: libc::c_int = 0;
		let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;

		let result = unsafe {
			libc::getsockopt(
				self.fd.as_raw_fd(),
				libc::SOL_SOCKET,
				libc::SO_ERROR,
				&mut error as *mut _ as *mut libc::c_void,
				&mut len,
			)
		};

		if result == -1 {
			return Err(SocketError::GetOption { errno: errno(), option: "SO_ERROR" }.into());
		}

		if error == 0 {
			Ok(None)
		} else {
			Ok(Some(std::io::Error::from_raw_os_error(error)))
		}
	}

	/// Zero-length non-blocking peek.
	///
	/// Tells "connected" apart from "connected then immediately reset":
	/// only `ECONNRESET` is an error here, anything else (including
	/// would-block) means the connection stands.
	pub fn probe_reset(&self) -> std::io::Result<()> {
		let n = unsafe {
			libc::recv(
				self.fd.as_raw_fd(),
				std::ptr::null_mut(),
				0,
				libc::MSG_PEEK | libc::MSG_DONTWAIT,
			)
		};
		if n == -1 {
			let e = errno();
			if e == libc::ECONNRESET {
				return Err(std::io::Error::from_raw_os_error(e));
			}
		}
		Ok(())
	}

	/// Completes the connection after verifying no error.
	///
	/// Call `take_error()` first. If it returned `None`, call this.
	/// Consumes self, returns the connected socket.
	pub fn finish(self, kind: SocketKind) -> ConnectedSocket {
		ConnectedSocket::from_fd(self.fd, self.family, kind)
	}
}

impl AsRawFd for PendingConnect {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl AsFd for PendingConnect {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.fd.as_fd()
	}
}
