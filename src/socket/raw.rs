use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use crate::addr::resolve::AddressCandidate;
use crate::addr::{Family, SockAddr, ToSockAddr};
use crate::error::{SocketError, errno, is_transient};
use super::connected::{ConnectedSocket, SocketKind};
use super::pending::PendingConnect;

/// A socket that has been created but not yet connected.
///
/// This is the starting point for every outbound connection.
/// Use `.connect()` for a blocking connect or `.connect_nonblocking()` to
/// drive the handshake yourself. Dropping it closes the descriptor.
#[derive(Debug)]
pub struct Socket {
	fd: OwnedFd,
	family: Family,
}

impl Socket {
	/// Creates a new socket.
	///
	/// The socket is created with `SOCK_CLOEXEC` (close on exec).
	pub fn new(family: Family, socktype: libc::c_int, protocol: libc::c_int) -> std::io::Result<Self> {
		let fd = unsafe { libc::socket(family.raw(), socktype | libc::SOCK_CLOEXEC, protocol) };
		if fd == -1 {
			return Err(SocketError::Create { errno: errno() }.into());
		}
		let fd = unsafe { OwnedFd::from_raw_fd(fd) };

		Ok(Self { fd, family })
	}

	/// Creates a stream socket of the given family.
	pub fn stream(family: Family) -> std::io::Result<Self> {
		Self::new(family, libc::SOCK_STREAM, 0)
	}

	/// Creates the socket a resolved candidate asks for.
	pub fn for_candidate(candidate: &AddressCandidate) -> std::io::Result<Self> {
		Self::new(candidate.family, candidate.socktype, candidate.protocol)
	}

	#[inline]
	pub fn family(&self) -> Family {
		self.family
	}

	/// Sets the socket to non-blocking mode.
	pub fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
		set_nonblocking(self, nonblocking)
	}

	/// Connects to a remote address, blocking until the handshake ends.
	///
	/// Consumes self; on failure the socket is closed.
	pub fn connect(self, addr: &SockAddr, kind: SocketKind) -> std::io::Result<ConnectedSocket> {
		let result = addr.with_raw(|ptr, len| unsafe {
			libc::connect(self.fd.as_raw_fd(), ptr, len)
		});

		match result {
			Some(-1) => Err(SocketError::Connect {
				errno: errno(),
				addr: addr.to_string(),
			}.into()),
			Some(_) => Ok(ConnectedSocket::from_fd(self.fd, self.family, kind)),
			None => Err(SocketError::InvalidAddress {
				reason: "address too long",
			}.into()),
		}
	}

	/// Starts a non-blocking connection.
	///
	/// Sets the socket to non-blocking, initiates connect, returns immediately.
	/// An in-progress or would-block result is expected and not an error.
	pub fn connect_nonblocking(self, addr: &SockAddr) -> std::io::Result<PendingConnect> {
		self.set_nonblocking(true)?;

		let result = addr.with_raw(|ptr, len| unsafe {
			libc::connect(self.fd.as_raw_fd(), ptr, len)
		});

		match result {
			Some(-1) => {
				let e = errno();
				if is_transient(e) {
					Ok(PendingConnect::from_fd(self.fd, self.family))
				} else {
					Err(SocketError::Connect {
						errno: e,
						addr: addr.to_string(),
					}.into())
				}
			}
			// Immediate success, possible on loopback.
			Some(_) => Ok(PendingConnect::from_fd(self.fd, self.family)),
			None => Err(SocketError::InvalidAddress {
				reason: "address too long",
			}.into()),
		}
	}
}

/// Toggles `O_NONBLOCK` on any descriptor.
pub(crate) fn set_nonblocking<S: AsRawFd>(socket: &S, nonblocking: bool) -> std::io::Result<()> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFL) };

	if flags == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" }.into());
	}

	let new_flags = if nonblocking {
		flags | libc::O_NONBLOCK
	} else {
		flags & !libc::O_NONBLOCK
	};

	if new_flags == flags {
		return Ok(());
	}

	let result = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_SETFL, new_flags) };

	if result == -1 {
		return Err(SocketError::SetOption { errno: errno(), option: "O_NONBLOCK" }.into());
	}

	Ok(())
}

/// Reads `O_NONBLOCK` from any descriptor.
pub(crate) fn is_nonblocking<S: AsRawFd>(socket: &S) -> std::io::Result<bool> {
	let flags = unsafe { libc::fcntl(socket.as_raw_fd(), libc::F_GETFL) };
	if flags == -1 {
		return Err(SocketError::GetOption { errno: errno(), option: "F_GETFL" }.into());
	}
	Ok(flags & libc::O_NONBLOCK != 0)
}

impl AsRawFd for Socket {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl AsFd for Socket {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.fd.as_fd()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::net::TcpListener;

	fn local(listener: &TcpListener) -> SockAddr {
		listener.local_addr().unwrap().into()
	}

	#[test]
	fn nonblocking_flag_toggles() {
		let socket = Socket::stream(Family::Inet).unwrap();
		assert!(!is_nonblocking(&socket).unwrap());
		socket.set_nonblocking(true).unwrap();
		assert!(is_nonblocking(&socket).unwrap());
		socket.set_nonblocking(false).unwrap();
		assert!(!is_nonblocking(&socket).unwrap());
	}

	#[test]
	fn blocking_connect_to_listener() {
		let listener = TcpListener::bind("127.0.0.1:0").unwrap();
		let socket = Socket::stream(Family::Inet).unwrap();
		let connected = socket.connect(&local(&listener), SocketKind::Tcp).unwrap();
		assert_eq!(connected.family(), Family::Inet);
		listener.accept().unwrap();
	}

	#[test]
	fn refused_connect_reports_errno() {
		let addr = {
			let listener = TcpListener::bind("127.0.0.1:0").unwrap();
			local(&listener)
		};
		let err = Socket::stream(Family::Inet)
			.unwrap()
			.connect(&addr, SocketKind::Tcp)
			.unwrap_err();
		assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
	}
}
