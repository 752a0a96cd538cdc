use std::os::fd::{AsFd, AsRawFd, BorrowedFd, IntoRawFd, OwnedFd, RawFd};

use crate::addr::{Family, SockAddr};
use crate::error::{SocketError, errno};

/// How a connected socket came to be; decides which post-connect options apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
	Tcp,
	Unix,
	Vsock,
	/// Descriptor handed in by the embedding application.
	External,
}

impl SocketKind {
	/// Kind of a socket this crate connected itself.
	pub fn for_family(family: Family) -> Self {
		match family {
			Family::Unix => SocketKind::Unix,
			Family::Vsock => SocketKind::Vsock,
			Family::Inet | Family::Inet6 => SocketKind::Tcp,
		}
	}

	/// Whether TCP-level options (`TCP_NODELAY`, keep-alive) are attempted.
	#[inline]
	pub fn takes_tcp_options(self) -> bool {
		!matches!(self, SocketKind::Unix | SocketKind::External)
	}
}

/// An established byte-stream socket, owned exactly once.
///
/// Produced by connection establishment and consumed by a stream or
/// transport. Dropping it closes the descriptor.
#[derive(Debug)]
pub struct ConnectedSocket {
	fd: OwnedFd,
	family: Family,
	kind: SocketKind,
}

impl ConnectedSocket {
	pub(crate) fn from_fd(fd: OwnedFd, family: Family, kind: SocketKind) -> Self {
		Self { fd, family, kind }
	}

	/// Adopts a descriptor the caller already connected.
	///
	/// The family is read back from the kernel, which also rejects
	/// descriptors that are not sockets.
	pub fn adopt(fd: OwnedFd) -> std::io::Result<Self> {
		let family = sock_name(fd.as_raw_fd(), false)?.family();
		Ok(Self { fd, family, kind: SocketKind::External })
	}

	/// Like [`adopt`](Self::adopt), but a rejected descriptor is left open.
	///
	/// # Safety
	/// On success the returned value owns `fd` and will close it; the caller
	/// must not use or close it afterwards.
	pub unsafe fn adopt_raw(fd: RawFd) -> std::io::Result<Self> {
		if fd < 0 {
			return Err(SocketError::InvalidAddress { reason: "negative descriptor" }.into());
		}
		let family = sock_name(fd, false)?.family();
		let fd = unsafe { <OwnedFd as std::os::fd::FromRawFd>::from_raw_fd(fd) };
		Ok(Self { fd, family, kind: SocketKind::External })
	}

	#[inline]
	pub fn family(&self) -> Family {
		self.family
	}

	#[inline]
	pub fn kind(&self) -> SocketKind {
		self.kind
	}

	pub fn set_nonblocking(&self, nonblocking: bool) -> std::io::Result<()> {
		super::raw::set_nonblocking(self, nonblocking)
	}

	/// Returns the local address of this connection.
	pub fn local_addr(&self) -> std::io::Result<SockAddr> {
		sock_name(self.as_raw_fd(), false)
	}

	/// Returns the remote address of this connection.
	pub fn peer_addr(&self) -> std::io::Result<SockAddr> {
		sock_name(self.as_raw_fd(), true)
	}

	/// Gives the descriptor back without closing it.
	pub fn release(self) -> RawFd {
		self.fd.into_raw_fd()
	}

	pub(crate) fn into_parts(self) -> (OwnedFd, Family, SocketKind) {
		(self.fd, self.family, self.kind)
	}
}

/// getsockname(2) / getpeername(2) into a [`SockAddr`].
pub(crate) fn sock_name(fd: RawFd, peer: bool) -> std::io::Result<SockAddr> {
	let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
	let mut len = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
	let ptr = &mut storage as *mut _ as *mut libc::sockaddr;

	let result = unsafe {
		if peer {
			libc::getpeername(fd, ptr, &mut len)
		} else {
			libc::getsockname(fd, ptr, &mut len)
		}
	};

	if result == -1 {
		let option = if peer { "SO_PEERNAME" } else { "SO_SOCKNAME" };
		return Err(SocketError::GetOption { errno: errno(), option }.into());
	}

	unsafe {
		SockAddr::from_sockaddr(ptr, len)
			.ok_or_else(|| SocketError::InvalidAddress { reason: "unsupported address family" }.into())
	}
}

impl AsRawFd for ConnectedSocket {
	fn as_raw_fd(&self) -> RawFd {
		self.fd.as_raw_fd()
	}
}

impl AsFd for ConnectedSocket {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.fd.as_fd()
	}
}
