//! Address families and socket addresses.
//!
//! Four families reach the wire:
//! - `Inet` / `Inet6`: resolved host names
//! - `Unix`: a filesystem path endpoint
//! - `Vsock`: host/guest virtual machine sockets

mod inet;
mod unix;
mod vsock;
pub mod resolve;

use std::fmt;

pub use self::unix::UnixAddr;
pub use self::vsock::VsockAddr;

/// Address family of a socket or resolved candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
	Inet,
	Inet6,
	Unix,
	Vsock,
}

impl Family {
	/// Returns the libc constant for this address family.
	#[inline]
	pub fn raw(self) -> libc::c_int {
		match self {
			Family::Inet => libc::AF_INET,
			Family::Inet6 => libc::AF_INET6,
			Family::Unix => libc::AF_UNIX,
			Family::Vsock => libc::AF_VSOCK,
		}
	}

	pub fn from_raw(raw: libc::c_int) -> Option<Self> {
		match raw {
			libc::AF_INET => Some(Family::Inet),
			libc::AF_INET6 => Some(Family::Inet6),
			libc::AF_UNIX => Some(Family::Unix),
			libc::AF_VSOCK => Some(Family::Vsock),
			_ => None,
		}
	}

	pub fn name(self) -> &'static str {
		match self {
			Family::Inet => "IPv4",
			Family::Inet6 => "IPv6",
			Family::Unix => "Unix",
			Family::Vsock => "VSOCK",
		}
	}
}

/// A socket address of any supported family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SockAddr {
	Inet(std::net::SocketAddrV4),
	Inet6(std::net::SocketAddrV6),
	Unix(UnixAddr),
	Vsock(VsockAddr),
}

impl SockAddr {
	pub fn family(&self) -> Family {
		match self {
			SockAddr::Inet(_) => Family::Inet,
			SockAddr::Inet6(_) => Family::Inet6,
			SockAddr::Unix(_) => Family::Unix,
			SockAddr::Vsock(_) => Family::Vsock,
		}
	}

	/// Textual IP of this address, and whether it is IPv6.
	///
	/// Unix endpoints are local and report the loopback address. VSOCK has no
	/// IP representation.
	pub fn ip_string(&self) -> Option<(String, bool)> {
		match self {
			SockAddr::Inet(a) => Some((a.ip().to_string(), false)),
			SockAddr::Inet6(a) => Some((a.ip().to_string(), true)),
			SockAddr::Unix(_) => Some(("127.0.0.1".to_string(), false)),
			SockAddr::Vsock(_) => None,
		}
	}
}

impl From<std::net::SocketAddr> for SockAddr {
	fn from(addr: std::net::SocketAddr) -> Self {
		match addr {
			std::net::SocketAddr::V4(a) => SockAddr::Inet(a),
			std::net::SocketAddr::V6(a) => SockAddr::Inet6(a),
		}
	}
}

impl fmt::Display for SockAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SockAddr::Inet(a) => write!(f, "{}", a),
			SockAddr::Inet6(a) => write!(f, "{}", a),
			SockAddr::Unix(a) => write!(f, "unix:{}", a),
			SockAddr::Vsock(a) => write!(f, "{}", a),
		}
	}
}

/// Trait for address types that can be converted to raw sockaddr for syscalls.
pub trait ToSockAddr {
	/// Calls the provided closure with a pointer to the raw sockaddr and its size.
	/// Returns None if the address is invalid (e.g., path too long for Unix).
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R;
}

impl ToSockAddr for SockAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		match self {
			SockAddr::Inet(a) => a.with_raw(f),
			SockAddr::Inet6(a) => a.with_raw(f),
			SockAddr::Unix(a) => a.with_raw(f),
			SockAddr::Vsock(a) => a.with_raw(f),
		}
	}
}

impl SockAddr {
	/// Creates an address from raw sockaddr storage filled by the kernel.
	///
	/// # Safety
	/// `addr` must point to at least `len` initialized bytes.
	pub(crate) unsafe fn from_sockaddr(addr: *const libc::sockaddr, len: libc::socklen_t) -> Option<Self> {
		if (len as usize) < std::mem::size_of::<libc::sa_family_t>() {
			return None;
		}
		let family = unsafe { (*addr).sa_family } as libc::c_int;
		match Family::from_raw(family)? {
			Family::Inet => {
				if (len as usize) < std::mem::size_of::<libc::sockaddr_in>() {
					return None;
				}
				let raw = unsafe { &*(addr as *const libc::sockaddr_in) };
				Some(SockAddr::Inet(inet::v4_from_raw(raw)))
			}
			Family::Inet6 => {
				if (len as usize) < std::mem::size_of::<libc::sockaddr_in6>() {
					return None;
				}
				let raw = unsafe { &*(addr as *const libc::sockaddr_in6) };
				Some(SockAddr::Inet6(inet::v6_from_raw(raw)))
			}
			Family::Unix => {
				let raw = unsafe { &*(addr as *const libc::sockaddr_un) };
				Some(SockAddr::Unix(UnixAddr::from_raw(raw, len)))
			}
			Family::Vsock => {
				if (len as usize) < std::mem::size_of::<vsock::RawSockaddrVm>() {
					return None;
				}
				let raw = unsafe { &*(addr as *const vsock::RawSockaddrVm) };
				Some(SockAddr::Vsock(VsockAddr::from_raw(raw)))
			}
		}
	}
}
