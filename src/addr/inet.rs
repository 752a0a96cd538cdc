use std::net::{Ipv4Addr, Ipv6Addr, SocketAddrV4, SocketAddrV6};

use super::ToSockAddr;

/// Converts to the raw sockaddr_in for syscalls.
pub(crate) fn v4_to_raw(addr: &SocketAddrV4) -> libc::sockaddr_in {
	libc::sockaddr_in {
		sin_family: libc::AF_INET as libc::sa_family_t,
		sin_port: addr.port().to_be(),
		sin_addr: libc::in_addr {
			s_addr: u32::from_ne_bytes(addr.ip().octets()),
		},
		sin_zero: [0; 8],
	}
}

/// Creates from raw sockaddr_in.
pub(crate) fn v4_from_raw(raw: &libc::sockaddr_in) -> SocketAddrV4 {
	SocketAddrV4::new(
		Ipv4Addr::from(raw.sin_addr.s_addr.to_ne_bytes()),
		u16::from_be(raw.sin_port),
	)
}

/// Converts to the raw sockaddr_in6 for syscalls.
pub(crate) fn v6_to_raw(addr: &SocketAddrV6) -> libc::sockaddr_in6 {
	let mut raw: libc::sockaddr_in6 = unsafe { std::mem::zeroed() };
	raw.sin6_family = libc::AF_INET6 as libc::sa_family_t;
	raw.sin6_port = addr.port().to_be();
	raw.sin6_flowinfo = addr.flowinfo();
	raw.sin6_addr = libc::in6_addr {
		s6_addr: addr.ip().octets(),
	};
	raw.sin6_scope_id = addr.scope_id();
	raw
}

/// Creates from raw sockaddr_in6.
pub(crate) fn v6_from_raw(raw: &libc::sockaddr_in6) -> SocketAddrV6 {
	SocketAddrV6::new(
		Ipv6Addr::from(raw.sin6_addr.s6_addr),
		u16::from_be(raw.sin6_port),
		raw.sin6_flowinfo,
		raw.sin6_scope_id,
	)
}

impl ToSockAddr for SocketAddrV4 {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = v4_to_raw(self); // sockaddr_in lives on THIS stack frame
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}

impl ToSockAddr for SocketAddrV6 {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = v6_to_raw(self);
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_in6>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn v4_port_and_ip_are_network_order() {
		let raw = v4_to_raw(&SocketAddrV4::new(Ipv4Addr::new(127, 0, 0, 1), 3389));
		assert_eq!(raw.sin_port, 3389u16.to_be());
		assert_eq!(raw.sin_addr.s_addr.to_ne_bytes(), [127, 0, 0, 1]);
	}

	#[test]
	fn v6_keeps_scope() {
		let addr = SocketAddrV6::new("fe80::1".parse().unwrap(), 22, 0, 4);
		assert_eq!(v6_from_raw(&v6_to_raw(&addr)), addr);
	}
}
