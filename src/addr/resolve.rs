//! Host name resolution and candidate selection.
//!
//! Resolution itself is a black box behind [`Resolver`]; this module owns the
//! policies for picking one candidate out of a resolved list.

use std::ffi::{CStr, CString};

use super::{Family, SockAddr};
use crate::config::FamilyPolicy;

/// One resolved address plus what `socket()` needs to reach it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressCandidate {
	pub addr: SockAddr,
	pub family: Family,
	pub socktype: libc::c_int,
	pub protocol: libc::c_int,
}

impl AddressCandidate {
	/// A TCP stream candidate for `addr`.
	pub fn stream(addr: SockAddr) -> Self {
		Self {
			family: addr.family(),
			addr,
			socktype: libc::SOCK_STREAM,
			protocol: 0,
		}
	}
}

/// The ordered result of resolving one host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
	candidates: Vec<AddressCandidate>,
}

impl Resolution {
	pub fn new(candidates: Vec<AddressCandidate>) -> Self {
		Self { candidates }
	}

	pub fn candidates(&self) -> &[AddressCandidate] {
		&self.candidates
	}

	pub fn is_empty(&self) -> bool {
		self.candidates.is_empty()
	}

	pub fn len(&self) -> usize {
		self.candidates.len()
	}

	/// Index chosen for a redundancy race: the first entry, unless it is IPv6
	/// and an IPv4 entry follows somewhere later.
	pub fn race_choice(&self) -> Option<usize> {
		let first = self.candidates.first()?;
		if first.family == Family::Inet6 && self.candidates.len() > 1 {
			if let Some(i) = self.candidates[1..].iter().position(|c| c.family == Family::Inet) {
				return Some(i + 1);
			}
		}
		Some(0)
	}

	/// Index chosen under `policy`, scanning from `start`.
	///
	/// "Prefer IPv6" is soft and falls back to the first entry. A forced
	/// family is hard: `None` when no entry of that family remains.
	pub fn select(&self, start: usize, policy: FamilyPolicy) -> Option<usize> {
		let rest = self.candidates.get(start..)?;
		if rest.is_empty() {
			return None;
		}

		let mut index = 0;
		if policy.prefer_ipv6 {
			index = rest.iter().position(|c| c.family == Family::Inet6).unwrap_or(0);
		}

		if let Some(forced) = policy.force {
			let family = forced.family();
			index += rest[index..].iter().position(|c| c.family == family)?;
		}

		Some(start + index)
	}
}

/// Turns a host name and optional port into candidate addresses.
pub trait Resolver {
	/// Resolves `host`. An empty result is reported as an error.
	fn resolve(&self, host: &str, port: Option<u16>) -> std::io::Result<Resolution>;
}

impl<R: Resolver + ?Sized> Resolver for &R {
	fn resolve(&self, host: &str, port: Option<u16>) -> std::io::Result<Resolution> {
		(**self).resolve(host, port)
	}
}

/// `getaddrinfo(3)` with `AF_UNSPEC` / `SOCK_STREAM` hints.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver {
	flags: libc::c_int,
}

impl SystemResolver {
	pub fn new() -> Self {
		Self::default()
	}

	/// Extra `ai_flags` passed as hints (e.g. `AI_NUMERICHOST`).
	pub fn with_flags(flags: libc::c_int) -> Self {
		Self { flags }
	}
}

/// Owns a getaddrinfo list; freed exactly once on drop.
struct AddrInfoList(*mut libc::addrinfo);

impl Drop for AddrInfoList {
	fn drop(&mut self) {
		if !self.0.is_null() {
			unsafe { libc::freeaddrinfo(self.0) };
		}
	}
}

impl Resolver for SystemResolver {
	fn resolve(&self, host: &str, port: Option<u16>) -> std::io::Result<Resolution> {
		let node = CString::new(host).map_err(|_| {
			std::io::Error::new(std::io::ErrorKind::InvalidInput, "host name contains NUL")
		})?;
		let service = port.map(|p| CString::new(p.to_string())).transpose().map_err(|_| {
			std::io::Error::new(std::io::ErrorKind::InvalidInput, "invalid port")
		})?;

		let mut hints: libc::addrinfo = unsafe { std::mem::zeroed() };
		hints.ai_family = libc::AF_UNSPEC;
		hints.ai_socktype = libc::SOCK_STREAM;
		hints.ai_flags = self.flags;

		let mut head: *mut libc::addrinfo = std::ptr::null_mut();
		let status = unsafe {
			libc::getaddrinfo(
				node.as_ptr(),
				service.as_ref().map_or(std::ptr::null(), |s| s.as_ptr()),
				&hints,
				&mut head,
			)
		};
		let list = AddrInfoList(head);

		if status != 0 {
			let reason = unsafe { CStr::from_ptr(libc::gai_strerror(status)) };
			return Err(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("getaddrinfo({}): {}", host, reason.to_string_lossy()),
			));
		}

		let mut candidates = Vec::new();
		let mut cursor = list.0;
		while !cursor.is_null() {
			let info = unsafe { &*cursor };
			let addr = unsafe { SockAddr::from_sockaddr(info.ai_addr, info.ai_addrlen) };
			if let Some(addr) = addr {
				candidates.push(AddressCandidate {
					family: addr.family(),
					addr,
					socktype: info.ai_socktype,
					protocol: info.ai_protocol,
				});
			}
			cursor = info.ai_next;
		}

		if candidates.is_empty() {
			return Err(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("getaddrinfo({}): no usable address", host),
			));
		}
		Ok(Resolution::new(candidates))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::ForcedFamily;

	fn candidate(s: &str) -> AddressCandidate {
		AddressCandidate::stream(s.parse::<std::net::SocketAddr>().unwrap().into())
	}

	fn mixed() -> Resolution {
		Resolution::new(vec![
			candidate("[2001:db8::1]:3389"),
			candidate("192.0.2.1:3389"),
			candidate("[2001:db8::2]:3389"),
		])
	}

	#[test]
	fn default_policy_takes_first() {
		assert_eq!(mixed().select(0, FamilyPolicy::default()), Some(0));
	}

	#[test]
	fn prefer_ipv6_picks_first_ipv6() {
		let policy = FamilyPolicy { prefer_ipv6: true, force: None };
		assert_eq!(mixed().select(0, policy), Some(0));

		let v4_first = Resolution::new(vec![candidate("192.0.2.1:1"), candidate("[::1]:1")]);
		assert_eq!(v4_first.select(0, policy), Some(1));
	}

	#[test]
	fn prefer_ipv6_falls_back_to_first_entry() {
		let only_v4 = Resolution::new(vec![candidate("192.0.2.1:1"), candidate("192.0.2.2:1")]);
		let policy = FamilyPolicy { prefer_ipv6: true, force: None };
		assert_eq!(only_v4.select(0, policy), Some(0));
	}

	#[test]
	fn force_ipv4_skips_ipv6_entries() {
		let policy = FamilyPolicy { prefer_ipv6: false, force: Some(ForcedFamily::Ipv4) };
		assert_eq!(mixed().select(0, policy), Some(1));
	}

	#[test]
	fn force_ipv6_without_ipv6_is_hard_failure() {
		let only_v4 = Resolution::new(vec![candidate("192.0.2.1:1"), candidate("192.0.2.2:1")]);
		let policy = FamilyPolicy { prefer_ipv6: false, force: Some(ForcedFamily::Ipv6) };
		assert_eq!(only_v4.select(0, policy), None);
	}

	#[test]
	fn select_from_offset_continues_scan() {
		let policy = FamilyPolicy { prefer_ipv6: false, force: Some(ForcedFamily::Ipv6) };
		assert_eq!(mixed().select(1, policy), Some(2));
		assert_eq!(mixed().select(3, policy), None);
		assert_eq!(mixed().select(7, FamilyPolicy::default()), None);
	}

	#[test]
	fn race_prefers_ipv4_after_leading_ipv6() {
		assert_eq!(mixed().race_choice(), Some(1));

		let only_v6 = Resolution::new(vec![candidate("[::1]:1"), candidate("[::2]:1")]);
		assert_eq!(only_v6.race_choice(), Some(0));

		let single_v6 = Resolution::new(vec![candidate("[::1]:1")]);
		assert_eq!(single_v6.race_choice(), Some(0));

		assert_eq!(Resolution::default().race_choice(), None);
	}

	#[test]
	fn system_resolver_handles_numeric_hosts() {
		let resolution = SystemResolver::with_flags(libc::AI_NUMERICHOST)
			.resolve("127.0.0.1", Some(3389))
			.unwrap();
		assert_eq!(resolution.candidates()[0].addr, candidate("127.0.0.1:3389").addr);
	}

	#[test]
	fn system_resolver_reports_failure() {
		let err = SystemResolver::with_flags(libc::AI_NUMERICHOST)
			.resolve("not an address", None)
			.unwrap_err();
		assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
	}
}
