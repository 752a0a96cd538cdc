use std::fmt;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use super::ToSockAddr;

/// Unix domain socket address (filesystem path).
///
/// Only works on the same machine. An unnamed client-side socket has an
/// empty path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnixAddr {
	path: Vec<u8>,
}

impl UnixAddr {
	/// Creates a new Unix address from raw path bytes.
	pub fn new<P: AsRef<[u8]>>(path: P) -> Self {
		Self {
			path: path.as_ref().to_vec(),
		}
	}

	pub fn from_path(path: &Path) -> Self {
		Self::new(path.as_os_str().as_bytes())
	}

	/// Returns the path bytes.
	pub fn path(&self) -> &[u8] {
		&self.path
	}

	/// Converts to the raw sockaddr_un for syscalls.
	///
	/// None if the path does not fit (one byte is reserved for the terminator).
	pub(crate) fn to_raw(&self) -> Option<libc::sockaddr_un> {
		let mut addr: libc::sockaddr_un = unsafe { std::mem::zeroed() };
		addr.sun_family = libc::AF_UNIX as libc::sa_family_t;

		if self.path.is_empty() || self.path.len() >= addr.sun_path.len() {
			return None;
		}
		for (i, &byte) in self.path.iter().enumerate() {
			addr.sun_path[i] = byte as libc::c_char;
		}
		Some(addr)
	}

	/// Creates from raw sockaddr_un of the given kernel-reported length.
	pub(crate) fn from_raw(raw: &libc::sockaddr_un, len: libc::socklen_t) -> Self {
		let header = std::mem::size_of::<libc::sa_family_t>();
		let available = (len as usize).saturating_sub(header).min(raw.sun_path.len());
		let bytes = &raw.sun_path[..available];
		let end = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());

		Self {
			path: bytes[..end].iter().map(|&c| c as u8).collect(),
		}
	}
}

impl fmt::Display for UnixAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", String::from_utf8_lossy(&self.path))
	}
}

impl ToSockAddr for UnixAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = self.to_raw()?; // Returns None if path too long
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<libc::sockaddr_un>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}
