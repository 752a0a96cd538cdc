use std::fmt;

use super::ToSockAddr;

/// Context id of the host as seen from a guest.
pub const VMADDR_CID_HOST: u32 = 2;

/// Route the connection to the host even from a nested guest.
const VMADDR_FLAG_TO_HOST: u8 = 0x01;

/// Kernel layout of `struct sockaddr_vm` (linux/vm_sockets.h).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawSockaddrVm {
	pub(crate) svm_family: libc::sa_family_t,
	pub(crate) svm_reserved1: libc::c_ushort,
	pub(crate) svm_port: libc::c_uint,
	pub(crate) svm_cid: libc::c_uint,
	pub(crate) svm_flags: u8,
	pub(crate) svm_zero: [u8; 3],
}

/// VSOCK address: context identifier plus port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VsockAddr {
	cid: u32,
	port: u32,
}

impl VsockAddr {
	pub fn new(cid: u32, port: u32) -> Self {
		Self { cid, port }
	}

	pub fn cid(&self) -> u32 {
		self.cid
	}

	pub fn port(&self) -> u32 {
		self.port
	}

	pub(crate) fn to_raw(&self) -> RawSockaddrVm {
		RawSockaddrVm {
			svm_family: libc::AF_VSOCK as libc::sa_family_t,
			svm_reserved1: 0,
			svm_port: self.port,
			svm_cid: self.cid,
			svm_flags: if self.cid == VMADDR_CID_HOST { VMADDR_FLAG_TO_HOST } else { 0 },
			svm_zero: [0; 3],
		}
	}

	pub(crate) fn from_raw(raw: &RawSockaddrVm) -> Self {
		Self {
			cid: raw.svm_cid,
			port: raw.svm_port,
		}
	}
}

impl fmt::Display for VsockAddr {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "vsock://{}:{}", self.cid, self.port)
	}
}

impl ToSockAddr for VsockAddr {
	fn with_raw<F, R>(&self, f: F) -> Option<R>
	where
		F: FnOnce(*const libc::sockaddr, libc::socklen_t) -> R,
	{
		let raw = self.to_raw();
		let ptr = &raw as *const _ as *const libc::sockaddr;
		let len = std::mem::size_of::<RawSockaddrVm>() as libc::socklen_t;
		Some(f(ptr, len))
	}
}
