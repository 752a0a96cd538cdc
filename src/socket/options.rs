use std::os::fd::AsRawFd;

use crate::config::KeepaliveSettings;
use crate::error::{SocketError, errno};

/// Minimum receive buffer a connected socket must have.
pub const MIN_RECV_BUFFER: usize = 32 * 1024;

fn setsockopt_int<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	value: libc::c_int,
	option: &'static str,
) -> std::io::Result<()> {
	let result = unsafe {
		libc::setsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&value as *const _ as *const libc::c_void,
			std::mem::size_of::<libc::c_int>() as libc::socklen_t,
		)
	};
	if result == -1 {
		Err(SocketError::SetOption { errno: errno(), option }.into())
	} else {
		Ok(())
	}
}

fn getsockopt_int<S: AsRawFd>(
	socket: &S,
	level: libc::c_int,
	name: libc::c_int,
	option: &'static str,
) -> std::io::Result<libc::c_int> {
	let mut value: libc::c_int = 0;
	let mut len = std::mem::size_of::<libc::c_int>() as libc::socklen_t;
	let result = unsafe {
		libc::getsockopt(
			socket.as_raw_fd(),
			level,
			name,
			&mut value as *mut _ as *mut libc::c_void,
			&mut len,
		)
	};
	if result == -1 {
		Err(SocketError::GetOption { errno: errno(), option }.into())
	} else {
		Ok(value)
	}
}

/// Sets TCP_NODELAY on a socket.
///
/// Disables Nagle's algorithm so small input events go out immediately.
pub fn set_tcp_nodelay<S: AsRawFd>(socket: &S, enable: bool) -> std::io::Result<()> {
	setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_NODELAY, enable as libc::c_int, "TCP_NODELAY")
}

pub fn tcp_nodelay<S: AsRawFd>(socket: &S) -> std::io::Result<bool> {
	Ok(getsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_NODELAY, "TCP_NODELAY")? != 0)
}

/// Sets receive buffer size (SO_RCVBUF).
///
/// Kernel typically doubles this value internally.
pub fn set_recv_buffer_size<S: AsRawFd>(socket: &S, size: usize) -> std::io::Result<()> {
	let size = size.min(libc::c_int::MAX as usize) as libc::c_int;
	setsockopt_int(socket, libc::SOL_SOCKET, libc::SO_RCVBUF, size, "SO_RCVBUF")
}

/// Gets receive buffer size (SO_RCVBUF) as reported by the kernel.
pub fn recv_buffer_size<S: AsRawFd>(socket: &S) -> std::io::Result<usize> {
	let size = getsockopt_int(socket, libc::SOL_SOCKET, libc::SO_RCVBUF, "SO_RCVBUF")?;
	Ok(size.max(0) as usize)
}

/// Raises SO_RCVBUF to at least `min` bytes; never lowers it.
///
/// If the current size cannot be read the socket is left untouched. A failed
/// raise is an error.
pub fn ensure_recv_buffer<S: AsRawFd>(socket: &S, min: usize) -> std::io::Result<()> {
	match recv_buffer_size(socket) {
		Ok(current) if current < min => set_recv_buffer_size(socket, min),
		Ok(_) => Ok(()),
		Err(err) => {
			tracing::debug!("reading SO_RCVBUF failed, leaving it: {}", err);
			Ok(())
		}
	}
}

/// Enables TCP keep-alive (SO_KEEPALIVE).
///
/// When enabled, the kernel sends probes on idle connections to detect dead peers.
pub fn set_keepalive<S: AsRawFd>(socket: &S, enable: bool) -> std::io::Result<()> {
	setsockopt_int(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE, enable as libc::c_int, "SO_KEEPALIVE")
}

pub fn keepalive<S: AsRawFd>(socket: &S) -> std::io::Result<bool> {
	Ok(getsockopt_int(socket, libc::SOL_SOCKET, libc::SO_KEEPALIVE, "SO_KEEPALIVE")? != 0)
}

/// Sets TCP keep-alive idle time (TCP_KEEPIDLE).
///
/// Seconds of idle time before the first keep-alive probe is sent.
/// Requires SO_KEEPALIVE to be enabled.
pub fn set_keepalive_idle<S: AsRawFd>(socket: &S, seconds: u32) -> std::io::Result<()> {
	setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPIDLE, clamp(seconds), "TCP_KEEPIDLE")
}

/// Sets TCP keep-alive probe interval (TCP_KEEPINTVL).
///
/// Seconds between successive keep-alive probes if no response.
pub fn set_keepalive_interval<S: AsRawFd>(socket: &S, seconds: u32) -> std::io::Result<()> {
	setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPINTVL, clamp(seconds), "TCP_KEEPINTVL")
}

/// Sets TCP keep-alive probe count (TCP_KEEPCNT).
///
/// Number of unacknowledged probes before connection is considered dead.
/// Total detection time = KEEPIDLE + (KEEPINTVL × KEEPCNT).
pub fn set_keepalive_count<S: AsRawFd>(socket: &S, count: u32) -> std::io::Result<()> {
	setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_KEEPCNT, clamp(count), "TCP_KEEPCNT")
}

/// Sets TCP_USER_TIMEOUT: how long transmitted data may stay unacknowledged
/// before the connection is dropped.
pub fn set_user_timeout<S: AsRawFd>(socket: &S, millis: u32) -> std::io::Result<()> {
	setsockopt_int(socket, libc::IPPROTO_TCP, libc::TCP_USER_TIMEOUT, clamp(millis), "TCP_USER_TIMEOUT")
}

#[inline]
fn clamp(value: u32) -> libc::c_int {
	value.min(libc::c_int::MAX as u32) as libc::c_int
}

/// Applies keep-alive settings, best effort.
///
/// Each option is tried independently; failures are logged and never
/// propagate. The user timeout is applied whether or not keep-alive is on.
pub fn apply_keepalive<S: AsRawFd>(socket: &S, settings: &KeepaliveSettings, ack_timeout_ms: u32) {
	if let Err(err) = set_keepalive(socket, settings.enabled) {
		tracing::warn!("{}", err);
	}

	if settings.enabled {
		if let Err(err) = set_keepalive_idle(socket, settings.idle_secs) {
			tracing::warn!("{}", err);
		}
		if let Err(err) = set_keepalive_count(socket, settings.retries) {
			tracing::warn!("{}", err);
		}
		if let Err(err) = set_keepalive_interval(socket, settings.interval_secs) {
			tracing::warn!("{}", err);
		}
	}

	if let Err(err) = set_user_timeout(socket, ack_timeout_ms) {
		tracing::warn!("{}", err);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::addr::Family;
	use crate::socket::Socket;

	#[test]
	fn recv_buffer_is_raised_to_minimum() {
		let socket = Socket::stream(Family::Inet).unwrap();
		set_recv_buffer_size(&socket, 4096).unwrap();
		assert!(recv_buffer_size(&socket).unwrap() < MIN_RECV_BUFFER);

		ensure_recv_buffer(&socket, MIN_RECV_BUFFER).unwrap();
		assert!(recv_buffer_size(&socket).unwrap() >= MIN_RECV_BUFFER);
	}

	#[test]
	fn keepalive_follows_settings() {
		let socket = Socket::stream(Family::Inet).unwrap();
		apply_keepalive(&socket, &KeepaliveSettings::new().idle(30), 5000);
		assert!(keepalive(&socket).unwrap());

		apply_keepalive(&socket, &KeepaliveSettings::disabled(), 0);
		assert!(!keepalive(&socket).unwrap());
	}

	#[test]
	fn keepalive_on_unix_socket_does_not_fail() {
		let socket = Socket::stream(Family::Unix).unwrap();
		apply_keepalive(&socket, &KeepaliveSettings::new(), 9000);
	}

	#[test]
	fn nodelay_roundtrip() {
		let socket = Socket::stream(Family::Inet).unwrap();
		set_tcp_nodelay(&socket, true).unwrap();
		assert!(tcp_nodelay(&socket).unwrap());
	}
}
