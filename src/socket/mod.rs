mod connected;
mod options;
mod pending;
mod raw;
mod readiness;
mod stream;

pub use self::connected::{ConnectedSocket, SocketKind};
pub use self::options::{
	MIN_RECV_BUFFER, apply_keepalive, ensure_recv_buffer, keepalive, recv_buffer_size,
	set_keepalive, set_keepalive_count, set_keepalive_idle, set_keepalive_interval,
	set_recv_buffer_size, set_tcp_nodelay, set_user_timeout, tcp_nodelay,
};
pub use self::pending::PendingConnect;
pub use self::raw::Socket;
pub use self::readiness::{Interest, ReadinessHandle};
pub use self::stream::RawSocketStream;

#[cfg(test)]
pub(crate) use self::raw::is_nonblocking;

/*
  Lifecycle:
  ┌──────────┬──────────────────────┬─────────────────┬──────────────────┐
  │  Socket  │ connect_nonblocking  │ PendingConnect  │ finish()         │
  │          │ connect (blocking) ──┼─────────────────┼─► ConnectedSocket│
  └──────────┴──────────────────────┴─────────────────┴──────────────────┘
  ConnectedSocket ──► RawSocketStream ──► TcpLayer
*/
