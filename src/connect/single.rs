use std::os::fd::AsFd;
use std::time::Duration;

use crate::addr::SockAddr;
use crate::cancel::CancelToken;
use crate::error::ConnectError;
use crate::socket::{ConnectedSocket, Interest, ReadinessHandle, Socket, SocketKind};
use crate::wait;

/// Connects `socket` to `addr`, giving up after `timeout` or when `cancel`
/// fires.
///
/// `None` or a zero timeout waits without a deadline. If cancellation and
/// connect completion are both visible, cancellation wins. On success the
/// socket is back in blocking mode. On every failure the socket is closed.
pub fn connect_timeout(
    socket: Socket,
    addr: &SockAddr,
    timeout: Option<Duration>,
    cancel: &CancelToken,
) -> Result<ConnectedSocket, ConnectError> {
    if cancel.is_cancelled() {
        return Err(ConnectError::Cancelled);
    }

    let pending = socket
        .connect_nonblocking(addr)
        .map_err(|source| ConnectError::Connect { addr: addr.to_string(), source })?;

    let timeout = timeout.filter(|t| !t.is_zero());
    let handle = ReadinessHandle::new(&pending, Interest::READ | Interest::WRITE | Interest::CLOSE)?;

    // Index 0 is checked first, so cancellation takes priority.
    match wait::wait_any(&[cancel.as_fd(), handle.as_fd()], timeout)? {
        Some(0) => {
            tracing::debug!("connect to {} cancelled", addr);
            return Err(ConnectError::Cancelled);
        }
        Some(_) => {}
        None => {
            return Err(ConnectError::TimedOut {
                addr: addr.to_string(),
                timeout: timeout.unwrap_or_default(),
            });
        }
    }

    let failed = |source| ConnectError::Connect { addr: addr.to_string(), source };
    if let Some(err) = pending.take_error()? {
        return Err(failed(err));
    }
    pending.probe_reset().map_err(failed)?;

    handle.deregister()?;
    drop(handle);

    let connected = pending.finish(SocketKind::for_family(addr.family()));
    connected.set_nonblocking(false)?;
    Ok(connected)
}
