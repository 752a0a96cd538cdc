use std::os::fd::{AsFd, BorrowedFd, FromRawFd, OwnedFd};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{SocketError, errno};
use crate::wait;

/// Cooperative cancellation signal shared between a connect and its owner.
///
/// Backed by an `eventfd`, so it is both pollable and a wait target next to a
/// socket. Once cancelled it stays signaled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    fd: Arc<OwnedFd>,
}

impl CancelToken {
    pub fn new() -> std::io::Result<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_CLOEXEC | libc::EFD_NONBLOCK) };
        if fd == -1 {
            return Err(SocketError::Readiness { errno: errno(), call: "eventfd" }.into());
        }
        let fd = unsafe { OwnedFd::from_raw_fd(fd) };
        Ok(Self { fd: Arc::new(fd) })
    }

    /// Latches the token. Safe to call from any thread, any number of times.
    pub fn cancel(&self) -> std::io::Result<()> {
        use std::os::fd::AsRawFd;
        let one: u64 = 1;
        let n = unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                &one as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        // EAGAIN means the counter is saturated, which is still signaled.
        if n == -1 {
            let e = errno();
            if e != libc::EAGAIN {
                return Err(SocketError::Readiness { errno: e, call: "eventfd write" }.into());
            }
        }
        Ok(())
    }

    /// Non-blocking check.
    pub fn is_cancelled(&self) -> bool {
        match wait::wait_any(&[self.fd.as_fd()], Some(Duration::ZERO)) {
            Ok(signaled) => signaled.is_some(),
            Err(err) => {
                tracing::warn!("polling cancel token failed: {}", err);
                false
            }
        }
    }
}

impl AsFd for CancelToken {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}
