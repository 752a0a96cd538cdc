//! Waiting for descriptor readiness.
//!
//! Everything above this module calls [`wait_fd`] or [`wait_any`]; the
//! `poll(2)` backend below is the only place that knows the OS primitive.

use std::os::fd::{AsRawFd, BorrowedFd};
use std::time::{Duration, Instant};

use crate::error::{SocketError, errno};

/// Which readiness a wait is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    TimedOut,
}

impl Readiness {
    #[inline]
    pub fn is_ready(self) -> bool {
        self == Readiness::Ready
    }
}

/// Blocks until `fd` is ready in `direction` or `timeout` elapses.
///
/// A zero timeout polls once without blocking. Errors and hang-ups count as
/// ready so the following read or write reports them.
pub fn wait_fd(fd: BorrowedFd<'_>, direction: Direction, timeout: Duration) -> std::io::Result<Readiness> {
    let events = match direction {
        Direction::Read => libc::POLLIN,
        Direction::Write => libc::POLLOUT,
    };
    let mut set = [sys::entry(fd, events)];
    if sys::poll(&mut set, Some(timeout))? == 0 {
        Ok(Readiness::TimedOut)
    } else {
        Ok(Readiness::Ready)
    }
}

/// Waits for any of `fds` to become readable.
///
/// Returns the lowest index among the signaled descriptors, or `None` on
/// timeout. `None` as timeout waits without a deadline.
pub fn wait_any(fds: &[BorrowedFd<'_>], timeout: Option<Duration>) -> std::io::Result<Option<usize>> {
    let mut set: Vec<libc::pollfd> = fds.iter().map(|fd| sys::entry(*fd, libc::POLLIN)).collect();
    if sys::poll(&mut set, timeout)? == 0 {
        return Ok(None);
    }
    Ok(set.iter().position(|p| p.revents != 0))
}

#[cfg(unix)]
mod sys {
    use super::*;

    pub(super) fn entry(fd: BorrowedFd<'_>, events: libc::c_short) -> libc::pollfd {
        libc::pollfd {
            fd: fd.as_raw_fd(),
            events,
            revents: 0,
        }
    }

    /// poll(2), retried on EINTR against the original deadline. A timeout
    /// too large to express as an instant waits forever.
    pub(super) fn poll(set: &mut [libc::pollfd], timeout: Option<Duration>) -> std::io::Result<usize> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        loop {
            let ms = match deadline {
                None => -1,
                Some(deadline) => to_millis(deadline.saturating_duration_since(Instant::now())),
            };
            let n = unsafe { libc::poll(set.as_mut_ptr(), set.len() as libc::nfds_t, ms) };
            if n >= 0 {
                return Ok(n as usize);
            }
            let e = errno();
            if e != libc::EINTR {
                return Err(SocketError::Readiness { errno: e, call: "poll" }.into());
            }
        }
    }

    // Rounds up so a sub-millisecond remainder still blocks instead of spinning.
    fn to_millis(d: Duration) -> libc::c_int {
        let ms = d.as_nanos().div_ceil(1_000_000);
        ms.min(libc::c_int::MAX as u128) as libc::c_int
    }
}
