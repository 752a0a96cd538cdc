use std::time::Duration;

/// Socket creation/configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket() failed: {}", errno_to_str(*.errno))]
    Create { errno: i32 },

    #[error("connect({addr}) failed: {}", errno_to_str(*.errno))]
    Connect { errno: i32, addr: String },

    #[error("setsockopt({option}) failed: {}", errno_to_str(*.errno))]
    SetOption { errno: i32, option: &'static str },

    #[error("getsockopt({option}) failed: {}", errno_to_str(*.errno))]
    GetOption { errno: i32, option: &'static str },

    #[error("{call}() failed: {}", errno_to_str(*.errno))]
    Readiness { errno: i32, call: &'static str },

    #[error("invalid address: {reason}")]
    InvalidAddress { reason: &'static str },
}

/// I/O operation errors.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error("recv() failed: {}", errno_to_str(*.errno))]
    Read { errno: i32 },

    #[error("send() failed: {}", errno_to_str(*.errno))]
    Write { errno: i32 },

    #[error("connection closed by peer")]
    ConnectionClosed,

    #[error("stream already closed")]
    Closed,
}

/// Terminal error codes recorded for the caller of a connect sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    DnsNameNotFound,
    ConnectFailed,
    ConnectCancelled,
}

/// Connection establishment errors.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("could not resolve {host}")]
    Resolve { host: String },

    #[error("{host} has no {family} address")]
    NoMatchingFamily { host: String, family: &'static str },

    #[error("invalid target: {reason}")]
    InvalidTarget { reason: String },

    #[error("connect to {addr} failed: {source}")]
    Connect { addr: String, source: std::io::Error },

    #[error("connect to {addr} timed out after {timeout:?}")]
    TimedOut { addr: String, timeout: Duration },

    #[error("connect cancelled")]
    Cancelled,

    #[error("no alternate target could be reached")]
    NoCandidate,

    #[error("configuring connected socket failed: {0}")]
    Configure(std::io::Error),

    #[error(transparent)]
    Socket(#[from] std::io::Error),
}

impl ConnectError {
    /// The error code this failure records.
    pub fn code(&self) -> ErrorCode {
        match self {
            ConnectError::Resolve { .. } | ConnectError::NoMatchingFamily { .. } => {
                ErrorCode::DnsNameNotFound
            }
            ConnectError::Cancelled | ConnectError::NoCandidate => ErrorCode::ConnectCancelled,
            ConnectError::InvalidTarget { .. }
            | ConnectError::Connect { .. }
            | ConnectError::TimedOut { .. }
            | ConnectError::Configure(_)
            | ConnectError::Socket(_) => ErrorCode::ConnectFailed,
        }
    }
}

/// Returns current errno value.
#[inline]
pub fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

/// True for errno values that mean "try again later" rather than failure.
#[inline]
pub fn is_transient(errno: i32) -> bool {
    matches!(
        errno,
        libc::EAGAIN | libc::EINTR | libc::EINPROGRESS | libc::EALREADY
    ) || errno == libc::EWOULDBLOCK
}

/// Converts errno to human-readable string.
fn errno_to_str(errno: i32) -> String {
    match errno {
        libc::EACCES => "permission denied".into(),
        libc::EADDRNOTAVAIL => "address not available".into(),
        libc::EAFNOSUPPORT => "address family not supported".into(),
        libc::EAGAIN => "resource temporarily unavailable".into(),
        libc::EALREADY => "operation already in progress".into(),
        libc::EBADF => "bad file descriptor".into(),
        libc::ECONNREFUSED => "connection refused".into(),
        libc::ECONNRESET => "connection reset by peer".into(),
        libc::EHOSTUNREACH => "host unreachable".into(),
        libc::EINPROGRESS => "operation in progress".into(),
        libc::EINTR => "interrupted by signal".into(),
        libc::EINVAL => "invalid argument".into(),
        libc::EMFILE => "too many open files".into(),
        libc::ENETUNREACH => "network unreachable".into(),
        libc::ENOBUFS => "no buffer space available".into(),
        libc::ENOENT => "no such file or directory".into(),
        libc::ENOPROTOOPT => "protocol option not available".into(),
        libc::ENOTCONN => "not connected".into(),
        libc::EPIPE => "broken pipe".into(),
        libc::ETIMEDOUT => "connection timed out".into(),
        _ => format!("errno {}", errno),
    }
}

/// Maps errno to std::io::ErrorKind.
fn errno_to_kind(errno: i32) -> std::io::ErrorKind {
    match errno {
        libc::EACCES | libc::EPERM => std::io::ErrorKind::PermissionDenied,
        libc::EADDRNOTAVAIL => std::io::ErrorKind::AddrNotAvailable,
        libc::EAGAIN => std::io::ErrorKind::WouldBlock,
        libc::ECONNREFUSED => std::io::ErrorKind::ConnectionRefused,
        libc::ECONNRESET => std::io::ErrorKind::ConnectionReset,
        libc::EINTR => std::io::ErrorKind::Interrupted,
        libc::EINVAL => std::io::ErrorKind::InvalidInput,
        libc::ENOENT => std::io::ErrorKind::NotFound,
        libc::ENOTCONN => std::io::ErrorKind::NotConnected,
        libc::EPIPE => std::io::ErrorKind::BrokenPipe,
        libc::ETIMEDOUT => std::io::ErrorKind::TimedOut,
        _ => std::io::ErrorKind::Other,
    }
}

impl From<SocketError> for std::io::Error {
    fn from(err: SocketError) -> Self {
        let errno = match &err {
            SocketError::Create { errno } => *errno,
            SocketError::Connect { errno, .. } => *errno,
            SocketError::SetOption { errno, .. } => *errno,
            SocketError::GetOption { errno, .. } => *errno,
            SocketError::Readiness { errno, .. } => *errno,
            SocketError::InvalidAddress { .. } => libc::EINVAL,
        };
        std::io::Error::new(errno_to_kind(errno), err)
    }
}

impl From<IoError> for std::io::Error {
    fn from(err: IoError) -> Self {
        let kind = match &err {
            IoError::Read { errno } => errno_to_kind(*errno),
            IoError::Write { errno } => errno_to_kind(*errno),
            IoError::ConnectionClosed => std::io::ErrorKind::ConnectionReset,
            IoError::Closed => std::io::ErrorKind::NotConnected,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_set_matches_retry_conditions() {
        for errno in [libc::EAGAIN, libc::EWOULDBLOCK, libc::EINTR, libc::EINPROGRESS, libc::EALREADY] {
            assert!(is_transient(errno), "errno {errno} should be transient");
        }
        for errno in [libc::ECONNRESET, libc::EPIPE, libc::EBADF, libc::ECONNREFUSED] {
            assert!(!is_transient(errno), "errno {errno} should be fatal");
        }
    }

    #[test]
    fn connect_errors_map_to_codes() {
        assert_eq!(
            ConnectError::Resolve { host: "nowhere".into() }.code(),
            ErrorCode::DnsNameNotFound
        );
        assert_eq!(
            ConnectError::NoMatchingFamily { host: "h".into(), family: "IPv6" }.code(),
            ErrorCode::DnsNameNotFound
        );
        assert_eq!(ConnectError::Cancelled.code(), ErrorCode::ConnectCancelled);
        assert_eq!(ConnectError::NoCandidate.code(), ErrorCode::ConnectCancelled);
        assert_eq!(
            ConnectError::TimedOut { addr: "x".into(), timeout: Duration::from_millis(5) }.code(),
            ErrorCode::ConnectFailed
        );
    }

    #[test]
    fn socket_error_keeps_errno_kind() {
        let err: std::io::Error = SocketError::Connect {
            errno: libc::ECONNREFUSED,
            addr: "127.0.0.1:1".into(),
        }
        .into();
        assert_eq!(err.kind(), std::io::ErrorKind::ConnectionRefused);
        assert!(err.to_string().contains("connection refused"));
    }
}
