use std::os::fd::RawFd;

use crate::addr::{UnixAddr, VsockAddr};
use crate::error::ConnectError;

const VSOCK_PREFIX: &str = "vsock://";

/// What an endpoint string names.
///
/// - `/path` is a Unix-domain socket
/// - `|` means the port argument is a descriptor the caller already connected
/// - `vsock://<cid>` is a VSOCK endpoint, the port argument is the VSOCK port
/// - anything else is a host name to resolve
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Unix(UnixAddr),
    External(RawFd),
    Vsock(VsockAddr),
    Host { name: String, port: u16 },
}

impl Target {
    pub fn classify(endpoint: &str, port: u32) -> Result<Self, ConnectError> {
        if endpoint.starts_with('/') {
            return Ok(Target::Unix(UnixAddr::new(endpoint)));
        }

        if endpoint.starts_with('|') {
            let fd = RawFd::try_from(port).map_err(|_| ConnectError::InvalidTarget {
                reason: format!("descriptor {} out of range", port),
            })?;
            return Ok(Target::External(fd));
        }

        if let Some(cid) = endpoint.strip_prefix(VSOCK_PREFIX) {
            let cid = cid.parse::<u32>().map_err(|_| ConnectError::InvalidTarget {
                reason: format!("bad VSOCK context id in '{}'", endpoint),
            })?;
            return Ok(Target::Vsock(VsockAddr::new(cid, port)));
        }

        if endpoint.is_empty() {
            return Err(ConnectError::InvalidTarget { reason: "empty host name".into() });
        }
        let port = u16::try_from(port).map_err(|_| ConnectError::InvalidTarget {
            reason: format!("port {} out of range", port),
        })?;
        Ok(Target::Host { name: endpoint.to_owned(), port })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn classifies_each_form() {
        assert_eq!(
            Target::classify("/run/rdp.sock", 0).unwrap(),
            Target::Unix(UnixAddr::new("/run/rdp.sock"))
        );
        assert_eq!(Target::classify("|", 17).unwrap(), Target::External(17));
        assert_eq!(
            Target::classify("vsock://3", 3389).unwrap(),
            Target::Vsock(VsockAddr::new(3, 3389))
        );
        assert_eq!(
            Target::classify("rdp.example.com", 3389).unwrap(),
            Target::Host { name: "rdp.example.com".into(), port: 3389 }
        );
    }

    #[test]
    fn rejects_malformed_targets() {
        let err = Target::classify("vsock://host", 1).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ConnectFailed);
        assert!(Target::classify("example.com", 70000).is_err());
        assert!(Target::classify("|", u32::MAX).is_err());
        assert!(Target::classify("", 3389).is_err());
    }
}
