use crate::addr::resolve::{AddressCandidate, Resolution, Resolver};
use crate::cancel::CancelToken;
use crate::config::TargetAddress;
use crate::error::ConnectError;
use crate::socket::{ConnectedSocket, Socket, SocketKind};

/// One resolved alternate target with its socket already created.
struct ConnectionAttempt<'a> {
    host: &'a str,
    socket: Socket,
    resolution: Resolution,
    index: usize,
}

impl ConnectionAttempt<'_> {
    fn candidate(&self) -> &AddressCandidate {
        &self.resolution.candidates()[self.index]
    }

    fn connect(self) -> std::io::Result<ConnectedSocket> {
        let addr = self.candidate().addr.clone();
        let kind = SocketKind::for_family(addr.family());
        self.socket.connect(&addr, kind)
    }
}

/// Races the alternate targets and keeps the first that connects.
///
/// Every target is resolved and given a socket up front; targets that fail to
/// resolve are skipped. Connects are then tried one by one, blocking, in list
/// order. Sockets of the losing targets are closed when the race ends.
pub fn connect_multi<R: Resolver>(
    resolver: &R,
    targets: &[TargetAddress],
    fallback_port: u16,
    cancel: Option<&CancelToken>,
) -> Result<ConnectedSocket, ConnectError> {
    let mut attempts = Vec::with_capacity(targets.len());

    for target in targets {
        let port = target.port.unwrap_or(fallback_port);
        let resolution = match resolver.resolve(&target.host, Some(port)) {
            Ok(resolution) => resolution,
            Err(err) => {
                tracing::warn!("skipping alternate target {}: {}", target.host, err);
                continue;
            }
        };
        let Some(index) = resolution.race_choice() else {
            continue;
        };

        match Socket::for_candidate(&resolution.candidates()[index]) {
            Ok(socket) => attempts.push(ConnectionAttempt {
                host: &target.host,
                socket,
                resolution,
                index,
            }),
            Err(err) => tracing::warn!("skipping alternate target {}: {}", target.host, err),
        }
    }

    tracing::debug!("racing {} of {} alternate targets", attempts.len(), targets.len());

    for attempt in attempts {
        if cancel.is_some_and(CancelToken::is_cancelled) {
            return Err(ConnectError::Cancelled);
        }

        let host = attempt.host;
        let addr = attempt.candidate().addr.clone();
        match attempt.connect() {
            Ok(socket) => {
                tracing::debug!("alternate target {} won at {}", host, addr);
                return Ok(socket);
            }
            Err(err) => tracing::debug!("alternate target {} failed: {}", host, err),
        }
    }

    Err(ConnectError::NoCandidate)
}
