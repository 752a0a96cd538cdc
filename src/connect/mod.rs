//! Connection establishment.
//!
//! [`Connector`] turns an endpoint string and a port into a configured,
//! connected socket:
//!
//! ```ignore
//! let mut connector = Connector::new(TransportSettings::new().prefer_ipv6(true))?;
//! let socket = connector.default_connect("rdp.example.com", 3389, Some(Duration::from_secs(15)))?;
//! ```
//!
//! The building blocks ([`connect_timeout`], [`connect_multi`]) are usable on
//! their own.

mod multi;
mod single;
mod target;

use std::time::Duration;

use crate::addr::resolve::{Resolution, Resolver, SystemResolver};
use crate::addr::{Family, SockAddr};
use crate::cancel::CancelToken;
use crate::config::{FamilyPolicy, TransportSettings};
use crate::error::{ConnectError, ErrorCode};
use crate::socket::{
    ConnectedSocket, MIN_RECV_BUFFER, Socket, SocketKind, apply_keepalive, ensure_recv_buffer,
    set_tcp_nodelay,
};
use crate::transport::TcpLayer;

pub use self::multi::connect_multi;
pub use self::single::connect_timeout;
pub use self::target::Target;

/// Local address of the last successful connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientAddress {
    pub ip: String,
    pub ipv6: bool,
}

/// Runs connect sequences under one set of settings.
///
/// Failures are returned and also recorded: [`last_error`](Self::last_error)
/// keeps the first code recorded since the last successful resolution.
/// Cancelling [`cancel_token`](Self::cancel_token) from another thread aborts
/// the sequence at its next check.
#[derive(Debug)]
pub struct Connector<R = SystemResolver> {
    settings: TransportSettings,
    resolver: R,
    cancel: CancelToken,
    last_error: Option<ErrorCode>,
    client_address: Option<ClientAddress>,
}

impl Connector<SystemResolver> {
    pub fn new(settings: TransportSettings) -> std::io::Result<Self> {
        Self::with_resolver(settings, SystemResolver::new())
    }
}

impl<R: Resolver> Connector<R> {
    pub fn with_resolver(settings: TransportSettings, resolver: R) -> std::io::Result<Self> {
        Ok(Self::with_cancel_token(settings, resolver, CancelToken::new()?))
    }

    /// Uses `cancel` instead of a private token, so an abort signal owned by
    /// the caller also stops this connector.
    pub fn with_cancel_token(settings: TransportSettings, resolver: R, cancel: CancelToken) -> Self {
        Self {
            settings,
            resolver,
            cancel,
            last_error: None,
            client_address: None,
        }
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }

    /// Token checked throughout every connect sequence. Clone it to cancel
    /// from elsewhere.
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn last_error(&self) -> Option<ErrorCode> {
        self.last_error
    }

    pub fn client_address(&self) -> Option<&ClientAddress> {
        self.client_address.as_ref()
    }

    pub fn is_hostname_resolvable(&self, host: &str) -> bool {
        self.resolver.resolve(host, None).is_ok()
    }

    /// Connects to `endpoint` and configures the socket for the protocol.
    ///
    /// `port` is the TCP port for host names, the VSOCK port for
    /// `vsock://<cid>`, and the descriptor itself for `|`. A descriptor passed
    /// that way is owned by the connector from then on, and closed if
    /// configuring it fails.
    pub fn default_connect(
        &mut self,
        endpoint: &str,
        port: u32,
        timeout: Option<Duration>,
    ) -> Result<ConnectedSocket, ConnectError> {
        let result = Target::classify(endpoint, port)
            .and_then(|target| self.connect_target(target, timeout))
            .and_then(|socket| self.configure(socket));

        if let Err(err) = &result {
            self.record_error(err.code());
        }
        result
    }

    /// [`default_connect`](Self::default_connect), then wraps the socket as a
    /// transport layer.
    pub fn connect_layer(
        &mut self,
        endpoint: &str,
        port: u32,
        timeout: Option<Duration>,
    ) -> Result<TcpLayer, ConnectError> {
        let socket = self.default_connect(endpoint, port, timeout)?;
        apply_keepalive(&socket, &self.settings.keepalive, self.settings.ack_timeout_ms);

        TcpLayer::from_socket(socket).map_err(|err| {
            tracing::error!("wrapping connected socket failed: {}", err);
            self.record_error(ErrorCode::ConnectFailed);
            ConnectError::Configure(err)
        })
    }

    fn record_error(&mut self, code: ErrorCode) {
        if self.last_error.is_none() {
            self.last_error = Some(code);
        }
    }

    fn connect_target(
        &mut self,
        target: Target,
        timeout: Option<Duration>,
    ) -> Result<ConnectedSocket, ConnectError> {
        match target {
            Target::Unix(path) => {
                connect_blocking(Family::Unix, &SockAddr::Unix(path), SocketKind::Unix)
            }
            // SAFETY: a `|` endpoint hands the descriptor named by the port to
            // the connector; nothing else uses or closes it afterwards.
            Target::External(fd) => Ok(unsafe { ConnectedSocket::adopt_raw(fd) }?),
            Target::Vsock(addr) => {
                connect_blocking(Family::Vsock, &SockAddr::Vsock(addr), SocketKind::Vsock)
            }
            Target::Host { name, port } => self.connect_host(&name, port, timeout),
        }
    }

    fn connect_host(
        &mut self,
        name: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<ConnectedSocket, ConnectError> {
        if self.should_race(name) {
            match connect_multi(&self.resolver, &self.settings.targets, port, Some(&self.cancel)) {
                Ok(socket) => return Ok(socket),
                Err(ConnectError::Cancelled) => return Err(ConnectError::Cancelled),
                Err(err) => {
                    tracing::debug!("alternate target race failed, resolving {}: {}", name, err);
                    self.record_error(ErrorCode::ConnectCancelled);
                }
            }
        }

        let resolution = self.resolver.resolve(name, Some(port)).map_err(|err| {
            tracing::debug!("resolving {} failed: {}", name, err);
            ConnectError::Resolve { host: name.to_owned() }
        })?;
        self.last_error = None;

        let policy = self.settings.family_policy();
        let (socket, index) = open_candidate(name, &resolution, policy)?;
        let addr = &resolution.candidates()[index].addr;
        tracing::debug!("connecting to peer {}", addr);

        connect_timeout(socket, addr, timeout, &self.cancel).inspect_err(|err| {
            tracing::error!("failed to connect to {}: {}", name, err);
        })
    }

    fn should_race(&self, name: &str) -> bool {
        let settings = &self.settings;
        !settings.gateway_enabled
            && !settings.targets.is_empty()
            && (settings.remote_assistance || !self.is_hostname_resolvable(name))
    }

    /// Records the client address and applies the post-connect options.
    fn configure(&mut self, socket: ConnectedSocket) -> Result<ConnectedSocket, ConnectError> {
        let kind = socket.kind();

        if socket.family() != Family::Vsock {
            match client_address(&socket) {
                Ok(address) => self.client_address = Some(address),
                Err(err) => {
                    tracing::error!("couldn't get socket ip address: {}", err);
                    if kind == SocketKind::External {
                        socket.release();
                    }
                    return Err(ConnectError::Configure(err));
                }
            }
        }

        if kind.takes_tcp_options() {
            if let Err(err) = set_tcp_nodelay(&socket, true) {
                tracing::warn!("unable to set TCP_NODELAY: {}", err);
            }
        }

        if let Err(err) = ensure_recv_buffer(&socket, MIN_RECV_BUFFER) {
            tracing::error!("unable to set receive buffer len: {}", err);
            return Err(ConnectError::Configure(err));
        }

        if kind.takes_tcp_options() {
            apply_keepalive(&socket, &self.settings.keepalive, self.settings.ack_timeout_ms);
        }

        if self.cancel.is_cancelled() {
            return Err(ConnectError::Cancelled);
        }
        Ok(socket)
    }
}

fn connect_blocking(
    family: Family,
    addr: &SockAddr,
    kind: SocketKind,
) -> Result<ConnectedSocket, ConnectError> {
    Socket::stream(family)?.connect(addr, kind).map_err(|source| {
        tracing::error!("failed to connect to {}: {}", addr, source);
        ConnectError::Connect { addr: addr.to_string(), source }
    })
}

/// Picks a candidate under `policy` and creates its socket, moving on to the
/// next acceptable candidate while `socket()` itself fails.
fn open_candidate(
    host: &str,
    resolution: &Resolution,
    policy: FamilyPolicy,
) -> Result<(Socket, usize), ConnectError> {
    let mut index = resolution.select(0, policy).ok_or_else(|| ConnectError::NoMatchingFamily {
        host: host.to_owned(),
        family: policy.force.map_or("usable", |f| f.family().name()),
    })?;

    loop {
        let candidate = &resolution.candidates()[index];
        match Socket::for_candidate(candidate) {
            Ok(socket) => return Ok((socket, index)),
            Err(err) => {
                tracing::warn!("socket() for {} failed: {}", candidate.addr, err);
                index = resolution.select(index + 1, policy).ok_or(ConnectError::Socket(err))?;
            }
        }
    }
}

fn client_address(socket: &ConnectedSocket) -> std::io::Result<ClientAddress> {
    let local = socket.local_addr()?;
    let (ip, ipv6) = local.ip_string().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidData, "local address has no IP form")
    })?;
    Ok(ClientAddress { ip, ipv6 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::resolve::AddressCandidate;
    use crate::config::{ForcedFamily, TargetAddress};

    struct Fixed(Vec<AddressCandidate>);

    impl Resolver for Fixed {
        fn resolve(&self, _host: &str, _port: Option<u16>) -> std::io::Result<Resolution> {
            Ok(Resolution::new(self.0.clone()))
        }
    }

    struct Nothing;

    impl Resolver for Nothing {
        fn resolve(&self, host: &str, _port: Option<u16>) -> std::io::Result<Resolution> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, host.to_owned()))
        }
    }

    fn v4_only() -> Fixed {
        Fixed(vec![AddressCandidate::stream("192.0.2.1:3389".parse::<std::net::SocketAddr>().unwrap().into())])
    }

    #[test]
    fn unresolvable_host_records_dns_error() {
        let mut connector = Connector::with_resolver(TransportSettings::new(), Nothing).unwrap();
        let err = connector.default_connect("nowhere.invalid", 3389, None).unwrap_err();
        assert!(matches!(err, ConnectError::Resolve { .. }));
        assert_eq!(connector.last_error(), Some(ErrorCode::DnsNameNotFound));
    }

    #[test]
    fn forced_family_without_match_is_hard_error() {
        let settings = TransportSettings::new().force_family(Some(ForcedFamily::Ipv6));
        let mut connector = Connector::with_resolver(settings, v4_only()).unwrap();
        let err = connector.default_connect("v4.example", 3389, None).unwrap_err();
        assert!(matches!(err, ConnectError::NoMatchingFamily { family: "IPv6", .. }));
        assert_eq!(connector.last_error(), Some(ErrorCode::DnsNameNotFound));
    }

    #[test]
    fn first_recorded_error_is_kept() {
        let mut connector = Connector::with_resolver(TransportSettings::new(), Nothing).unwrap();
        connector.default_connect("a.invalid", 1, None).unwrap_err();
        connector.default_connect("vsock://x", 1, None).unwrap_err();
        assert_eq!(connector.last_error(), Some(ErrorCode::DnsNameNotFound));
    }

    #[test]
    fn race_is_skipped_behind_a_gateway() {
        let settings = TransportSettings::new()
            .gateway_enabled(true)
            .target(TargetAddress::new("198.51.100.1"));
        let connector = Connector::with_resolver(settings, Nothing).unwrap();
        assert!(!connector.should_race("host"));

        let settings = TransportSettings::new().target(TargetAddress::new("198.51.100.1"));
        let connector = Connector::with_resolver(settings, Nothing).unwrap();
        assert!(connector.should_race("host"));
    }

    #[test]
    fn remote_assistance_forces_race() {
        let settings = TransportSettings::new()
            .remote_assistance(true)
            .target(TargetAddress::new("198.51.100.1"));
        let connector = Connector::with_resolver(settings, v4_only()).unwrap();
        assert!(connector.should_race("resolvable.example"));

        let settings = TransportSettings::new().target(TargetAddress::new("198.51.100.1"));
        let connector = Connector::with_resolver(settings, v4_only()).unwrap();
        assert!(!connector.should_race("resolvable.example"));
    }
}
