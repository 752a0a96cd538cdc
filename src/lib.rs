pub mod addr;
pub mod connect;
pub mod filter;
pub mod socket;
pub mod transport;
mod cancel;
mod config;
mod error;
mod wait;

pub use self::error::{ConnectError, ErrorCode, IoError, SocketError, errno, is_transient};
pub use self::cancel::CancelToken;
pub use self::config::{FamilyPolicy, ForcedFamily, KeepaliveSettings, TargetAddress, TransportSettings};
pub use self::wait::{Direction, Readiness, wait_any, wait_fd};
pub use self::addr::{Family, SockAddr, ToSockAddr, UnixAddr, VsockAddr};
pub use self::addr::resolve::{AddressCandidate, Resolution, Resolver, SystemResolver};
pub use self::socket::{ConnectedSocket, Interest, PendingConnect, RawSocketStream, ReadinessHandle,
					   Socket, SocketKind};
pub use self::filter::{BufferedWriteStream, ByteStream, Progress, WriteQueue};
pub use self::connect::{ClientAddress, Connector, Target, connect_multi, connect_timeout};
pub use self::transport::{TcpLayer, TransportLayer};
