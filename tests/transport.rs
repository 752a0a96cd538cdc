use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsFd;
use std::thread;
use std::time::{Duration, Instant};

use rdpwire::{
    AddressCandidate, BufferedWriteStream, ByteStream, CancelToken, Connector, Direction, Progress,
    RawSocketStream, Readiness, Resolution, Resolver, TcpLayer, TransportLayer, TransportSettings,
    wait_any,
};

struct Loopback(SocketAddr);

impl Resolver for Loopback {
    fn resolve(&self, _host: &str, _port: Option<u16>) -> std::io::Result<Resolution> {
        Ok(Resolution::new(vec![AddressCandidate::stream(self.0.into())]))
    }
}

fn connected_layer() -> (TcpLayer, TcpStream) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut connector = Connector::with_resolver(TransportSettings::new(), Loopback(addr)).unwrap();
    let layer = connector
        .connect_layer("server.test", addr.port() as u32, Some(Duration::from_secs(5)))
        .unwrap();
    let (peer, _) = listener.accept().unwrap();
    (layer, peer)
}

fn read_some(layer: &mut dyn TransportLayer, buf: &mut [u8]) -> usize {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        match layer.read(buf).unwrap() {
            Progress::Bytes(n) => return n,
            Progress::WouldBlock => {
                assert!(Instant::now() < deadline, "no data arrived");
                layer.wait(Direction::Read, Duration::from_millis(100)).unwrap();
            }
            Progress::Eof => panic!("unexpected eof"),
        }
    }
}

#[test]
fn layer_exchanges_bytes() {
    let (mut layer, mut peer) = connected_layer();
    assert!(layer.stream().is_nonblocking().unwrap());
    assert_eq!(layer.stream().peer_address().unwrap(), "127.0.0.1");

    assert_eq!(layer.write(b"client hello").unwrap(), Progress::Bytes(12));
    let mut buf = [0u8; 12];
    peer.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"client hello");

    peer.write_all(b"server hello").unwrap();
    let mut buf = [0u8; 32];
    let n = read_some(&mut layer, &mut buf);
    assert_eq!(&buf[..n], b"server hello");
}

#[test]
fn empty_buffers_are_no_ops() {
    let (mut layer, _peer) = connected_layer();
    assert_eq!(layer.read(&mut []).unwrap(), Progress::Bytes(0));
    assert_eq!(layer.write(&[]).unwrap(), Progress::Bytes(0));
}

#[test]
fn peer_close_reads_eof() {
    let (mut layer, peer) = connected_layer();
    drop(peer);
    assert!(layer.wait(Direction::Read, Duration::from_secs(5)).unwrap().is_ready());
    let mut buf = [0u8; 4];
    assert_eq!(layer.read(&mut buf).unwrap(), Progress::Eof);
}

#[test]
fn wait_times_out_when_idle() {
    let (layer, _peer) = connected_layer();
    let started = Instant::now();
    let r = layer.wait(Direction::Read, Duration::from_millis(50)).unwrap();
    assert_eq!(r, Readiness::TimedOut);
    assert!(started.elapsed() >= Duration::from_millis(40));
    assert!(layer.wait(Direction::Write, Duration::ZERO).unwrap().is_ready());
}

#[test]
fn readiness_handle_joins_outer_wait_loop() {
    let (layer, mut peer) = connected_layer();
    let shutdown = CancelToken::new().unwrap();

    {
        let handle = layer.readiness_handle().unwrap();
        let idle = wait_any(&[shutdown.as_fd(), handle], Some(Duration::from_millis(20))).unwrap();
        assert_eq!(idle, None);
    }

    peer.write_all(b"x").unwrap();
    let handle = layer.readiness_handle().unwrap();
    let woke = wait_any(&[shutdown.as_fd(), handle], Some(Duration::from_secs(5))).unwrap();
    assert_eq!(woke, Some(1));
}

#[test]
fn close_twice_is_harmless() {
    let (mut layer, mut peer) = connected_layer();
    layer.close();
    layer.close();
    assert!(layer.is_closed());
    assert!(layer.readiness_handle().is_none());
    assert!(layer.write(b"late").is_err());

    let mut buf = [0u8; 1];
    assert_eq!(peer.read(&mut buf).unwrap(), 0);
}

#[test]
fn buffered_stream_absorbs_backpressure() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let mut connector = Connector::with_resolver(TransportSettings::new(), Loopback(addr)).unwrap();
    let socket = connector.default_connect("server.test", addr.port() as u32, None).unwrap();
    let (mut peer, _) = listener.accept().unwrap();

    let mut stream = BufferedWriteStream::new(RawSocketStream::new(socket).unwrap());
    let payload: Vec<u8> = (0..32 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();
    for chunk in payload.chunks(64 * 1024) {
        assert_eq!(stream.write(chunk).unwrap(), Progress::Bytes(chunk.len()));
    }
    // Nobody is reading yet, so the kernel buffers fill up.
    assert!(stream.pending_bytes() > 0);
    assert!(stream.is_write_blocked());

    let expected = payload.len();
    let reader = thread::spawn(move || {
        let mut received = Vec::with_capacity(expected);
        let mut buf = [0u8; 64 * 1024];
        while received.len() < expected {
            let n = peer.read(&mut buf).unwrap();
            assert!(n > 0);
            received.extend_from_slice(&buf[..n]);
        }
        received
    });

    let deadline = Instant::now() + Duration::from_secs(30);
    while stream.pending_bytes() > 0 {
        assert!(Instant::now() < deadline, "queue never drained");
        if stream.is_write_blocked() {
            stream.wait(Direction::Write, Duration::from_millis(100)).unwrap();
        }
        stream.flush().unwrap();
    }

    assert_eq!(reader.join().unwrap(), payload);
}
