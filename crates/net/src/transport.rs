use std::io::{self, Read, Write};
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::error::NetError;
use crate::packet::{HEADER_LEN, MAX_PAYLOAD_LEN, Packet, PacketError, PacketHeader};

/// How long a partially transferred frame may stall before the peer is
/// reported gone. A frame whose first bytes have arrived is expected to
/// complete promptly; this bounds the drain loop on a dead connection.
const FRAME_STALL_LIMIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default)]
pub struct NetStats {
    pub packets_sent: u64,
    pub packets_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl NetStats {
    pub fn merge(&mut self, other: &NetStats) {
        self.packets_sent += other.packets_sent;
        self.packets_received += other.packets_received;
        self.bytes_sent += other.bytes_sent;
        self.bytes_received += other.bytes_received;
    }
}

/// A non-blocking TCP stream carrying whole packets: a fixed-size header
/// followed by exactly the declared number of payload bytes.
pub struct Transport {
    stream: TcpStream,
    peer_addr: SocketAddr,
    stats: NetStats,
}

impl Transport {
    /// Resolves `host` and connects, preferring IPv6 candidates when asked
    /// and falling back to IPv4. The returned handle is non-blocking with
    /// Nagle disabled. On failure the handle must not be reused.
    pub fn connect(host: &str, port: u16, prefer_ipv6: bool) -> Result<Self, NetError> {
        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|_| NetError::Resolve {
                host: host.to_string(),
                port,
            })?
            .collect();
        if candidates.is_empty() {
            return Err(NetError::Resolve {
                host: host.to_string(),
                port,
            });
        }

        let mut ordered: Vec<SocketAddr> = Vec::with_capacity(candidates.len());
        for addr in &candidates {
            if matches!(addr.ip(), IpAddr::V6(_)) == prefer_ipv6 {
                ordered.push(*addr);
            }
        }
        for addr in &candidates {
            if matches!(addr.ip(), IpAddr::V6(_)) != prefer_ipv6 {
                ordered.push(*addr);
            }
        }

        let mut last_err: Option<io::Error> = None;
        for addr in ordered {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    log::debug!("{host} resolved to {addr}");
                    return Self::from_stream(stream, addr).map_err(NetError::Io);
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e) => NetError::Io(e),
            None => NetError::Resolve {
                host: host.to_string(),
                port,
            },
        })
    }

    fn from_stream(stream: TcpStream, peer_addr: SocketAddr) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            peer_addr,
            stats: NetStats::default(),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn stats(&self) -> &NetStats {
        &self.stats
    }

    /// Bounded readiness check; never blocks. Readable also covers the
    /// peer-closed case so that the next receive surfaces the close.
    pub fn poll_readiness(&self) -> (bool, bool) {
        let mut probe = [0u8; 1];
        let readable = match self.stream.peek(&mut probe) {
            Ok(_) => true,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => false,
            Err(_) => true,
        };
        let writable = matches!(self.stream.take_error(), Ok(None));
        (readable, writable)
    }

    /// Sends the header followed by the payload. All-or-nothing from the
    /// caller's perspective: any short or failed write is an error and the
    /// connection should be dropped.
    pub fn send_packet(&mut self, packet: &Packet) -> Result<(), NetError> {
        if packet.payload.len() > MAX_PAYLOAD_LEN {
            return Err(NetError::Packet(PacketError::PayloadTooLarge {
                len: packet.payload.len(),
            }));
        }

        let mut header = Vec::with_capacity(HEADER_LEN);
        packet.header.encode(&mut header);

        self.write_all_bounded(&header)?;
        self.write_all_bounded(&packet.payload)?;

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += (HEADER_LEN + packet.payload.len()) as u64;
        Ok(())
    }

    /// Reads one whole packet: the fixed header, then exactly the declared
    /// payload length. Only valid after `poll_readiness` reported readable.
    /// Any read failure is reported as the peer being gone.
    pub fn receive_packet(&mut self) -> Result<Packet, NetError> {
        let mut header_bytes = [0u8; HEADER_LEN];
        self.read_exact_bounded(&mut header_bytes)?;
        let header = PacketHeader::decode(&header_bytes)?;

        let mut payload = vec![0u8; header.payload_len as usize];
        self.read_exact_bounded(&mut payload)?;

        self.stats.packets_received += 1;
        self.stats.bytes_received += (HEADER_LEN + payload.len()) as u64;
        Ok(Packet { header, payload })
    }

    fn write_all_bounded(&mut self, buf: &[u8]) -> Result<(), NetError> {
        let deadline = Instant::now() + FRAME_STALL_LIMIT;
        let mut written = 0;
        while written < buf.len() {
            match self.stream.write(&buf[written..]) {
                Ok(0) => return Err(NetError::PeerClosed),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(NetError::PeerClosed);
                    }
                    std::thread::yield_now();
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => return Err(NetError::PeerClosed),
            }
        }
        Ok(())
    }

    fn read_exact_bounded(&mut self, buf: &mut [u8]) -> Result<(), NetError> {
        let deadline = Instant::now() + FRAME_STALL_LIMIT;
        let mut read = 0;
        while read < buf.len() {
            match self.stream.read(&mut buf[read..]) {
                Ok(0) => return Err(NetError::PeerClosed),
                Ok(n) => read += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(NetError::PeerClosed);
                    }
                    std::thread::yield_now();
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(_) => return Err(NetError::PeerClosed),
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("peer_addr", &self.peer_addr)
            .finish()
    }
}

/// A non-blocking listening socket producing [`Transport`] handles for
/// newly accepted peers.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Binds and listens, non-blocking. With `prefer_ipv6` the wildcard
    /// IPv6 address is tried first, falling back to IPv4.
    pub fn bind(port: u16, prefer_ipv6: bool) -> Result<Self, NetError> {
        let inner = if prefer_ipv6 {
            TcpListener::bind(("::", port))
                .or_else(|_| TcpListener::bind(("0.0.0.0", port)))
        } else {
            TcpListener::bind(("0.0.0.0", port))
        };
        let inner = inner?;
        inner.set_nonblocking(true)?;
        let local_addr = inner.local_addr()?;
        log::debug!("listening on {local_addr}");
        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn local_port(&self) -> u16 {
        self.local_addr.port()
    }

    /// Returns a newly accepted peer handle if one is ready; never blocks.
    pub fn accept_pending(&self) -> Option<Transport> {
        match self.inner.accept() {
            Ok((stream, addr)) => match Transport::from_stream(stream, addr) {
                Ok(transport) => Some(transport),
                Err(e) => {
                    log::warn!("failed to configure accepted socket from {addr}: {e}");
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                log::warn!("accept failed: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{PacketDirection, PacketKind};
    use std::time::Duration;

    fn accept_one(listener: &Listener) -> Transport {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(1) {
            if let Some(t) = listener.accept_pending() {
                return t;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("no connection accepted");
    }

    fn receive_one(transport: &mut Transport) -> Packet {
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(1) {
            let (readable, _) = transport.poll_readiness();
            if readable {
                return transport.receive_packet().unwrap();
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("no packet received");
    }

    #[test]
    fn test_listener_ephemeral_port() {
        let listener = Listener::bind(0, false).unwrap();
        assert!(listener.local_port() > 0);
        assert!(listener.accept_pending().is_none());
    }

    #[test]
    fn test_packet_roundtrip_over_tcp() {
        let listener = Listener::bind(0, false).unwrap();
        let mut client = Transport::connect("127.0.0.1", listener.local_port(), false).unwrap();
        let mut server_side = accept_one(&listener);

        let payload = vec![0xAB; 300];
        let packet = Packet::new(
            PacketKind::Game(100),
            1,
            PacketDirection::ClientToServer,
            payload.clone(),
        );
        client.send_packet(&packet).unwrap();

        let received = receive_one(&mut server_side);
        assert_eq!(received.header.kind, PacketKind::Game(100));
        assert_eq!(received.header.payload_len as usize, payload.len());
        assert_eq!(received.payload, payload);
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let listener = Listener::bind(0, false).unwrap();
        let mut client = Transport::connect("127.0.0.1", listener.local_port(), false).unwrap();
        let mut server_side = accept_one(&listener);

        let packet = Packet::new(PacketKind::Ping, 0, PacketDirection::ClientToServer, vec![]);
        client.send_packet(&packet).unwrap();

        let received = receive_one(&mut server_side);
        assert_eq!(received.header.kind, PacketKind::Ping);
        assert!(received.payload.is_empty());
    }

    #[test]
    fn test_receive_after_peer_close_reports_gone() {
        let listener = Listener::bind(0, false).unwrap();
        let client = Transport::connect("127.0.0.1", listener.local_port(), false).unwrap();
        let mut server_side = accept_one(&listener);

        drop(client);
        std::thread::sleep(Duration::from_millis(20));

        let (readable, _) = server_side.poll_readiness();
        assert!(readable, "closed peer should report readable");
        assert!(matches!(
            server_side.receive_packet(),
            Err(NetError::PeerClosed)
        ));
    }

    #[test]
    fn test_oversized_payload_rejected_before_send() {
        let listener = Listener::bind(0, false).unwrap();
        let mut client = Transport::connect("127.0.0.1", listener.local_port(), false).unwrap();
        let _server_side = accept_one(&listener);

        let mut packet = Packet::new(
            PacketKind::Game(100),
            1,
            PacketDirection::ClientToServer,
            vec![],
        );
        packet.payload = vec![0u8; MAX_PAYLOAD_LEN + 1];

        assert!(matches!(
            client.send_packet(&packet),
            Err(NetError::Packet(PacketError::PayloadTooLarge { .. }))
        ));
    }

    #[test]
    fn test_connect_refused() {
        let listener = Listener::bind(0, false).unwrap();
        let port = listener.local_port();
        drop(listener);

        assert!(Transport::connect("127.0.0.1", port, false).is_err());
    }
}
