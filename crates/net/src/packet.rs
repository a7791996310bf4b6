use bytes::{Buf, BufMut};

/// Fixed wire header size: kind tag (4) + client id (4) + direction (1)
/// + send time (8) + payload length (4).
pub const HEADER_LEN: usize = 21;

/// Upper bound on a single packet payload. Bounds the allocation made for
/// an incoming frame before any of its bytes are trusted.
pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;

/// Client id reserved for the hosting process itself.
pub const HOST_CLIENT_ID: i32 = 0;

/// Sentinel client id addressing every authorized client plus the host's
/// own loopback client.
pub const BROADCAST: i32 = -1;

/// Wire tags below this value are reserved for the built-in protocol.
/// Application-defined kinds should start here.
pub const GAME_KIND_BASE: u32 = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Ping,
    Pong,
    AttemptJoin,
    AcceptJoin,
    DenyJoin,
    Disconnect,
    /// Application-defined packet kind, forwarded to the registered
    /// interpreter for the receiving role.
    Game(u32),
}

impl PacketKind {
    pub fn to_tag(self) -> u32 {
        match self {
            PacketKind::Ping => 0,
            PacketKind::Pong => 1,
            PacketKind::AttemptJoin => 2,
            PacketKind::AcceptJoin => 3,
            PacketKind::DenyJoin => 4,
            PacketKind::Disconnect => 5,
            PacketKind::Game(tag) => tag,
        }
    }

    pub fn from_tag(tag: u32) -> Self {
        match tag {
            0 => PacketKind::Ping,
            1 => PacketKind::Pong,
            2 => PacketKind::AttemptJoin,
            3 => PacketKind::AcceptJoin,
            4 => PacketKind::DenyJoin,
            5 => PacketKind::Disconnect,
            other => PacketKind::Game(other),
        }
    }

    pub fn is_builtin(self) -> bool {
        !matches!(self, PacketKind::Game(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketDirection {
    ServerToClient,
    ClientToServer,
}

impl PacketDirection {
    fn to_wire(self) -> u8 {
        match self {
            PacketDirection::ServerToClient => 0,
            PacketDirection::ClientToServer => 1,
        }
    }

    fn from_wire(byte: u8) -> Result<Self, PacketError> {
        match byte {
            0 => Ok(PacketDirection::ServerToClient),
            1 => Ok(PacketDirection::ClientToServer),
            other => Err(PacketError::InvalidDirection(other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub kind: PacketKind,
    pub client_id: i32,
    pub direction: PacketDirection,
    pub send_time: u64,
    pub payload_len: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("header truncated: {0} bytes, need {HEADER_LEN}")]
    HeaderTooShort(usize),
    #[error("invalid direction byte {0}")]
    InvalidDirection(u8),
    #[error("payload of {len} bytes exceeds limit of {MAX_PAYLOAD_LEN}")]
    PayloadTooLarge { len: usize },
}

impl PacketHeader {
    pub fn encode(&self, buf: &mut impl BufMut) {
        buf.put_u32(self.kind.to_tag());
        buf.put_i32(self.client_id);
        buf.put_u8(self.direction.to_wire());
        buf.put_u64(self.send_time);
        buf.put_u32(self.payload_len);
    }

    pub fn decode(mut bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() < HEADER_LEN {
            return Err(PacketError::HeaderTooShort(bytes.len()));
        }
        let kind = PacketKind::from_tag(bytes.get_u32());
        let client_id = bytes.get_i32();
        let direction = PacketDirection::from_wire(bytes.get_u8())?;
        let send_time = bytes.get_u64();
        let payload_len = bytes.get_u32();
        if payload_len as usize > MAX_PAYLOAD_LEN {
            return Err(PacketError::PayloadTooLarge {
                len: payload_len as usize,
            });
        }
        Ok(Self {
            kind,
            client_id,
            direction,
            send_time,
            payload_len,
        })
    }
}

/// A single protocol frame. The payload is owned exclusively by the packet
/// until it is handed to the transport for sending or to a dispatch table
/// for interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn new(
        kind: PacketKind,
        client_id: i32,
        direction: PacketDirection,
        payload: Vec<u8>,
    ) -> Self {
        let header = PacketHeader {
            kind,
            client_id,
            direction,
            send_time: now_ms(),
            payload_len: payload.len() as u32,
        };
        Self { header, payload }
    }

    pub fn kind(&self) -> PacketKind {
        self.header.kind
    }

    pub fn client_id(&self) -> i32 {
        self.header.client_id
    }
}

/// Milliseconds since the unix epoch, used as the header send timestamp.
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_roundtrip() {
        let header = PacketHeader {
            kind: PacketKind::AttemptJoin,
            client_id: 7,
            direction: PacketDirection::ClientToServer,
            send_time: 123_456_789,
            payload_len: 42,
        };

        let mut buf = Vec::with_capacity(HEADER_LEN);
        header.encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);

        let decoded = PacketHeader::decode(&buf).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_header_broadcast_id_roundtrip() {
        let header = PacketHeader {
            kind: PacketKind::Game(200),
            client_id: BROADCAST,
            direction: PacketDirection::ServerToClient,
            send_time: 0,
            payload_len: 0,
        };

        let mut buf = Vec::new();
        header.encode(&mut buf);
        let decoded = PacketHeader::decode(&buf).unwrap();
        assert_eq!(decoded.client_id, BROADCAST);
        assert_eq!(decoded.kind, PacketKind::Game(200));
    }

    #[test]
    fn test_header_truncated() {
        let buf = [0u8; HEADER_LEN - 1];
        assert!(matches!(
            PacketHeader::decode(&buf),
            Err(PacketError::HeaderTooShort(_))
        ));
    }

    #[test]
    fn test_header_invalid_direction() {
        let header = PacketHeader {
            kind: PacketKind::Ping,
            client_id: 1,
            direction: PacketDirection::ServerToClient,
            send_time: 0,
            payload_len: 0,
        };
        let mut buf = Vec::new();
        header.encode(&mut buf);
        buf[8] = 9;

        assert!(matches!(
            PacketHeader::decode(&buf),
            Err(PacketError::InvalidDirection(9))
        ));
    }

    #[test]
    fn test_header_payload_too_large() {
        let header = PacketHeader {
            kind: PacketKind::Ping,
            client_id: 1,
            direction: PacketDirection::ServerToClient,
            send_time: 0,
            payload_len: (MAX_PAYLOAD_LEN + 1) as u32,
        };
        let mut buf = Vec::new();
        header.encode(&mut buf);

        assert!(matches!(
            PacketHeader::decode(&buf),
            Err(PacketError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_kind_tag_mapping() {
        for kind in [
            PacketKind::Ping,
            PacketKind::Pong,
            PacketKind::AttemptJoin,
            PacketKind::AcceptJoin,
            PacketKind::DenyJoin,
            PacketKind::Disconnect,
        ] {
            assert_eq!(PacketKind::from_tag(kind.to_tag()), kind);
            assert!(kind.is_builtin());
        }

        let game = PacketKind::from_tag(GAME_KIND_BASE + 3);
        assert_eq!(game, PacketKind::Game(GAME_KIND_BASE + 3));
        assert!(!game.is_builtin());
    }

    #[test]
    fn test_packet_new_fills_header() {
        let packet = Packet::new(
            PacketKind::Game(100),
            3,
            PacketDirection::ClientToServer,
            vec![1, 2, 3],
        );
        assert_eq!(packet.header.payload_len, 3);
        assert_eq!(packet.client_id(), 3);
        assert!(packet.header.send_time > 0);
    }
}
