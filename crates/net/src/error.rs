use std::io;

use crate::packet::PacketError;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("could not resolve {host}:{port}")]
    Resolve { host: String, port: u16 },
    #[error("connection closed by peer")]
    PeerClosed,
    #[error("malformed packet: {0}")]
    Packet(#[from] PacketError),
}
