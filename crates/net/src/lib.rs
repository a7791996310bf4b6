mod config;
mod connection;
mod error;
mod hooks;
mod packet;
mod service;
mod transport;

pub use config::{NetConfig, NetMode};
pub use connection::{Connection, ConnectionRegistry, TemporaryConnection, TemporaryPool};
pub use error::NetError;
pub use hooks::NetHooks;
pub use packet::{
    BROADCAST, GAME_KIND_BASE, HEADER_LEN, HOST_CLIENT_ID, MAX_PAYLOAD_LEN, Packet,
    PacketDirection, PacketError, PacketHeader, PacketKind, now_ms,
};
pub use service::{NetworkService, SessionState};
pub use transport::{Listener, NetStats, Transport};
