use std::time::Duration;

use crate::config::{NetConfig, NetMode};
use crate::connection::{Connection, ConnectionRegistry, TemporaryConnection, TemporaryPool};
use crate::error::NetError;
use crate::hooks::NetHooks;
use crate::packet::{BROADCAST, HOST_CLIENT_ID, Packet, PacketDirection, PacketKind};
use crate::transport::{Listener, NetStats, Transport};

/// Where this process currently stands in a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected to anything and not listening.
    Disconnected,
    /// Hosting: the listening socket is open.
    Listening,
    /// Connected to a remote host, waiting for the join verdict.
    AwaitingAuthorization,
    /// Accepted by the remote host and assigned a client id.
    Authorized,
}

/// Owns the listening socket, the connection registry, the temporary pool
/// and the outbound queue, and drives one server-side and one client-side
/// tick per frame. One instance per process; explicit lifecycle, no
/// globals.
pub struct NetworkService {
    config: NetConfig,
    hooks: NetHooks,
    listener: Option<Listener>,
    registry: ConnectionRegistry,
    temporaries: TemporaryPool,
    /// Client-side connection to a remote host. `None` while hosting or
    /// disconnected; the host's own client session is served by loopback
    /// dispatch instead.
    remote: Option<Connection>,
    outbound: Vec<Packet>,
    session: SessionState,
    my_client_id: i32,
    last_deny_reason: Option<String>,
}

impl NetworkService {
    pub fn new(config: NetConfig) -> Self {
        Self {
            config,
            hooks: NetHooks::default(),
            listener: None,
            registry: ConnectionRegistry::new(),
            temporaries: TemporaryPool::new(),
            remote: None,
            outbound: Vec::new(),
            session: SessionState::Disconnected,
            my_client_id: HOST_CLIENT_ID,
            last_deny_reason: None,
        }
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    /// Admission policy is the one piece of configuration mutated at
    /// runtime. Red terminates existing connections on the next server
    /// tick.
    pub fn set_net_mode(&mut self, mode: NetMode) {
        self.config.net_mode = mode;
    }

    pub fn hooks_mut(&mut self) -> &mut NetHooks {
        &mut self.hooks
    }

    pub fn session_state(&self) -> SessionState {
        self.session
    }

    pub fn my_client_id(&self) -> i32 {
        self.my_client_id
    }

    pub fn is_hosting(&self) -> bool {
        self.listener.is_some()
    }

    pub fn is_server_full(&self) -> bool {
        self.registry.len() >= self.config.max_clients
    }

    /// Number of authorized remote clients (the host itself not included).
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }

    pub fn local_port(&self) -> Option<u16> {
        self.listener.as_ref().map(|l| l.local_port())
    }

    /// Reason string carried by the most recent `DenyJoin`, if any.
    pub fn last_deny_reason(&self) -> Option<&str> {
        self.last_deny_reason.as_deref()
    }

    /// Aggregated transfer counters across every live connection.
    pub fn stats(&self) -> NetStats {
        let mut stats = NetStats::default();
        for conn in self.registry.iter() {
            stats.merge(conn.transport.stats());
        }
        for temp in self.temporaries.iter() {
            stats.merge(temp.transport.stats());
        }
        if let Some(remote) = &self.remote {
            stats.merge(remote.transport.stats());
        }
        stats
    }

    // ---- session control ------------------------------------------------

    /// Opens the listening socket on the configured port (0 = ephemeral)
    /// and returns the bound port.
    pub fn start_hosting(&mut self) -> Result<u16, NetError> {
        if self.remote.is_some() {
            self.leave_host();
        }
        if let Some(listener) = &self.listener {
            return Ok(listener.local_port());
        }

        let listener = Listener::bind(self.config.port, self.config.prefer_ipv6)?;
        let port = listener.local_port();
        log::info!("hosting on port {port}");
        self.listener = Some(listener);
        self.session = SessionState::Listening;
        self.my_client_id = HOST_CLIENT_ID;
        Ok(port)
    }

    /// Connects to a remote host and sends the join attempt. `hello` is the
    /// payload the host's accept-predicate will examine.
    pub fn join_host(&mut self, hostname: &str, hello: &[u8]) -> Result<(), NetError> {
        self.leave_host();

        log::info!("connecting to {hostname}:{}", self.config.port);
        let transport = Transport::connect(hostname, self.config.port, self.config.prefer_ipv6)?;
        let mut remote = Connection::new(HOST_CLIENT_ID, transport);

        let attempt = Packet::new(
            PacketKind::AttemptJoin,
            HOST_CLIENT_ID,
            PacketDirection::ClientToServer,
            hello.to_vec(),
        );
        remote.transport.send_packet(&attempt)?;
        remote.spoke();

        self.remote = Some(remote);
        self.session = SessionState::AwaitingAuthorization;
        self.last_deny_reason = None;
        Ok(())
    }

    /// Leaves the remote host, sending a best-effort disconnect first.
    pub fn leave_host(&mut self) {
        if let Some(mut remote) = self.remote.take() {
            let bye = Packet::new(
                PacketKind::Disconnect,
                self.my_client_id,
                PacketDirection::ClientToServer,
                vec![],
            );
            let _ = remote.transport.send_packet(&bye);
        }
        self.finish_disconnect();
    }

    /// Tears the whole service down: disconnects every client with a
    /// `Disconnect` packet, leaves any remote host and closes the listener.
    pub fn shutdown(&mut self) {
        self.leave_host();
        self.terminate_all("shutting down");
        self.listener = None;
        self.outbound.clear();
        self.session = SessionState::Disconnected;
    }

    // ---- send API -------------------------------------------------------

    /// Queues a packet for one client (`target` ≥ 0) or for every
    /// authorized client plus the host's loopback client ([`BROADCAST`]).
    /// The queue is flushed at the end of the current server tick.
    pub fn send_from_server(&mut self, kind: PacketKind, target: i32, payload: &[u8]) {
        if self.listener.is_none() {
            log::warn!("send_from_server while not hosting; packet {kind:?} dropped");
            return;
        }
        self.outbound.push(Packet::new(
            kind,
            target,
            PacketDirection::ServerToClient,
            payload.to_vec(),
        ));
    }

    /// Queues a packet for the host. Without a remote connection the packet
    /// is dispatched straight into the server table (loopback).
    pub fn send_from_client(&mut self, kind: PacketKind, payload: &[u8]) {
        if self.remote.is_none() {
            let packet = Packet::new(
                kind,
                HOST_CLIENT_ID,
                PacketDirection::ClientToServer,
                payload.to_vec(),
            );
            self.dispatch_from_client(packet);
            return;
        }
        self.outbound.push(Packet::new(
            kind,
            self.my_client_id,
            PacketDirection::ClientToServer,
            payload.to_vec(),
        ));
    }

    // ---- server tick ----------------------------------------------------

    pub fn server_tick(&mut self) {
        if self.listener.is_none() {
            return;
        }

        if self.config.net_mode == NetMode::Red {
            self.terminate_all("net mode is red");
        } else {
            self.accept_new_connections();
        }

        self.service_temporaries();
        self.service_clients();
        self.sweep_clients();
        self.flush_outbound_server();

        if let Some(hook) = self.hooks.server_tick.as_mut() {
            hook();
        }
    }

    fn accept_new_connections(&mut self) {
        let Some(listener) = self.listener.as_ref() else {
            return;
        };
        while let Some(transport) = listener.accept_pending() {
            if self.temporaries.len() >= self.config.backlog {
                log::warn!(
                    "refusing connection from {}: backlog full",
                    transport.peer_addr()
                );
                continue;
            }
            log::debug!("incoming connection from {}", transport.peer_addr());
            self.temporaries.push(TemporaryConnection::new(transport));
        }
    }

    fn service_temporaries(&mut self) {
        let timeout = Duration::from_millis(self.config.timeout_ms);
        let mut index = 0;

        while index < self.temporaries.len() {
            let mut drop_reason: Option<String> = None;
            let mut promoted = false;

            loop {
                let (readable, writable) = match self.temporaries.get_mut(index) {
                    Some(temp) => temp.transport.poll_readiness(),
                    None => break,
                };
                if !writable {
                    drop_reason = Some("socket died".into());
                    break;
                }
                if !readable {
                    break;
                }

                let packet = {
                    let Some(temp) = self.temporaries.get_mut(index) else {
                        break;
                    };
                    match temp.transport.receive_packet() {
                        Ok(packet) => {
                            temp.touch();
                            packet
                        }
                        Err(e) => {
                            drop_reason = Some(format!("read failed: {e}"));
                            break;
                        }
                    }
                };

                match packet.header.kind {
                    PacketKind::Ping => {
                        let Some(temp) = self.temporaries.get_mut(index) else {
                            break;
                        };
                        let pong = Packet::new(
                            PacketKind::Pong,
                            HOST_CLIENT_ID,
                            PacketDirection::ServerToClient,
                            vec![],
                        );
                        if temp.transport.send_packet(&pong).is_err() {
                            drop_reason = Some("write failed".into());
                            break;
                        }
                    }
                    PacketKind::AttemptJoin => {
                        match self.evaluate_admission(&packet.payload) {
                            None => {
                                let temp = self.temporaries.remove(index);
                                let peer = temp.transport.peer_addr();
                                let client_id = self.registry.promote(temp.transport);
                                let accept = Packet::new(
                                    PacketKind::AcceptJoin,
                                    client_id,
                                    PacketDirection::ServerToClient,
                                    vec![],
                                );
                                match self.registry.get_mut(client_id) {
                                    Some(conn) => {
                                        if conn.transport.send_packet(&accept).is_err() {
                                            log::info!("client {client_id} vanished during accept");
                                            self.registry.remove(client_id);
                                        } else {
                                            conn.spoke();
                                            log::info!("client {client_id} authorized from {peer}");
                                        }
                                    }
                                    None => {}
                                }
                                promoted = true;
                            }
                            Some(reason) => {
                                if let Some(temp) = self.temporaries.get_mut(index) {
                                    let deny = Packet::new(
                                        PacketKind::DenyJoin,
                                        -1,
                                        PacketDirection::ServerToClient,
                                        reason.clone().into_bytes(),
                                    );
                                    let _ = temp.transport.send_packet(&deny);
                                    log::info!(
                                        "denied join from {}: {reason}",
                                        temp.transport.peer_addr()
                                    );
                                }
                                drop_reason = Some("join denied".into());
                            }
                        }
                        break;
                    }
                    other => {
                        log::debug!("ignoring {other:?} from unauthorized connection");
                    }
                }
            }

            if promoted {
                // swap_remove moved another entry into this slot.
                continue;
            }

            if drop_reason.is_none() {
                if let Some(temp) = self.temporaries.get_mut(index) {
                    if temp.is_timed_out(timeout) {
                        drop_reason = Some("timed out".into());
                    }
                }
            }

            match drop_reason {
                Some(reason) => {
                    let temp = self.temporaries.remove(index);
                    log::info!(
                        "closing temporary connection from {}: {reason}",
                        temp.transport.peer_addr()
                    );
                }
                None => index += 1,
            }
        }
    }

    /// Admission control: capacity, net mode, then the application
    /// predicate. `None` means admitted; `Some` carries the denial reason.
    fn evaluate_admission(&mut self, payload: &[u8]) -> Option<String> {
        if self.registry.len() >= self.config.max_clients {
            return Some("server is full".into());
        }
        if self.config.net_mode != NetMode::Green {
            return Some("server is not accepting new connections".into());
        }
        if let Some(predicate) = self.hooks.accept_client.as_mut() {
            if !predicate(payload) {
                return Some("join request rejected".into());
            }
        }
        None
    }

    fn service_clients(&mut self) {
        for client_id in self.registry.client_ids() {
            loop {
                let received = {
                    let Some(conn) = self.registry.get_mut(client_id) else {
                        break;
                    };
                    let (readable, _) = conn.transport.poll_readiness();
                    if !readable {
                        break;
                    }
                    match conn.transport.receive_packet() {
                        Ok(packet) => {
                            conn.touch();
                            Some(packet)
                        }
                        Err(_) => None,
                    }
                };

                match received {
                    Some(packet) => {
                        if packet.client_id() != client_id {
                            log::warn!(
                                "client {client_id} sent packet with mismatched id {}; discarded",
                                packet.client_id()
                            );
                            continue;
                        }
                        self.dispatch_from_client(packet);
                    }
                    None => {
                        log::info!("client {client_id} dropped");
                        self.drop_client(client_id);
                        break;
                    }
                }
            }
        }
    }

    /// Timeout and keepalive pass over authorized connections. A connection
    /// past the timeout is dropped before any ping consideration; one past
    /// half the timeout in both directions gets a single ping.
    fn sweep_clients(&mut self) {
        let timeout = Duration::from_millis(self.config.timeout_ms);

        for client_id in self.registry.client_ids() {
            enum Sweep {
                Keep,
                Ping,
                Drop,
            }
            let action = match self.registry.get(client_id) {
                Some(conn) if conn.is_timed_out(timeout) => Sweep::Drop,
                Some(conn) if conn.needs_ping(timeout) => Sweep::Ping,
                Some(_) => Sweep::Keep,
                None => continue,
            };

            match action {
                Sweep::Drop => {
                    log::info!("client {client_id} timed out");
                    self.drop_client(client_id);
                }
                Sweep::Ping => {
                    log::debug!("client {client_id} has been quiet, pinging");
                    let ping = Packet::new(
                        PacketKind::Ping,
                        client_id,
                        PacketDirection::ServerToClient,
                        vec![],
                    );
                    let failed = match self.registry.get_mut(client_id) {
                        Some(conn) => {
                            if conn.transport.send_packet(&ping).is_ok() {
                                conn.spoke();
                                false
                            } else {
                                true
                            }
                        }
                        None => false,
                    };
                    if failed {
                        log::info!("client {client_id} dropped");
                        self.drop_client(client_id);
                    }
                }
                Sweep::Keep => {}
            }
        }
    }

    /// Drains the outbound queue: targeted packets to their connection,
    /// broadcasts to every authorized client plus the loopback client,
    /// exactly once each.
    fn flush_outbound_server(&mut self) {
        let queued = std::mem::take(&mut self.outbound);

        for packet in queued {
            if packet.header.direction != PacketDirection::ServerToClient {
                self.outbound.push(packet);
                continue;
            }

            let target = packet.client_id();
            if target == BROADCAST {
                for client_id in self.registry.client_ids() {
                    let mut addressed = packet.clone();
                    addressed.header.client_id = client_id;
                    self.send_to_client_now(client_id, addressed);
                }
                let mut local = packet;
                local.header.client_id = HOST_CLIENT_ID;
                self.dispatch_from_server(local);
            } else if target == HOST_CLIENT_ID {
                self.dispatch_from_server(packet);
            } else {
                self.send_to_client_now(target, packet);
            }
        }
    }

    fn send_to_client_now(&mut self, client_id: i32, packet: Packet) {
        let failed = match self.registry.get_mut(client_id) {
            Some(conn) => {
                if conn.transport.send_packet(&packet).is_ok() {
                    conn.spoke();
                    false
                } else {
                    true
                }
            }
            None => {
                log::warn!(
                    "dropping queued {:?} for unknown client {client_id}",
                    packet.header.kind
                );
                false
            }
        };
        if failed {
            log::info!("client {client_id} dropped");
            self.drop_client(client_id);
        }
    }

    /// Server-side dispatch table for one packet from an authorized client
    /// (or from the host's own loopback client).
    fn dispatch_from_client(&mut self, packet: Packet) {
        let client_id = packet.client_id();
        match packet.header.kind {
            PacketKind::Ping => {
                log::debug!("ping from client {client_id}");
                self.reply_to_client(client_id, PacketKind::Pong, vec![]);
            }
            PacketKind::Pong => {
                log::debug!("pong from client {client_id}");
            }
            PacketKind::Disconnect => {
                log::info!("client {client_id} left");
                self.drop_client(client_id);
            }
            PacketKind::AttemptJoin => {
                log::warn!("join attempt from already-authorized client {client_id}; ignored");
            }
            other => {
                let handled = match self.hooks.interpret_client.as_mut() {
                    Some(interpret) => interpret(&packet),
                    None => false,
                };
                if !handled {
                    log::warn!("unknown packet kind {other:?} from client {client_id}; discarded");
                }
            }
        }
    }

    /// Immediate server-to-client reply used by the built-in table; client
    /// id 0 is the host itself and loops straight back into the client
    /// table.
    fn reply_to_client(&mut self, client_id: i32, kind: PacketKind, payload: Vec<u8>) {
        let packet = Packet::new(kind, client_id, PacketDirection::ServerToClient, payload);
        if client_id == HOST_CLIENT_ID {
            self.dispatch_from_server(packet);
        } else {
            self.send_to_client_now(client_id, packet);
        }
    }

    // ---- client tick ----------------------------------------------------

    pub fn client_tick(&mut self) {
        if self.remote.is_some() && !self.drain_remote() {
            // Read failure: the disconnect already happened, stop here.
            return;
        }
        if self.remote.is_some() {
            self.flush_outbound_client();
        }
        self.sweep_remote();

        if let Some(hook) = self.hooks.client_tick.as_mut() {
            hook();
        }
    }

    /// Drains all readable packets from the host, in arrival order.
    /// Returns false when the connection was lost.
    fn drain_remote(&mut self) -> bool {
        loop {
            let received = {
                let Some(remote) = self.remote.as_mut() else {
                    return true;
                };
                let (readable, _) = remote.transport.poll_readiness();
                if !readable {
                    return true;
                }
                match remote.transport.receive_packet() {
                    Ok(packet) => {
                        remote.touch();
                        Some(packet)
                    }
                    Err(_) => None,
                }
            };

            match received {
                Some(packet) => {
                    self.dispatch_from_server(packet);
                    if self.remote.is_none() {
                        // Deny or disconnect mid-drain.
                        return false;
                    }
                }
                None => {
                    log::info!("connection to host lost");
                    self.finish_disconnect();
                    return false;
                }
            }
        }
    }

    fn flush_outbound_client(&mut self) {
        let queued = std::mem::take(&mut self.outbound);

        for packet in queued {
            if packet.header.direction != PacketDirection::ClientToServer {
                self.outbound.push(packet);
                continue;
            }
            let Some(remote) = self.remote.as_mut() else {
                log::warn!("discarding queued {:?}: no host connection", packet.header.kind);
                continue;
            };
            if remote.transport.send_packet(&packet).is_err() {
                log::info!("connection to host lost while sending");
                self.finish_disconnect();
                continue;
            }
            remote.spoke();
        }
    }

    fn sweep_remote(&mut self) {
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let action = match self.remote.as_ref() {
            Some(remote) if remote.is_timed_out(timeout) => Some(true),
            Some(remote) if remote.needs_ping(timeout) => Some(false),
            _ => None,
        };

        match action {
            Some(true) => {
                log::warn!(
                    "no response from host in over {} ms, disconnecting",
                    self.config.timeout_ms
                );
                self.finish_disconnect();
            }
            Some(false) => {
                log::debug!("host has been quiet, pinging");
                let ping = Packet::new(
                    PacketKind::Ping,
                    self.my_client_id,
                    PacketDirection::ClientToServer,
                    vec![],
                );
                let lost = match self.remote.as_mut() {
                    Some(remote) => {
                        if remote.transport.send_packet(&ping).is_ok() {
                            remote.spoke();
                            false
                        } else {
                            true
                        }
                    }
                    None => false,
                };
                if lost {
                    log::info!("connection to host lost");
                    self.finish_disconnect();
                }
            }
            None => {}
        }
    }

    /// Client-side dispatch table for one packet from the server.
    fn dispatch_from_server(&mut self, packet: Packet) {
        match packet.header.kind {
            PacketKind::AcceptJoin => {
                self.my_client_id = packet.client_id();
                self.session = SessionState::Authorized;
                log::info!("authorized as client {}", self.my_client_id);
            }
            PacketKind::DenyJoin => {
                let reason = String::from_utf8_lossy(&packet.payload).into_owned();
                log::warn!("join denied: {reason}");
                self.last_deny_reason = Some(reason);
                self.finish_disconnect();
            }
            PacketKind::Ping => {
                log::debug!("host ping");
                self.reply_to_server(PacketKind::Pong, vec![]);
            }
            PacketKind::Pong => {
                // A latency estimate from the header send_time could live
                // here; informational for now.
                log::debug!("host pong");
            }
            PacketKind::Disconnect => {
                log::info!("host terminated the connection");
                self.finish_disconnect();
            }
            other => {
                let handled = match self.hooks.interpret_server.as_mut() {
                    Some(interpret) => interpret(&packet),
                    None => false,
                };
                if !handled {
                    log::warn!("unknown packet kind {other:?} from host; discarded");
                }
            }
        }
    }

    /// Immediate client-to-server reply used by the built-in table. With no
    /// remote connection the reply loops back into the server table.
    fn reply_to_server(&mut self, kind: PacketKind, payload: Vec<u8>) {
        let packet = Packet::new(
            kind,
            self.my_client_id,
            PacketDirection::ClientToServer,
            payload,
        );
        let lost = match self.remote.as_mut() {
            Some(remote) => {
                if remote.transport.send_packet(&packet).is_ok() {
                    remote.spoke();
                    false
                } else {
                    true
                }
            }
            None => {
                self.dispatch_from_client(packet);
                false
            }
        };
        if lost {
            log::info!("connection to host lost");
            self.finish_disconnect();
        }
    }

    // ---- teardown helpers -----------------------------------------------

    fn drop_client(&mut self, client_id: i32) {
        match self.registry.remove(client_id) {
            Some(conn) => {
                log::info!("dropped client {client_id} ({})", conn.transport.peer_addr());
            }
            None => {
                log::warn!("tried to drop unknown client {client_id}");
            }
        }
    }

    fn terminate_all(&mut self, reason: &str) {
        if self.registry.is_empty() && self.temporaries.is_empty() {
            return;
        }
        log::info!("terminating all connections: {reason}");
        for conn in self.registry.iter_mut() {
            let bye = Packet::new(
                PacketKind::Disconnect,
                conn.client_id,
                PacketDirection::ServerToClient,
                vec![],
            );
            let _ = conn.transport.send_packet(&bye);
        }
        for client_id in self.registry.client_ids() {
            self.registry.remove(client_id);
        }
        self.temporaries.clear();
    }

    /// Drops the remote connection and settles the session state. Queued
    /// client packets are discarded; they must not leak into a later
    /// session.
    fn finish_disconnect(&mut self) {
        let was_connected = self.remote.take().is_some();
        self.outbound
            .retain(|p| p.header.direction != PacketDirection::ClientToServer);
        self.my_client_id = HOST_CLIENT_ID;
        let next = if self.listener.is_some() {
            SessionState::Listening
        } else {
            SessionState::Disconnected
        };
        if was_connected && self.session != next {
            log::info!("session state: {:?}", next);
        }
        self.session = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_new_service_is_disconnected() {
        let service = NetworkService::new(NetConfig::default());
        assert_eq!(service.session_state(), SessionState::Disconnected);
        assert_eq!(service.my_client_id(), HOST_CLIENT_ID);
        assert!(!service.is_hosting());
        assert_eq!(service.client_count(), 0);
    }

    #[test]
    fn test_loopback_client_send_reaches_server_interpreter() {
        let mut service = NetworkService::new(NetConfig::default());
        let seen: Rc<RefCell<Vec<(PacketKind, Vec<u8>)>>> = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        service.hooks_mut().set_interpret_client(move |packet| {
            sink.borrow_mut()
                .push((packet.header.kind, packet.payload.clone()));
            true
        });

        service.send_from_client(PacketKind::Game(100), b"hello");

        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, PacketKind::Game(100));
        assert_eq!(seen[0].1, b"hello");
    }

    #[test]
    fn test_loopback_ping_answers_with_pong() {
        // A ping from the local client must come back through the client
        // table as a pong without any socket involved.
        let mut service = NetworkService::new(NetConfig::default());
        service.send_from_client(PacketKind::Ping, &[]);
        // Nothing to assert beyond "no panic, no connection state change":
        // the loopback round trip is pure dispatch.
        assert_eq!(service.session_state(), SessionState::Disconnected);
    }

    #[test]
    fn test_unhandled_game_packet_preserves_state() {
        let mut service = NetworkService::new(NetConfig::default());
        // No interpreter registered: the packet is logged and discarded.
        service.send_from_client(PacketKind::Game(77), b"payload");
        assert_eq!(service.session_state(), SessionState::Disconnected);
    }

    #[test]
    fn test_is_server_full_boundary() {
        let mut config = NetConfig::default();
        config.max_clients = 0;
        let service = NetworkService::new(config);
        assert!(service.is_server_full());

        let service = NetworkService::new(NetConfig::default());
        assert!(!service.is_server_full());
    }

    #[test]
    fn test_admission_rejects_by_mode_and_predicate() {
        let mut config = NetConfig::default();
        config.net_mode = NetMode::Yellow;
        let mut service = NetworkService::new(config);
        assert!(service.evaluate_admission(b"").is_some());

        service.set_net_mode(NetMode::Green);
        assert!(service.evaluate_admission(b"").is_none());

        service.hooks_mut().set_accept_client(|hello| hello == b"let me in");
        assert!(service.evaluate_admission(b"let me in").is_none());
        assert!(service.evaluate_admission(b"other").is_some());

        service.hooks_mut().clear_accept_client();
        assert!(service.evaluate_admission(b"other").is_none());
    }

    #[test]
    fn test_send_from_server_requires_hosting() {
        let mut service = NetworkService::new(NetConfig::default());
        service.send_from_server(PacketKind::Game(100), BROADCAST, b"x");
        assert!(service.outbound.is_empty());
    }

    #[test]
    fn test_tick_hooks_fire() {
        let mut config = NetConfig::default();
        config.port = 0;
        config.prefer_ipv6 = false;
        let mut service = NetworkService::new(config);

        let count = Rc::new(RefCell::new(0u32));
        let server_count = Rc::clone(&count);
        let client_count = Rc::clone(&count);
        service.hooks_mut().set_server_tick(move || {
            *server_count.borrow_mut() += 1;
        });
        service.hooks_mut().set_client_tick(move || {
            *client_count.borrow_mut() += 1;
        });

        // Server hook only runs while hosting; client hook always runs.
        service.server_tick();
        service.client_tick();
        assert_eq!(*count.borrow(), 1);

        service.start_hosting().unwrap();
        service.server_tick();
        assert_eq!(*count.borrow(), 2);
    }
}
