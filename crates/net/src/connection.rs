use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::transport::Transport;

/// An authorized connection. Owns its transport exclusively from promotion
/// until the entry is dropped.
#[derive(Debug)]
pub struct Connection {
    pub client_id: i32,
    pub transport: Transport,
    pub last_heard_from: Instant,
    pub last_spoken: Instant,
}

impl Connection {
    pub fn new(client_id: i32, transport: Transport) -> Self {
        let now = Instant::now();
        Self {
            client_id,
            transport,
            last_heard_from: now,
            last_spoken: now,
        }
    }

    /// Records inbound traffic.
    pub fn touch(&mut self) {
        self.last_heard_from = Instant::now();
    }

    /// Records outbound traffic.
    pub fn spoke(&mut self) {
        self.last_spoken = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_heard_from.elapsed() > timeout
    }

    /// True when the connection has been quiet long enough to warrant a
    /// keepalive ping: idle past half the timeout in both directions. Fresh
    /// traffic either way suppresses the ping.
    pub fn needs_ping(&self, timeout: Duration) -> bool {
        let half = timeout / 2;
        self.last_heard_from.elapsed() > half && self.last_spoken.elapsed() > half
    }
}

/// A socket that has connected but not yet passed the join handshake.
#[derive(Debug)]
pub struct TemporaryConnection {
    pub transport: Transport,
    pub last_heard_from: Instant,
}

impl TemporaryConnection {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            last_heard_from: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_heard_from = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_heard_from.elapsed() > timeout
    }
}

/// Owns all authorized connections, keyed by client id. Ids start at 1
/// (0 is the host itself) and are never reused within a session, even
/// after drops.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: HashMap<i32, Connection>,
    next_client_id: i32,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
        }
    }

    /// Moves a transport out of the temporary pool into the registry,
    /// assigning the next client id.
    pub fn promote(&mut self, transport: Transport) -> i32 {
        let client_id = self.next_client_id;
        self.next_client_id += 1;
        self.clients.insert(client_id, Connection::new(client_id, transport));
        client_id
    }

    pub fn get(&self, client_id: i32) -> Option<&Connection> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: i32) -> Option<&mut Connection> {
        self.clients.get_mut(&client_id)
    }

    /// Removes the entry; dropping the returned connection closes its
    /// socket.
    pub fn remove(&mut self, client_id: i32) -> Option<Connection> {
        self.clients.remove(&client_id)
    }

    pub fn client_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.clients.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.clients.values_mut()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Holds sockets between accept and the join handshake. Capacity-bounded;
/// the service refuses accepts past the configured backlog.
#[derive(Debug, Default)]
pub struct TemporaryPool {
    pending: Vec<TemporaryConnection>,
}

impl TemporaryPool {
    pub fn new() -> Self {
        Self { pending: Vec::new() }
    }

    pub fn push(&mut self, conn: TemporaryConnection) {
        self.pending.push(conn);
    }

    pub fn remove(&mut self, index: usize) -> TemporaryConnection {
        self.pending.swap_remove(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TemporaryConnection> {
        self.pending.get_mut(index)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &TemporaryConnection> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{Listener, Transport};
    use std::time::Duration;

    fn connected_pair(listener: &Listener) -> (Transport, Transport) {
        let client = Transport::connect("127.0.0.1", listener.local_port(), false).unwrap();
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(1) {
            if let Some(server_side) = listener.accept_pending() {
                return (client, server_side);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        panic!("accept timed out");
    }

    #[test]
    fn test_promote_assigns_monotonic_ids() {
        let listener = Listener::bind(0, false).unwrap();
        let mut registry = ConnectionRegistry::new();

        let (_c1, s1) = connected_pair(&listener);
        let (_c2, s2) = connected_pair(&listener);
        assert_eq!(registry.promote(s1), 1);
        assert_eq!(registry.promote(s2), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ids_never_reused_after_drop() {
        let listener = Listener::bind(0, false).unwrap();
        let mut registry = ConnectionRegistry::new();

        let (_c1, s1) = connected_pair(&listener);
        let first = registry.promote(s1);
        assert_eq!(first, 1);

        registry.remove(first);
        assert!(registry.is_empty());

        let (_c2, s2) = connected_pair(&listener);
        assert_eq!(registry.promote(s2), 2);
    }

    #[test]
    fn test_timeout_and_keepalive_thresholds() {
        let listener = Listener::bind(0, false).unwrap();
        let (_c, s) = connected_pair(&listener);
        let mut conn = Connection::new(1, s);

        let timeout = Duration::from_millis(40);
        assert!(!conn.is_timed_out(timeout));
        assert!(!conn.needs_ping(timeout));

        std::thread::sleep(Duration::from_millis(25));
        // Past half the timeout and quiet in both directions.
        assert!(!conn.is_timed_out(timeout));
        assert!(conn.needs_ping(timeout));

        // Fresh outbound traffic suppresses the ping.
        conn.spoke();
        assert!(!conn.needs_ping(timeout));

        std::thread::sleep(Duration::from_millis(25));
        assert!(conn.is_timed_out(timeout));
    }

    #[test]
    fn test_temporary_timeout() {
        let listener = Listener::bind(0, false).unwrap();
        let (_c, s) = connected_pair(&listener);
        let mut temp = TemporaryConnection::new(s);

        assert!(!temp.is_timed_out(Duration::from_millis(50)));
        std::thread::sleep(Duration::from_millis(10));
        assert!(temp.is_timed_out(Duration::from_millis(5)));

        temp.touch();
        assert!(!temp.is_timed_out(Duration::from_millis(5)));
    }
}
