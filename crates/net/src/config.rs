/// Server-wide admission policy. Read by the join handshake every time a
/// temporary connection attempts to authorize; mutated only through
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetMode {
    /// No connections allowed; existing connections are terminated.
    Red,
    /// No new connections; existing connections are kept.
    Yellow,
    /// New connections accepted.
    Green,
}

#[derive(Debug, Clone)]
pub struct NetConfig {
    /// TCP port used both for hosting and for joining a remote host.
    /// Port 0 asks the OS for an ephemeral port when hosting.
    pub port: u16,
    /// Maximum number of not-yet-authorized connections held at once.
    pub backlog: usize,
    /// Maximum number of authorized remote clients.
    pub max_clients: usize,
    pub net_mode: NetMode,
    /// A connection idle longer than this is dropped; idle past half of it
    /// triggers a keepalive ping.
    pub timeout_ms: u64,
    /// Prefer IPv6 addresses, falling back to IPv4 on failure.
    pub prefer_ipv6: bool,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            port: 1750,
            backlog: 32,
            max_clients: 8,
            net_mode: NetMode::Green,
            timeout_ms: 90_000,
            prefer_ipv6: true,
        }
    }
}
