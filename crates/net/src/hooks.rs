use crate::packet::Packet;

pub type AcceptPredicate = Box<dyn FnMut(&[u8]) -> bool>;
pub type PacketInterpreter = Box<dyn FnMut(&Packet) -> bool>;
pub type TickHook = Box<dyn FnMut()>;

/// Application hooks, each independently registerable and removable.
/// Interpreters return `true` when they handled the packet; an unhandled
/// packet is logged and discarded without affecting the connection.
#[derive(Default)]
pub struct NetHooks {
    pub(crate) accept_client: Option<AcceptPredicate>,
    pub(crate) interpret_server: Option<PacketInterpreter>,
    pub(crate) interpret_client: Option<PacketInterpreter>,
    pub(crate) server_tick: Option<TickHook>,
    pub(crate) client_tick: Option<TickHook>,
}

impl NetHooks {
    /// Predicate consulted over the join-attempt payload before a temporary
    /// connection is promoted. No predicate means every attempt passes this
    /// check (capacity and net mode still apply).
    pub fn set_accept_client(&mut self, f: impl FnMut(&[u8]) -> bool + 'static) {
        self.accept_client = Some(Box::new(f));
    }

    pub fn clear_accept_client(&mut self) {
        self.accept_client = None;
    }

    /// Interpreter for unrecognized packets arriving from the server
    /// (client role).
    pub fn set_interpret_server(&mut self, f: impl FnMut(&Packet) -> bool + 'static) {
        self.interpret_server = Some(Box::new(f));
    }

    pub fn clear_interpret_server(&mut self) {
        self.interpret_server = None;
    }

    /// Interpreter for unrecognized packets arriving from a client
    /// (server role).
    pub fn set_interpret_client(&mut self, f: impl FnMut(&Packet) -> bool + 'static) {
        self.interpret_client = Some(Box::new(f));
    }

    pub fn clear_interpret_client(&mut self) {
        self.interpret_client = None;
    }

    pub fn set_server_tick(&mut self, f: impl FnMut() + 'static) {
        self.server_tick = Some(Box::new(f));
    }

    pub fn clear_server_tick(&mut self) {
        self.server_tick = None;
    }

    pub fn set_client_tick(&mut self, f: impl FnMut() + 'static) {
        self.client_tick = Some(Box::new(f));
    }

    pub fn clear_client_tick(&mut self) {
        self.client_tick = None;
    }
}

impl std::fmt::Debug for NetHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetHooks")
            .field("accept_client", &self.accept_client.is_some())
            .field("interpret_server", &self.interpret_server.is_some())
            .field("interpret_client", &self.interpret_client.is_some())
            .field("server_tick", &self.server_tick.is_some())
            .field("client_tick", &self.client_tick.is_some())
            .finish()
    }
}
